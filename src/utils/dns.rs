//! DNS helpers: resolver construction and mail exchange discovery.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::utils::smtp::{FailureKind, SessionError};

use std::net::{IpAddr, SocketAddr};
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::system_conf::read_system_conf;
use trust_dns_resolver::TokioAsyncResolver;

const SMTP_PORT: u16 = 25;

/// A mail exchange host for a domain, with its resolved socket address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MailServer {
    pub exchange: String,
    pub preference: u16,
    pub socket_addr: SocketAddr,
}

/// Creates the async resolver, using the configured name servers or the
/// system configuration when none are set.
pub(crate) fn create_resolver(config: &Config) -> Result<TokioAsyncResolver> {
    let (resolver_config, opts) = resolver_parts(config)?;
    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}

/// Resolver configuration and options; `dns_timeout` applies to both the
/// configured servers and the system configuration.
fn resolver_parts(config: &Config) -> Result<(ResolverConfig, ResolverOpts)> {
    if config.dns_servers.is_empty() {
        tracing::debug!(target: "dns_task", "Using system resolver configuration.");
        let (resolver_config, mut opts) = read_system_conf().map_err(|e| {
            AppError::Initialization(format!("Failed to read system DNS configuration: {}", e))
        })?;
        opts.timeout = config.dns_timeout;
        return Ok((resolver_config, opts));
    }

    let mut opts = ResolverOpts::default();
    opts.timeout = config.dns_timeout;
    opts.attempts = 2;

    let ips = config
        .dns_servers
        .iter()
        .map(|s| {
            s.parse::<IpAddr>()
                .map_err(|e| AppError::Config(format!("Invalid DNS server '{}': {}", s, e)))
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(target: "dns_task", "Using {} configured DNS servers.", ips.len());

    let group = NameServerConfigGroup::from_ips_clear(&ips, 53, true);
    Ok((ResolverConfig::from_parts(None, vec![], group), opts))
}

/// Whether the name authoritatively has no records: NXDOMAIN, or NOERROR
/// with an empty answer. Upstream failures (SERVFAIL, REFUSED, ...) are
/// reported through the same error kind and must not match.
fn is_no_records(err: &ResolveError) -> bool {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            matches!(*response_code, ResponseCode::NXDomain | ResponseCode::NoError)
        }
        _ => false,
    }
}

fn resolve_failure(domain: &str, err: ResolveError) -> SessionError {
    if is_no_records(&err) {
        return SessionError::host_absent(domain);
    }
    if matches!(err.kind(), ResolveErrorKind::Timeout) {
        return SessionError::new(
            FailureKind::Timeout,
            format!("DNS lookup for {} timed out", domain),
        );
    }
    SessionError::new(
        FailureKind::ServerUnavailable,
        format!("DNS lookup for {} failed: {}", domain, err),
    )
}

async fn first_address(
    resolver: &TokioAsyncResolver,
    host: &str,
) -> std::result::Result<IpAddr, SessionError> {
    let lookup = resolver
        .lookup_ip(host)
        .await
        .map_err(|e| resolve_failure(host, e))?;
    lookup
        .iter()
        .next()
        .ok_or_else(|| SessionError::host_absent(host))
}

/// Resolves the mail exchanges of `domain`, lowest preference first.
///
/// Falls back to the domain's own A/AAAA records when it publishes no MX
/// records. A domain with neither is reported as [`FailureKind::HostAbsent`].
pub(crate) async fn resolve_mail_servers(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> std::result::Result<Vec<MailServer>, SessionError> {
    tracing::debug!(target: "dns_task", "Looking up MX records for {}", domain);

    let mut records: Vec<(u16, String)> = match resolver.mx_lookup(domain).await {
        Ok(lookup) => lookup
            .iter()
            .map(|mx| {
                let exchange = mx.exchange().to_utf8();
                (
                    mx.preference(),
                    exchange.trim_end_matches('.').to_string(),
                )
            })
            .filter(|(_, exchange)| !exchange.is_empty())
            .collect(),
        Err(e) if is_no_records(&e) => Vec::new(),
        Err(e) => return Err(resolve_failure(domain, e)),
    };

    if records.is_empty() {
        tracing::debug!(target: "dns_task", "No MX records for {}, trying implicit MX", domain);
        let ip = first_address(resolver, domain).await?;
        return Ok(vec![MailServer {
            exchange: domain.to_string(),
            preference: 0,
            socket_addr: SocketAddr::new(ip, SMTP_PORT),
        }]);
    }

    records.sort_by_key(|(preference, _)| *preference);

    let mut servers = Vec::with_capacity(records.len());
    let mut last_err = None;
    for (preference, exchange) in records {
        match first_address(resolver, &exchange).await {
            Ok(ip) => servers.push(MailServer {
                socket_addr: SocketAddr::new(ip, SMTP_PORT),
                exchange,
                preference,
            }),
            Err(e) => {
                tracing::debug!(target: "dns_task", "Skipping MX {} for {}: {}", exchange, domain, e);
                last_err = Some(e);
            }
        }
    }

    if servers.is_empty() {
        return Err(last_err.unwrap_or_else(|| SessionError::host_absent(domain)));
    }
    tracing::debug!(target: "dns_task", "Resolved {} mail servers for {}", servers.len(), domain);
    Ok(servers)
}
