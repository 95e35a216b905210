//! SMTP session implementation backed by lettre's low level `SmtpConnection`.
//!
//! lettre's connection is blocking, so every command runs on the blocking
//! thread pool under a `tokio::time::timeout`.

use super::error::{from_smtp_error, FailureKind, SessionError};
use super::session::{DomainSession, SessionFactory};
use crate::utils::dns::{resolve_mail_servers, MailServer};

use async_trait::async_trait;
use lettre::transport::smtp::client::SmtpConnection;
use lettre::transport::smtp::commands::{Mail, Rcpt, Rset};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::Error as SmtpError;
use lettre::Address;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_resolver::TokioAsyncResolver;

/// Opens [`SmtpDomainSession`]s, resolving mail exchanges with a shared resolver.
#[derive(Clone)]
pub struct SmtpSessionFactory {
    resolver: Arc<TokioAsyncResolver>,
}

impl SmtpSessionFactory {
    pub fn new(resolver: Arc<TokioAsyncResolver>) -> Self {
        Self { resolver }
    }
}

fn parse_address(value: &str) -> Result<Address, SessionError> {
    Address::from_str(value).map_err(|e| {
        SessionError::new(
            FailureKind::NotAllowed,
            format!("'{}' is not a valid SMTP address: {}", value, e),
        )
    })
}

/// Runs a blocking lettre operation on the blocking pool, bounded by `timeout`.
async fn run_blocking<T, F>(
    operation: &str,
    server: &str,
    timeout: Duration,
    f: F,
) -> Result<T, SessionError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SmtpError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(e))) => Err(from_smtp_error(&e, server)),
        Ok(Err(join_err)) => Err(SessionError::new(
            FailureKind::ServerUnavailable,
            format!("{} against {} aborted: {}", operation, server, join_err),
        )),
        Err(_) => {
            tracing::warn!(target: "smtp_task", "{} against {} exceeded {:?}", operation, server, timeout);
            Err(SessionError::timeout(operation))
        }
    }
}

async fn connect(
    server: &MailServer,
    hostname: &str,
    sender: &Address,
    timeout: Duration,
) -> Result<SmtpConnection, SessionError> {
    let socket_addr = server.socket_addr;
    let helo_name = ClientId::Domain(hostname.to_string());
    let sender = sender.clone();

    tracing::debug!(target: "smtp_task",
        "Connecting to {} at {} (preference {})",
        server.exchange, socket_addr, server.preference
    );

    run_blocking("connect", &server.exchange, timeout, move || {
        let mut conn = SmtpConnection::connect(socket_addr, Some(timeout), &helo_name, None, None)?;
        conn.command(Mail::new(Some(sender), vec![]))?;
        Ok(conn)
    })
    .await
}

/// Connects to the first reachable server in `servers`, which are tried in
/// the order given (lowest MX preference first).
async fn connect_first(
    domain: &str,
    servers: &[MailServer],
    hostname: &str,
    sender: Address,
    timeout: Duration,
) -> Result<SmtpDomainSession, SessionError> {
    let mut last_err = None;
    for server in servers {
        match connect(server, hostname, &sender, timeout).await {
            Ok(connection) => {
                tracing::info!(target: "smtp_task", "Opened SMTP session with {} for {}", server.exchange, domain);
                return Ok(SmtpDomainSession {
                    server: server.exchange.clone(),
                    sender,
                    connection: Some(connection),
                    timeout,
                });
            }
            Err(e) => {
                tracing::warn!(target: "smtp_task", "Could not open session with {} for {}: {}", server.exchange, domain, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| SessionError::host_absent(domain)))
}

#[async_trait]
impl SessionFactory for SmtpSessionFactory {
    /// `timeout` bounds the whole call (MX lookup plus every connection
    /// attempt) and, separately, each later command on the session.
    async fn open(
        &self,
        domain: &str,
        local_hostname: &str,
        source_address: &str,
        timeout: Duration,
    ) -> Result<Box<dyn DomainSession>, SessionError> {
        let sender = parse_address(source_address)?;
        let opening = async {
            let servers = resolve_mail_servers(&self.resolver, domain).await?;
            connect_first(domain, &servers, local_hostname, sender, timeout).await
        };
        let session = tokio::time::timeout(timeout, opening)
            .await
            .map_err(|_| SessionError::timeout(&format!("opening a session for {}", domain)))??;
        Ok(Box::new(session))
    }
}

fn rcpt_and_reset(
    conn: &mut SmtpConnection,
    recipient: Address,
    sender: Address,
) -> Result<(), SmtpError> {
    conn.command(Rcpt::new(recipient, vec![]))?;
    conn.command(Rset)?;
    conn.command(Mail::new(Some(sender), vec![]))?;
    Ok(())
}

/// An open SMTP conversation, positioned after `MAIL FROM`.
pub struct SmtpDomainSession {
    server: String,
    sender: Address,
    connection: Option<SmtpConnection>,
    timeout: Duration,
}

impl SmtpDomainSession {
    /// Issues `RCPT TO` for `recipient`. An accepted recipient is followed by
    /// `RSET` and a fresh `MAIL FROM` so the transaction never accumulates
    /// recipients across probes.
    async fn rcpt(&mut self, recipient: Address) -> Result<(), SessionError> {
        let mut conn = self.connection.take().ok_or_else(|| {
            SessionError::new(
                FailureKind::ServerUnavailable,
                format!("connection to {} was lost", self.server),
            )
        })?;
        let sender = self.sender.clone();

        let (conn, result) = run_blocking("RCPT", &self.server, self.timeout, move || {
            let result = rcpt_and_reset(&mut conn, recipient, sender);
            Ok((conn, result))
        })
        .await?;

        self.connection = Some(conn);
        result.map_err(|e| from_smtp_error(&e, &self.server))
    }
}

#[async_trait]
impl DomainSession for SmtpDomainSession {
    async fn detect_catch_all(&mut self, domain: &str, attempts: u32) -> bool {
        let local: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(20)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();
        let random_address = format!("{}@{}", local, domain);

        let accepted = self.probe(&random_address, attempts).await.is_ok();
        tracing::debug!(target: "smtp_task", "Catch-all probe of {} via {}: {}", domain, self.server, accepted);
        accepted
    }

    async fn probe(&mut self, address: &str, attempts: u32) -> Result<(), SessionError> {
        let recipient = parse_address(address)?;
        let attempts = attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.rcpt(recipient.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind.is_transient() && attempt < attempts && self.connection.is_some() => {
                    tracing::debug!(target: "smtp_task",
                        "Attempt {}/{} for <{}> on {} failed transiently: {}",
                        attempt, attempts, address, self.server, e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn close(&mut self) {
        let Some(mut conn) = self.connection.take() else {
            return;
        };
        let result = run_blocking("QUIT", &self.server, self.timeout, move || {
            conn.quit().map(|_| ())
        })
        .await;
        if let Err(e) = result {
            tracing::debug!(target: "smtp_task", "QUIT to {} did not complete cleanly: {}", self.server, e);
        }
    }
}
