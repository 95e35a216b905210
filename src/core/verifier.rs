//! The verification engine: a bounded pool of domain workers, each holding one
//! SMTP session per domain batch, with a two-way join per address.
//!
//! Scheduling is per domain, not per address. A domain with many addresses
//! keeps its worker busy until the whole batch is done while other domains
//! wait for a free worker; this keeps exactly one connection per domain open.

use crate::core::classify::{
    classify_connect_error, classify_probe_error, ConnectClassification, ErrorPair,
    ProbeClassification,
};
use crate::core::config::{build_http_client, Config};
use crate::core::error::{AppError, Result};
use crate::core::grouping::{group_by_domain, DomainBatch};
use crate::core::models::{Address, Lookup};
use crate::utils::address::parse_address;
use crate::utils::dns::create_resolver;
use crate::utils::smtp::{DomainSession, SessionFactory, SmtpSessionFactory};
use crate::verification::{
    AvatarChecker, DisposableChecker, DisposableList, GravatarChecker, NoAvatarCheck,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinSet};

/// Verifies email addresses by probing their mail exchanges.
///
/// Cheap to clone; clones share configuration and collaborators.
#[derive(Clone)]
pub struct Verifier {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    sessions: Arc<dyn SessionFactory>,
    disposable: Arc<dyn DisposableChecker>,
    avatar: Arc<dyn AvatarChecker>,
}

/// Domain level facts, owned by the worker handling the batch.
///
/// `host_exists` may only go from true to false, and only between two
/// addresses, after the join of the downgrading address has completed.
struct BatchState {
    host_exists: bool,
    catch_all: bool,
    disposable: bool,
    connect_error: Option<ErrorPair>,
}

/// A session shared with the spawned tasks that drive it.
type SharedSession = Arc<Mutex<Box<dyn DomainSession>>>;

/// Why a batch runs without a session.
enum Opened {
    HostAbsent,
    Failed(ErrorPair),
}

const TASK_FAILURE_SUMMARY: &str = "Verification task failed";

fn task_failure(err: &JoinError) -> ErrorPair {
    ErrorPair {
        summary: TASK_FAILURE_SUMMARY.to_string(),
        detail: Some(err.to_string()),
    }
}

enum ProbeOutcome {
    /// No session, or the host was found absent earlier in the batch.
    Skipped,
    /// Domain accepts any recipient; the probe was not run.
    CatchAll,
    Deliverable,
    Failed(ProbeClassification),
}

impl Verifier {
    /// Creates a verifier wired to the SMTP, disposable-list and Gravatar
    /// collaborators described by `config`.
    pub async fn new(config: &Config) -> Result<Self> {
        tracing::debug!("Initializing Verifier components...");
        let http_client = build_http_client(config)?;
        let resolver = Arc::new(create_resolver(config)?);
        tracing::debug!("DNS resolver initialized.");

        let disposable = DisposableList::builtin();
        if let Some(ref url) = config.disposable_list_url {
            disposable.refresh(&http_client, url).await;
        }

        let avatar: Arc<dyn AvatarChecker> = if config.enable_avatar_check {
            Arc::new(GravatarChecker::new(http_client))
        } else {
            tracing::debug!("Avatar checks disabled.");
            Arc::new(NoAvatarCheck)
        };

        tracing::info!("Verifier initialized successfully.");
        Ok(Self::with_collaborators(
            config.clone(),
            Arc::new(SmtpSessionFactory::new(resolver)),
            Arc::new(disposable),
            avatar,
        ))
    }

    /// Creates a verifier over caller supplied collaborators.
    pub fn with_collaborators(
        config: Config,
        sessions: Arc<dyn SessionFactory>,
        disposable: Arc<dyn DisposableChecker>,
        avatar: Arc<dyn AvatarChecker>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                sessions,
                disposable,
                avatar,
            }),
        }
    }

    /// Parses and verifies a single address.
    ///
    /// Returns [`AppError::AddressParse`] when `email` is not an address.
    pub async fn verify_single(&self, email: &str) -> Result<Lookup> {
        let address = parse_address(email)?;
        self.verify(vec![address])
            .await
            .pop()
            .ok_or_else(|| AppError::Task(format!("no lookup produced for {}", email)))
    }

    /// Parses every input and verifies the ones that parse.
    ///
    /// Inputs that fail to parse are returned alongside their error and do
    /// not produce a lookup.
    pub async fn verify_strings<I, S>(&self, inputs: I) -> (Vec<Lookup>, Vec<(String, AppError)>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut addresses = Vec::new();
        let mut rejected = Vec::new();
        for input in inputs {
            let raw = input.as_ref();
            match parse_address(raw) {
                Ok(address) => addresses.push(address),
                Err(e) => {
                    tracing::warn!(target: "verify_task", "Skipping '{}': {}", raw, e);
                    rejected.push((raw.to_string(), e));
                }
            }
        }
        (self.verify(addresses).await, rejected)
    }

    /// Verifies `addresses`, returning exactly one lookup per address in no
    /// particular order. Never fails; every failure ends up in a lookup.
    pub async fn verify(&self, addresses: Vec<Address>) -> Vec<Lookup> {
        let total = addresses.len();
        let expected = addresses.clone();
        let batches = group_by_domain(addresses);
        if batches.is_empty() {
            return Vec::new();
        }

        let domain_count = batches.len();
        let worker_count = self.inner.config.max_workers.max(1).min(domain_count);
        tracing::info!(target: "verify_task",
            "Verifying {} addresses across {} domains with {} workers",
            total, domain_count, worker_count
        );
        let start_time = Instant::now();

        let (job_tx, job_rx) = mpsc::channel::<DomainBatch>(domain_count);
        let (result_tx, mut result_rx) = mpsc::channel::<Lookup>(total);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            workers.spawn(run_worker(
                worker_id,
                Arc::clone(&self.inner),
                Arc::clone(&job_rx),
                result_tx.clone(),
            ));
        }
        drop(result_tx);

        for batch in batches {
            if let Err(e) = job_tx.try_send(batch) {
                tracing::error!(target: "verify_task", "Failed to queue domain batch: {}", e);
            }
        }
        drop(job_tx);

        let mut lookups = Vec::with_capacity(total);
        while lookups.len() < total {
            match result_rx.recv().await {
                Some(lookup) => lookups.push(lookup),
                None => {
                    tracing::error!(target: "verify_task",
                        "All workers exited with {}/{} lookups collected", lookups.len(), total);
                    break;
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(target: "verify_task", "A domain worker failed to join: {}", e);
            }
        }

        if lookups.len() < total {
            backfill_missing(&expected, &mut lookups);
        }

        tracing::info!(target: "verify_task",
            "Verified {} addresses in {:.2?}", lookups.len(), start_time.elapsed());
        lookups
    }
}

/// Adds a failed lookup for every expected address that got none, so the
/// output always holds one lookup per input.
fn backfill_missing(expected: &[Address], lookups: &mut Vec<Lookup>) {
    let mut produced: HashMap<String, usize> = HashMap::new();
    for lookup in lookups.iter() {
        *produced.entry(lookup.address.clone()).or_default() += 1;
    }
    for address in expected {
        match produced.get_mut(&address.address) {
            Some(count) if *count > 0 => *count -= 1,
            _ => {
                tracing::error!(target: "verify_task", "No lookup produced for <{}>", address.address);
                let mut lookup = Lookup::for_address(address);
                lookup.host_exists = true;
                lookup.error_summary = Some(TASK_FAILURE_SUMMARY.to_string());
                lookup.error_detail = Some("no result was produced for this address".to_string());
                lookups.push(lookup);
            }
        }
    }
}

/// Pulls whole domain batches until the job queue is drained.
async fn run_worker(
    worker_id: usize,
    inner: Arc<Inner>,
    jobs: Arc<Mutex<mpsc::Receiver<DomainBatch>>>,
    results: mpsc::Sender<Lookup>,
) {
    loop {
        let next = jobs.lock().await.recv().await;
        let Some(batch) = next else {
            break;
        };
        tracing::debug!(target: "verify_task",
            "[worker {}] Took {} ({} addresses)", worker_id, batch.domain, batch.addresses.len());
        inner.verify_batch(batch, &results).await;
    }
    tracing::trace!(target: "verify_task", "[worker {}] Job queue drained", worker_id);
}

impl Inner {
    async fn verify_batch(&self, batch: DomainBatch, results: &mpsc::Sender<Lookup>) {
        let DomainBatch { domain, addresses } = batch;
        let config = &self.config;

        let mut state = BatchState {
            host_exists: true,
            catch_all: false,
            disposable: self.disposable.is_disposable(&domain),
            connect_error: None,
        };

        let session = match self.open_session(&domain).await {
            Ok(session) => Some(session),
            Err(Opened::HostAbsent) => {
                state.host_exists = false;
                None
            }
            Err(Opened::Failed(pair)) => {
                state.connect_error = Some(pair);
                None
            }
        };

        if let Some(ref session) = session {
            let session = Arc::clone(session);
            let catch_all_domain = domain.clone();
            let attempts = config.catch_all_attempts;
            let detected = tokio::spawn(async move {
                session
                    .lock()
                    .await
                    .detect_catch_all(&catch_all_domain, attempts)
                    .await
            })
            .await;
            state.catch_all = detected.unwrap_or_else(|e| {
                tracing::error!(target: "verify_task", "[{}] Catch-all check failed: {}", domain, e);
                false
            });
            if state.catch_all {
                tracing::info!(target: "verify_task", "[{}] Domain is catch-all; skipping per-address probes", domain);
            }
        }

        for address in &addresses {
            let lookup = self
                .verify_address(address, session.as_ref(), &mut state)
                .await;
            if let Err(e) = results.try_send(lookup) {
                tracing::error!(target: "verify_task", "[{}] Failed to emit lookup: {}", domain, e);
            }
        }

        if let Some(session) = session {
            let closed = tokio::spawn(async move { session.lock().await.close().await }).await;
            match closed {
                Ok(()) => tracing::debug!(target: "verify_task", "[{}] Session closed", domain),
                Err(e) => tracing::error!(target: "verify_task", "[{}] Closing the session failed: {}", domain, e),
            }
        }
    }

    async fn open_session(&self, domain: &str) -> std::result::Result<SharedSession, Opened> {
        let config = &self.config;
        let sessions = Arc::clone(&self.sessions);
        let open_domain = domain.to_string();
        let hostname = config.hostname.clone();
        let source_address = config.source_address.clone();
        let timeout = config.smtp_timeout;

        let opened = tokio::spawn(async move {
            sessions
                .open(&open_domain, &hostname, &source_address, timeout)
                .await
        })
        .await;

        match opened {
            Ok(Ok(session)) => Ok(Arc::new(Mutex::new(session))),
            Ok(Err(err)) => match classify_connect_error(&err) {
                ConnectClassification::HostAbsent => {
                    tracing::info!(target: "verify_task", "[{}] No mail exchange: {}", domain, err);
                    Err(Opened::HostAbsent)
                }
                ConnectClassification::Failure(pair) => {
                    tracing::warn!(target: "verify_task", "[{}] Could not open session: {}", domain, err);
                    Err(Opened::Failed(pair))
                }
            },
            Err(e) => {
                tracing::error!(target: "verify_task", "[{}] Opening a session failed: {}", domain, e);
                Err(Opened::Failed(task_failure(&e)))
            }
        }
    }

    /// Runs the probe and the avatar check as two spawned tasks and waits for
    /// both. A task that panics yields a failed probe or a missing avatar,
    /// never a missing lookup.
    async fn verify_address(
        &self,
        address: &Address,
        session: Option<&SharedSession>,
        state: &mut BatchState,
    ) -> Lookup {
        let attempts = self.config.probe_attempts;
        let catch_all = state.catch_all;

        let probe = match session {
            _ if catch_all => None,
            Some(session) if state.host_exists => {
                let session = Arc::clone(session);
                let recipient = address.address.clone();
                Some(tokio::spawn(async move {
                    session.lock().await.probe(&recipient, attempts).await
                }))
            }
            _ => None,
        };
        let avatar = {
            let avatar = Arc::clone(&self.avatar);
            let address = address.clone();
            tokio::spawn(async move { avatar.exists(&address).await })
        };

        let probe = async {
            match probe {
                None if catch_all => ProbeOutcome::CatchAll,
                None => ProbeOutcome::Skipped,
                Some(handle) => match handle.await {
                    Ok(Ok(())) => ProbeOutcome::Deliverable,
                    Ok(Err(err)) => {
                        tracing::debug!(target: "verify_task", "Probe of <{}> failed: {}", address.address, err);
                        ProbeOutcome::Failed(classify_probe_error(&err))
                    }
                    Err(e) => {
                        tracing::error!(target: "verify_task", "Probe task for <{}> failed: {}", address.address, e);
                        ProbeOutcome::Failed(ProbeClassification::Failure(task_failure(&e)))
                    }
                },
            }
        };
        let avatar = async {
            avatar.await.unwrap_or_else(|e| {
                tracing::error!(target: "verify_task", "Avatar task for <{}> failed: {}", address.address, e);
                false
            })
        };

        let (outcome, avatar_exists) = tokio::join!(probe, avatar);

        let mut lookup = Lookup::for_address(address);
        lookup.disposable = state.disposable;
        lookup.avatar_exists = avatar_exists;

        match outcome {
            ProbeOutcome::CatchAll => {
                lookup.catch_all = true;
                lookup.deliverable = true;
            }
            ProbeOutcome::Deliverable => lookup.deliverable = true,
            ProbeOutcome::Skipped => {}
            ProbeOutcome::Failed(ProbeClassification::FullInbox) => lookup.full_inbox = true,
            ProbeOutcome::Failed(ProbeClassification::HostAbsent) => {
                tracing::info!(target: "verify_task",
                    "[{}] Host reported absent while probing <{}>; remaining addresses skipped",
                    address.domain, address.address
                );
                state.host_exists = false;
            }
            ProbeOutcome::Failed(ProbeClassification::Failure(pair)) => {
                lookup.error_summary = Some(pair.summary);
                lookup.error_detail = pair.detail;
            }
        }

        lookup.host_exists = state.host_exists;
        if let Some(ref pair) = state.connect_error {
            lookup.error_summary = Some(pair.summary.clone());
            lookup.error_detail = pair.detail.clone();
        }

        debug_assert!(lookup.check_invariants().is_ok(), "{:?}", lookup);
        lookup
    }
}
