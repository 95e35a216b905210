//! Behaviour of the verification engine over scripted collaborators.

use async_trait::async_trait;
use email_verifier_core::{
    parse_address, Address, AppError, AvatarChecker, Config, DisposableChecker, DisposableList,
    DomainSession, FailureKind, Lookup, NoAvatarCheck, SessionError, SessionFactory, Verifier,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How a scripted domain behaves.
#[derive(Clone, Default)]
struct DomainScript {
    open_error: Option<FailureKind>,
    catch_all: bool,
    /// Probe failures by full address; unlisted addresses are accepted.
    probe_errors: HashMap<String, FailureKind>,
}

#[derive(Default)]
struct Recorder {
    opens: Mutex<Vec<String>>,
    closes: Mutex<Vec<String>>,
    probes: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Recorder {
    fn opens_of(&self, domain: &str) -> usize {
        self.opens.lock().iter().filter(|d| *d == domain).count()
    }

    fn closes_of(&self, domain: &str) -> usize {
        self.closes.lock().iter().filter(|d| *d == domain).count()
    }
}

#[derive(Clone, Default)]
struct ScriptedFactory {
    scripts: Arc<HashMap<String, DomainScript>>,
    recorder: Arc<Recorder>,
    delay: Duration,
}

struct ScriptedSession {
    domain: String,
    script: DomainScript,
    recorder: Arc<Recorder>,
    delay: Duration,
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(
        &self,
        domain: &str,
        _local_hostname: &str,
        _source_address: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn DomainSession>, SessionError> {
        let script = self.scripts.get(domain).cloned().unwrap_or_default();
        if let Some(kind) = script.open_error {
            return Err(SessionError::new(kind, format!("cannot reach {}", domain)));
        }

        self.recorder.opens.lock().push(domain.to_string());
        let now = self.recorder.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        Ok(Box::new(ScriptedSession {
            domain: domain.to_string(),
            script,
            recorder: Arc::clone(&self.recorder),
            delay: self.delay,
        }))
    }
}

#[async_trait]
impl DomainSession for ScriptedSession {
    async fn detect_catch_all(&mut self, _domain: &str, _attempts: u32) -> bool {
        self.script.catch_all
    }

    async fn probe(&mut self, address: &str, _attempts: u32) -> Result<(), SessionError> {
        self.recorder.probes.lock().push(address.to_string());
        tokio::time::sleep(self.delay).await;
        match self.script.probe_errors.get(address) {
            Some(kind) => Err(SessionError::new(*kind, format!("rejected {}", address))),
            None => Ok(()),
        }
    }

    async fn close(&mut self) {
        self.recorder.active.fetch_sub(1, Ordering::SeqCst);
        self.recorder.closes.lock().push(self.domain.clone());
    }
}

/// Avatar checker that answers true for a fixed set of addresses.
struct KnownAvatars(HashSet<String>);

#[async_trait]
impl AvatarChecker for KnownAvatars {
    async fn exists(&self, address: &Address) -> bool {
        self.0.contains(&address.address)
    }
}

/// Avatar checker whose task panics for one address.
struct PanickingAvatar(&'static str);

#[async_trait]
impl AvatarChecker for PanickingAvatar {
    async fn exists(&self, address: &Address) -> bool {
        if address.address == self.0 {
            panic!("avatar lookup blew up for {}", address.address);
        }
        true
    }
}

/// Session factory whose sessions panic when probing one address.
struct PanickingProbeFactory {
    inner: ScriptedFactory,
    panic_on: &'static str,
}

struct PanickingProbeSession {
    inner: Box<dyn DomainSession>,
    panic_on: &'static str,
}

#[async_trait]
impl SessionFactory for PanickingProbeFactory {
    async fn open(
        &self,
        domain: &str,
        local_hostname: &str,
        source_address: &str,
        timeout: Duration,
    ) -> Result<Box<dyn DomainSession>, SessionError> {
        let inner = self
            .inner
            .open(domain, local_hostname, source_address, timeout)
            .await?;
        Ok(Box::new(PanickingProbeSession {
            inner,
            panic_on: self.panic_on,
        }))
    }
}

#[async_trait]
impl DomainSession for PanickingProbeSession {
    async fn detect_catch_all(&mut self, domain: &str, attempts: u32) -> bool {
        self.inner.detect_catch_all(domain, attempts).await
    }

    async fn probe(&mut self, address: &str, attempts: u32) -> Result<(), SessionError> {
        if address == self.panic_on {
            panic!("session blew up on {}", address);
        }
        self.inner.probe(address, attempts).await
    }

    async fn close(&mut self) {
        self.inner.close().await
    }
}

fn verifier_with(
    factory: ScriptedFactory,
    max_workers: usize,
    avatar: Arc<dyn AvatarChecker>,
) -> Verifier {
    let config = Config {
        max_workers,
        ..Config::default()
    };
    let disposable: Arc<dyn DisposableChecker> = Arc::new(DisposableList::builtin());
    Verifier::with_collaborators(config, Arc::new(factory), disposable, avatar)
}

fn verifier(factory: ScriptedFactory) -> Verifier {
    verifier_with(factory, 4, Arc::new(NoAvatarCheck))
}

fn addresses(inputs: &[&str]) -> Vec<Address> {
    inputs.iter().map(|s| parse_address(s).unwrap()).collect()
}

fn find<'a>(lookups: &'a [Lookup], address: &str) -> &'a Lookup {
    lookups
        .iter()
        .find(|l| l.address == address)
        .unwrap_or_else(|| panic!("no lookup for {}", address))
}

fn scripts(entries: Vec<(&str, DomainScript)>) -> Arc<HashMap<String, DomainScript>> {
    Arc::new(
        entries
            .into_iter()
            .map(|(d, s)| (d.to_string(), s))
            .collect(),
    )
}

#[tokio::test]
async fn test_empty_input_yields_empty_output() {
    let factory = ScriptedFactory::default();
    let recorder = Arc::clone(&factory.recorder);
    let lookups = verifier(factory).verify(Vec::new()).await;
    assert!(lookups.is_empty());
    assert!(recorder.opens.lock().is_empty());
}

#[tokio::test]
async fn test_one_lookup_per_input_and_one_session_per_domain() {
    let factory = ScriptedFactory::default();
    let recorder = Arc::clone(&factory.recorder);
    let input = addresses(&[
        "a@one.example",
        "b@two.example",
        "c@one.example",
        "d@three.example",
        "e@one.example",
        "a@one.example",
    ]);

    let lookups = verifier(factory).verify(input.clone()).await;

    assert_eq!(lookups.len(), input.len());
    let mut got: Vec<&str> = lookups.iter().map(|l| l.address.as_str()).collect();
    let mut want: Vec<&str> = input.iter().map(|a| a.address.as_str()).collect();
    got.sort_unstable();
    want.sort_unstable();
    assert_eq!(got, want);

    for domain in ["one.example", "two.example", "three.example"] {
        assert_eq!(recorder.opens_of(domain), 1, "opens of {}", domain);
        assert_eq!(recorder.closes_of(domain), 1, "closes of {}", domain);
    }
    assert_eq!(recorder.probes.lock().len(), input.len());
}

#[tokio::test]
async fn test_good_and_missing_mailboxes() {
    let mut probe_errors = HashMap::new();
    probe_errors.insert("missing@example.com".to_string(), FailureKind::MailboxUnavailable);
    let factory = ScriptedFactory {
        scripts: scripts(vec![(
            "example.com",
            DomainScript {
                probe_errors,
                ..DomainScript::default()
            },
        )]),
        ..ScriptedFactory::default()
    };

    let lookups = verifier(factory)
        .verify(addresses(&["good@example.com", "missing@example.com"]))
        .await;

    let good = find(&lookups, "good@example.com");
    assert_eq!(good.username, "good");
    assert_eq!(good.domain, "example.com");
    assert!(good.host_exists && good.deliverable);
    assert!(!good.catch_all && !good.full_inbox && !good.disposable);
    assert!(good.error_summary.is_none() && good.error_detail.is_none());

    let missing = find(&lookups, "missing@example.com");
    assert!(missing.host_exists);
    assert!(!missing.deliverable);
    assert_eq!(missing.error_summary.as_deref(), Some("Mailbox unavailable"));
    assert_eq!(missing.error_detail.as_deref(), Some("rejected missing@example.com"));
}

#[tokio::test]
async fn test_catch_all_domain_skips_probes() {
    let factory = ScriptedFactory {
        scripts: scripts(vec![(
            "catchall.example",
            DomainScript {
                catch_all: true,
                ..DomainScript::default()
            },
        )]),
        ..ScriptedFactory::default()
    };
    let recorder = Arc::clone(&factory.recorder);

    let lookups = verifier(factory)
        .verify(addresses(&["x@catchall.example", "y@catchall.example"]))
        .await;

    assert_eq!(lookups.len(), 2);
    for lookup in &lookups {
        assert!(lookup.catch_all && lookup.deliverable && lookup.host_exists);
        assert!(lookup.error_summary.is_none());
    }
    assert!(recorder.probes.lock().is_empty());
    assert_eq!(recorder.closes_of("catchall.example"), 1);
}

#[tokio::test]
async fn test_worker_count_bounded_by_domains() {
    let factory = ScriptedFactory {
        delay: Duration::from_millis(50),
        ..ScriptedFactory::default()
    };
    let recorder = Arc::clone(&factory.recorder);

    let lookups = verifier_with(factory, 10, Arc::new(NoAvatarCheck))
        .verify(addresses(&["a@d1.example", "b@d2.example", "c@d3.example"]))
        .await;

    assert_eq!(lookups.len(), 3);
    assert_eq!(recorder.peak.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_single_worker_serializes_domains() {
    let factory = ScriptedFactory {
        delay: Duration::from_millis(10),
        ..ScriptedFactory::default()
    };
    let recorder = Arc::clone(&factory.recorder);

    let lookups = verifier_with(factory, 1, Arc::new(NoAvatarCheck))
        .verify(addresses(&["a@d1.example", "b@d2.example", "c@d3.example", "d@d1.example"]))
        .await;

    assert_eq!(lookups.len(), 4);
    assert_eq!(recorder.peak.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.opens.lock().len(), 3);
}

#[tokio::test]
async fn test_avatar_independent_of_probe_failure() {
    let mut probe_errors = HashMap::new();
    probe_errors.insert("jane@busy.example".to_string(), FailureKind::TryAgainLater);
    let factory = ScriptedFactory {
        scripts: scripts(vec![(
            "busy.example",
            DomainScript {
                probe_errors,
                ..DomainScript::default()
            },
        )]),
        ..ScriptedFactory::default()
    };
    let avatars = KnownAvatars(["jane@busy.example".to_string()].into_iter().collect());

    let lookups = verifier_with(factory, 2, Arc::new(avatars))
        .verify(addresses(&["jane@busy.example", "john@busy.example"]))
        .await;

    let jane = find(&lookups, "jane@busy.example");
    assert!(jane.avatar_exists);
    assert!(!jane.deliverable);
    assert_eq!(jane.error_summary.as_deref(), Some("Try again later"));

    let john = find(&lookups, "john@busy.example");
    assert!(!john.avatar_exists);
    assert!(john.deliverable);
}

#[tokio::test]
async fn test_full_inbox_reported_as_flag() {
    let mut probe_errors = HashMap::new();
    probe_errors.insert("full@quota.example".to_string(), FailureKind::MailboxFull);
    let factory = ScriptedFactory {
        scripts: scripts(vec![(
            "quota.example",
            DomainScript {
                probe_errors,
                ..DomainScript::default()
            },
        )]),
        ..ScriptedFactory::default()
    };

    let lookups = verifier(factory).verify(addresses(&["full@quota.example"])).await;
    let lookup = find(&lookups, "full@quota.example");
    assert!(lookup.full_inbox && lookup.host_exists);
    assert!(!lookup.deliverable);
    assert!(lookup.error_summary.is_none());
}

#[tokio::test]
async fn test_absent_host_at_connect() {
    let factory = ScriptedFactory {
        scripts: scripts(vec![(
            "nowhere.invalid",
            DomainScript {
                open_error: Some(FailureKind::HostAbsent),
                ..DomainScript::default()
            },
        )]),
        ..ScriptedFactory::default()
    };
    let recorder = Arc::clone(&factory.recorder);

    let lookups = verifier(factory)
        .verify(addresses(&["a@nowhere.invalid", "b@nowhere.invalid"]))
        .await;

    assert_eq!(lookups.len(), 2);
    for lookup in &lookups {
        assert!(!lookup.host_exists && !lookup.deliverable);
        assert!(lookup.error_summary.is_none() && lookup.error_detail.is_none());
    }
    assert!(recorder.probes.lock().is_empty());
    assert!(recorder.closes.lock().is_empty());
}

#[tokio::test]
async fn test_connect_failure_marks_every_address() {
    let factory = ScriptedFactory {
        scripts: scripts(vec![(
            "slow.example",
            DomainScript {
                open_error: Some(FailureKind::Timeout),
                ..DomainScript::default()
            },
        )]),
        ..ScriptedFactory::default()
    };

    let lookups = verifier(factory)
        .verify(addresses(&["a@slow.example", "b@slow.example", "c@fine.example"]))
        .await;

    for address in ["a@slow.example", "b@slow.example"] {
        let lookup = find(&lookups, address);
        assert!(lookup.host_exists && !lookup.deliverable);
        assert_eq!(
            lookup.error_summary.as_deref(),
            Some("The connection to the mail server has timed out")
        );
        assert_eq!(lookup.error_detail.as_deref(), Some("cannot reach slow.example"));
    }
    let fine = find(&lookups, "c@fine.example");
    assert!(fine.deliverable && fine.error_summary.is_none());
}

#[tokio::test]
async fn test_host_absent_while_probing_downgrades_later_addresses() {
    let mut probe_errors = HashMap::new();
    probe_errors.insert("b@vanish.example".to_string(), FailureKind::HostAbsent);
    let factory = ScriptedFactory {
        scripts: scripts(vec![(
            "vanish.example",
            DomainScript {
                probe_errors,
                ..DomainScript::default()
            },
        )]),
        ..ScriptedFactory::default()
    };
    let recorder = Arc::clone(&factory.recorder);

    let lookups = verifier(factory)
        .verify(addresses(&["a@vanish.example", "b@vanish.example", "c@vanish.example"]))
        .await;

    assert!(find(&lookups, "a@vanish.example").host_exists);
    assert!(find(&lookups, "a@vanish.example").deliverable);
    for address in ["b@vanish.example", "c@vanish.example"] {
        let lookup = find(&lookups, address);
        assert!(!lookup.host_exists && !lookup.deliverable);
        assert!(lookup.error_summary.is_none());
    }
    let probes = recorder.probes.lock().clone();
    assert_eq!(probes, vec!["a@vanish.example", "b@vanish.example"]);
    assert_eq!(recorder.closes_of("vanish.example"), 1);
}

#[tokio::test]
async fn test_verify_single_rejects_malformed_input() {
    let v = verifier(ScriptedFactory::default());
    assert!(matches!(
        v.verify_single("not-an-email").await,
        Err(AppError::AddressParse(_))
    ));

    let lookup = v.verify_single("Someone@Example.ORG").await.unwrap();
    assert_eq!(lookup.domain, "example.org");
    assert!(lookup.deliverable);
}

#[tokio::test]
async fn test_disposable_domain_flagged() {
    let lookups = verifier(ScriptedFactory::default())
        .verify(addresses(&["temp@yopmail.com"]))
        .await;
    assert!(lookups[0].disposable);
    assert!(lookups[0].deliverable);
}

#[tokio::test]
async fn test_panicking_avatar_check_keeps_every_lookup() {
    let factory = ScriptedFactory::default();
    let recorder = Arc::clone(&factory.recorder);

    let lookups = verifier_with(factory, 2, Arc::new(PanickingAvatar("boom@x.example")))
        .verify(addresses(&["a@x.example", "boom@x.example", "c@x.example"]))
        .await;

    assert_eq!(lookups.len(), 3);
    let boom = find(&lookups, "boom@x.example");
    assert!(!boom.avatar_exists);
    assert!(boom.deliverable && boom.error_summary.is_none());
    assert!(find(&lookups, "a@x.example").avatar_exists);
    assert!(find(&lookups, "c@x.example").avatar_exists);
    assert_eq!(recorder.probes.lock().len(), 3);
    assert_eq!(recorder.closes_of("x.example"), 1);
}

#[tokio::test]
async fn test_panicking_probe_fails_only_its_address() {
    let inner = ScriptedFactory::default();
    let recorder = Arc::clone(&inner.recorder);
    let factory = PanickingProbeFactory {
        inner,
        panic_on: "boom@y.example",
    };
    let v = Verifier::with_collaborators(
        Config::default(),
        Arc::new(factory),
        Arc::new(DisposableList::builtin()),
        Arc::new(NoAvatarCheck),
    );

    let lookups = v
        .verify(addresses(&["a@y.example", "boom@y.example", "c@y.example"]))
        .await;

    assert_eq!(lookups.len(), 3);
    let boom = find(&lookups, "boom@y.example");
    assert!(boom.host_exists && !boom.deliverable);
    assert_eq!(boom.error_summary.as_deref(), Some("Verification task failed"));
    assert!(boom.error_detail.is_some());
    assert!(find(&lookups, "a@y.example").deliverable);
    assert!(find(&lookups, "c@y.example").deliverable);
    assert_eq!(recorder.closes_of("y.example"), 1);
}
