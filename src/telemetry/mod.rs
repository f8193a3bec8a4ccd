//! The reporting daemon: one background worker that sends telemetry.
//!
//! ```text
//! tick ─► reload? ─► active? ─► due today? ─► collect (blocking pool) ─► send
//!   ▲                                                                    │
//!   └──────────────── sleep(interval) / cancelled ◄──────────────────────┘
//! ```
//!
//! Lifecycle calls (`start`, `stop`, `restart`, `reload_settings`) are
//! synchronous and may come from any thread. Cancellation is cooperative:
//! the worker only notices `stop()` at the loop top or while sleeping.

pub mod delivery;
pub mod singleton;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeZone, Utc};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::collector::CollectorRegistry;
use crate::domain::consent::ConsentRecord;
use crate::domain::identity::InstallationIdentity;
use crate::domain::settings_store::{Settings, SettingsStore};
use crate::domain::types::{CategoryInfo, DaemonState, DaemonStatus};
use crate::error::ConfigurationError;
use crate::geoip::GeoIpRegistry;

use self::delivery::Delivery;
use self::singleton::Singleton;

static DAEMON: Singleton<ReportingDaemon> = Singleton::new();

/// The process-wide daemon, constructed by `init` on first access.
pub fn instance(
    init: impl FnOnce() -> Result<ReportingDaemon, ConfigurationError>,
) -> Result<Arc<ReportingDaemon>, ConfigurationError> {
    DAEMON.get_or_try_init(init)
}

/// The process-wide daemon, if it has been constructed.
pub fn global() -> Option<Arc<ReportingDaemon>> {
    DAEMON.get()
}

/// Whether a report should be attempted: never sent, or last sent on an
/// earlier (or later) calendar day in `now`'s time zone.
pub fn is_due<Tz: TimeZone>(last_sent: Option<DateTime<Utc>>, now: &DateTime<Tz>) -> bool {
    match last_sent {
        None => true,
        Some(sent) => sent.with_timezone(&now.timezone()).date_naive() != now.date_naive(),
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Inactive,
    NotDue,
    Sent,
    Transient,
    Fatal,
}

/// Everything the daemon is built from.
pub struct DaemonParts {
    pub registry: Arc<CollectorRegistry>,
    pub store: Arc<dyn SettingsStore>,
    pub delivery: Arc<dyn Delivery>,
    pub identity: InstallationIdentity,
    pub geoip: Arc<GeoIpRegistry>,
}

/// Last settings and consent read from the store.
struct View {
    settings: Settings,
    consent: ConsentRecord,
}

struct Shared {
    registry: Arc<CollectorRegistry>,
    store: Arc<dyn SettingsStore>,
    delivery: Arc<dyn Delivery>,
    identity: InstallationIdentity,
    reload_requested: AtomicBool,
    view: Mutex<View>,
    // Held for a whole tick so two workers (restart overlap) never interleave.
    tick_lock: tokio::sync::Mutex<()>,
}

struct Worker {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

pub struct ReportingDaemon {
    shared: Arc<Shared>,
    geoip: Arc<GeoIpRegistry>,
    worker: Mutex<Option<Worker>>,
    runtime: Handle,
    started_at: Instant,
}

impl ReportingDaemon {
    /// Build a stopped daemon. Must be called from within a tokio runtime;
    /// the worker is later spawned onto that runtime.
    pub fn new(parts: DaemonParts) -> Result<Self, ConfigurationError> {
        let runtime = Handle::try_current().map_err(|_| ConfigurationError::NoRuntime)?;

        let shared = Shared {
            registry: parts.registry,
            store: parts.store,
            delivery: parts.delivery,
            identity: parts.identity,
            reload_requested: AtomicBool::new(false),
            view: Mutex::new(View {
                settings: Settings::default(),
                consent: ConsentRecord::default(),
            }),
            tick_lock: tokio::sync::Mutex::new(()),
        };
        if let Err(e) = shared.reload() {
            warn!(error = %e, "initial settings read failed, will retry on first tick");
            shared.request_reload();
        }

        Ok(Self {
            shared: Arc::new(shared),
            geoip: parts.geoip,
            worker: Mutex::new(None),
            runtime,
            started_at: Instant::now(),
        })
    }

    /// Stopped → Running. A no-op while a worker is alive.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = worker.as_ref() {
            if !current.join.is_finished() {
                debug!("reporting daemon already running");
                return;
            }
        }

        // A fresh worker always starts from the stored settings.
        self.shared.request_reload();
        let cancel = CancellationToken::new();
        let join = self
            .runtime
            .spawn(run_worker(self.shared.clone(), cancel.clone()));
        *worker = Some(Worker { cancel, join });
        info!("reporting daemon started");
    }

    /// Running → Stopped. Signals the worker and returns without waiting.
    pub fn stop(&self) {
        let taken = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = taken {
            worker.cancel.cancel();
            info!("reporting daemon stop requested");
        }
    }

    pub fn restart(&self) {
        self.stop();
        self.start();
    }

    /// Re-read settings and consent before the next collection decision.
    /// Starts the daemon if it is stopped.
    pub fn reload_settings(&self) {
        self.shared.request_reload();
        info!("settings reload requested");
        if self.state() == DaemonState::Stopped {
            self.start();
        }
    }

    /// Stop and wait for the worker to finish its current tick.
    pub async fn shutdown(&self) {
        let taken = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = taken {
            worker.cancel.cancel();
            if let Err(e) = worker.join.await {
                warn!(error = %e, "reporting worker ended abnormally");
            }
        }
    }

    pub fn state(&self) -> DaemonState {
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        match worker.as_ref() {
            Some(w) if !w.join.is_finished() => DaemonState::Running,
            _ => DaemonState::Stopped,
        }
    }

    pub fn status(&self) -> DaemonStatus {
        let state = self.state();
        let view = self.shared.view();
        DaemonStatus::new(state, &view.consent, &view.settings)
    }

    pub fn selected_geoip_provider(&self) -> String {
        self.shared.view().settings.geoip_provider.clone()
    }

    pub fn available_geoip_providers(&self) -> BTreeMap<String, String> {
        self.geoip.available()
    }

    /// Registered categories with their current consent.
    pub fn categories(&self) -> Vec<CategoryInfo> {
        let view = self.shared.view();
        self.shared
            .registry
            .categories()
            .into_iter()
            .map(|(code, description)| CategoryInfo {
                enabled: view.consent.is_category_enabled(&code),
                code,
                description,
            })
            .collect()
    }

    pub fn identity(&self) -> &InstallationIdentity {
        &self.shared.identity
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl Shared {
    fn view(&self) -> std::sync::MutexGuard<'_, View> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_reload(&self) {
        self.reload_requested.store(true, Ordering::SeqCst);
    }

    fn reload(&self) -> Result<(), crate::error::StoreError> {
        let settings = self.store.read_settings()?;
        let consent = self.store.read_consent()?;
        debug!(
            interval_secs = settings.interval_secs,
            active = consent.is_reporting_active(),
            "settings loaded"
        );
        let mut view = self.view();
        // A send whose timestamp failed to persist must still count.
        let cached_last_sent = view.consent.last_sent_at;
        view.settings = settings;
        view.consent = consent;
        if cached_last_sent > view.consent.last_sent_at {
            view.consent.last_sent_at = cached_last_sent;
        }
        Ok(())
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.view().settings.interval_secs.max(1))
    }

    async fn tick(&self, now: DateTime<Local>) -> TickOutcome {
        let _serial = self.tick_lock.lock().await;

        if self.reload_requested.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.reload() {
                warn!(error = %e, "settings reload failed, keeping previous settings");
                self.request_reload();
            }
        }

        let (active, consent_map, last_sent) = {
            let view = self.view();
            (
                view.consent.is_reporting_active(),
                view.consent.categories.clone(),
                view.consent.last_sent_at,
            )
        };

        if !active {
            info!("telemetry not enabled, nothing to send");
            return TickOutcome::Inactive;
        }
        if !is_due(last_sent, &now) {
            debug!("telemetry already sent today");
            return TickOutcome::NotDue;
        }

        let registry = self.registry.clone();
        let snapshot =
            match tokio::task::spawn_blocking(move || registry.collect_enabled(&consent_map)).await
            {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!(error = %e, "telemetry collection aborted");
                    return TickOutcome::Transient;
                }
            };

        match self.delivery.send(&self.identity, &snapshot).await {
            Ok(()) => {
                let sent_at = now.with_timezone(&Utc);
                if let Err(e) = self.store.write_last_sent(sent_at) {
                    warn!(error = %e, "failed to persist last-sent timestamp");
                }
                self.view().consent.last_sent_at = Some(sent_at);
                info!(keys = snapshot.len(), "telemetry report sent");
                TickOutcome::Sent
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "telemetry delivery failed permanently");
                TickOutcome::Fatal
            }
            Err(e) => {
                warn!(error = %e, "telemetry delivery failed, will retry");
                TickOutcome::Transient
            }
        }
    }
}

async fn run_worker(shared: Arc<Shared>, cancel: CancellationToken) {
    info!("reporting worker running");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        if shared.tick(Local::now()).await == TickOutcome::Fatal {
            error!("reporting daemon stopped after fatal delivery error");
            break;
        }

        let interval = shared.interval();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    info!("reporting worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collector::tests::{consent, sample_registry};
    use crate::domain::collector::Facts;
    use crate::domain::consent::ConsentUpdate;
    use crate::domain::settings_store::MemorySettingsStore;
    use crate::error::DeliveryError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Copy)]
    enum Reply {
        Ok,
        Transient,
        Fatal,
    }

    struct CountingDelivery {
        calls: AtomicUsize,
        reply: Mutex<Reply>,
        last: Mutex<Option<Facts>>,
    }

    impl CountingDelivery {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: Mutex::new(reply),
                last: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_reply(&self, reply: Reply) {
            *self.reply.lock().unwrap() = reply;
        }
    }

    #[async_trait]
    impl Delivery for CountingDelivery {
        async fn send(
            &self,
            _identity: &InstallationIdentity,
            snapshot: &Facts,
        ) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(snapshot.clone());
            match *self.reply.lock().unwrap() {
                Reply::Ok => Ok(()),
                Reply::Transient => Err(DeliveryError::Transient("timeout".into())),
                Reply::Fatal => Err(DeliveryError::Fatal("bad endpoint".into())),
            }
        }
    }

    fn active_consent() -> ConsentRecord {
        let mut record = ConsentRecord::default();
        record
            .apply(
                ConsentUpdate {
                    active: Some(true),
                    categories: Some(consent(&[("APP", true), ("OS", false), ("TIME", true)])),
                },
                Utc::now(),
            )
            .unwrap();
        record
    }

    fn daemon_with(
        consent: ConsentRecord,
        delivery: Arc<CountingDelivery>,
    ) -> (ReportingDaemon, Arc<MemorySettingsStore>) {
        let store = Arc::new(MemorySettingsStore::new(Settings::default(), consent));
        let daemon = ReportingDaemon::new(DaemonParts {
            registry: Arc::new(sample_registry()),
            store: store.clone(),
            delivery,
            identity: InstallationIdentity::generate(),
            geoip: Arc::new(GeoIpRegistry::from_config(&Default::default())),
        })
        .unwrap();
        (daemon, store)
    }

    async fn wait_for_state(daemon: &ReportingDaemon, state: DaemonState) {
        for _ in 0..200 {
            if daemon.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("daemon never reached {:?}", state);
    }

    #[test]
    fn due_rules() {
        let now = Local::now();
        assert!(is_due(None, &now));
        assert!(!is_due(Some(now.with_timezone(&Utc)), &now));
        let yesterday = now - chrono::Duration::days(1);
        assert!(is_due(Some(yesterday.with_timezone(&Utc)), &now));
    }

    #[test]
    fn construction_outside_runtime_fails() {
        let store = Arc::new(MemorySettingsStore::default());
        let result = ReportingDaemon::new(DaemonParts {
            registry: Arc::new(sample_registry()),
            store,
            delivery: CountingDelivery::new(Reply::Ok),
            identity: InstallationIdentity::generate(),
            geoip: Arc::new(GeoIpRegistry::default()),
        });
        assert!(matches!(result, Err(ConfigurationError::NoRuntime)));
    }

    #[tokio::test]
    async fn sends_once_per_day() {
        let delivery = CountingDelivery::new(Reply::Ok);
        let (daemon, store) = daemon_with(active_consent(), delivery.clone());

        let now = Local::now();
        assert_eq!(daemon.shared.tick(now).await, TickOutcome::Sent);
        assert_eq!(delivery.calls(), 1);
        assert_eq!(
            store.read_consent().unwrap().last_sent_at,
            Some(now.with_timezone(&Utc))
        );

        assert_eq!(daemon.shared.tick(Local::now()).await, TickOutcome::NotDue);
        assert_eq!(delivery.calls(), 1);
    }

    #[tokio::test]
    async fn snapshot_respects_consent() {
        let delivery = CountingDelivery::new(Reply::Ok);
        let (daemon, _store) = daemon_with(active_consent(), delivery.clone());

        daemon.shared.tick(Local::now()).await;
        let sent = delivery.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.get("app_version").map(String::as_str), Some("5.0"));
        assert_eq!(
            sent.get("time_last_used").map(String::as_str),
            Some("2024-01-01T00:00:00")
        );
        assert!(!sent.contains_key("os_family"));
    }

    #[tokio::test]
    async fn sent_yesterday_is_due_again() {
        let mut record = active_consent();
        let yesterday = Local::now() - chrono::Duration::days(1);
        record.last_sent_at = Some(yesterday.with_timezone(&Utc));

        let delivery = CountingDelivery::new(Reply::Ok);
        let (daemon, _store) = daemon_with(record, delivery.clone());
        assert_eq!(daemon.shared.tick(Local::now()).await, TickOutcome::Sent);
        assert_eq!(delivery.calls(), 1);
    }

    #[tokio::test]
    async fn inactive_consent_never_sends() {
        let delivery = CountingDelivery::new(Reply::Ok);
        let (daemon, _store) = daemon_with(ConsentRecord::default(), delivery.clone());
        assert_eq!(daemon.shared.tick(Local::now()).await, TickOutcome::Inactive);

        let mut disabled = active_consent();
        disabled
            .apply(
                ConsentUpdate {
                    active: Some(false),
                    categories: None,
                },
                Utc::now(),
            )
            .unwrap();
        let (daemon, _store) = daemon_with(disabled, delivery.clone());
        assert_eq!(daemon.shared.tick(Local::now()).await, TickOutcome::Inactive);
        assert_eq!(delivery.calls(), 0);
    }

    #[tokio::test]
    async fn transient_failure_retries_next_tick() {
        let delivery = CountingDelivery::new(Reply::Transient);
        let (daemon, store) = daemon_with(active_consent(), delivery.clone());

        assert_eq!(daemon.shared.tick(Local::now()).await, TickOutcome::Transient);
        assert_eq!(store.read_consent().unwrap().last_sent_at, None);

        delivery.set_reply(Reply::Ok);
        assert_eq!(daemon.shared.tick(Local::now()).await, TickOutcome::Sent);
        assert_eq!(delivery.calls(), 2);
    }

    #[tokio::test]
    async fn consent_changes_apply_only_after_reload() {
        let delivery = CountingDelivery::new(Reply::Ok);
        let (daemon, store) = daemon_with(ConsentRecord::default(), delivery.clone());

        store
            .update_consent(
                ConsentUpdate {
                    active: Some(true),
                    categories: Some(consent(&[("APP", true)])),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(daemon.shared.tick(Local::now()).await, TickOutcome::Inactive);

        daemon.shared.request_reload();
        assert_eq!(daemon.shared.tick(Local::now()).await, TickOutcome::Sent);
        assert!(daemon.status().reporting_active);
    }

    #[tokio::test]
    async fn fatal_failure_stops_the_worker() {
        let delivery = CountingDelivery::new(Reply::Fatal);
        let (daemon, _store) = daemon_with(active_consent(), delivery.clone());

        daemon.start();
        wait_for_state(&daemon, DaemonState::Stopped).await;
        assert_eq!(delivery.calls(), 1);

        delivery.set_reply(Reply::Ok);
        daemon.restart();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(delivery.calls(), 2);
        assert_eq!(daemon.state(), DaemonState::Running);
        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn lifecycle_is_idempotent() {
        let delivery = CountingDelivery::new(Reply::Ok);
        let (daemon, _store) = daemon_with(active_consent(), delivery.clone());

        daemon.stop();
        assert_eq!(daemon.state(), DaemonState::Stopped);

        daemon.start();
        daemon.start();
        assert_eq!(daemon.state(), DaemonState::Running);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(delivery.calls(), 1);

        daemon.shutdown().await;
        assert_eq!(daemon.state(), DaemonState::Stopped);
        daemon.stop();
        assert_eq!(daemon.state(), DaemonState::Stopped);
    }

    #[tokio::test]
    async fn reload_starts_a_stopped_daemon() {
        let delivery = CountingDelivery::new(Reply::Ok);
        let (daemon, _store) = daemon_with(ConsentRecord::default(), delivery);

        assert_eq!(daemon.state(), DaemonState::Stopped);
        daemon.reload_settings();
        assert_eq!(daemon.state(), DaemonState::Running);
        daemon.shutdown().await;
    }

    /// Store whose last-sent bookkeeping cannot be persisted.
    struct ReadOnlyLastSent(MemorySettingsStore);

    impl SettingsStore for ReadOnlyLastSent {
        fn read_settings(&self) -> Result<Settings, crate::error::StoreError> {
            self.0.read_settings()
        }

        fn read_consent(&self) -> Result<ConsentRecord, crate::error::StoreError> {
            self.0.read_consent()
        }

        fn write_last_sent(&self, _at: DateTime<Utc>) -> Result<(), crate::error::StoreError> {
            Err(crate::error::StoreError::Io {
                path: "settings.yaml".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }

        fn update_consent(
            &self,
            update: ConsentUpdate,
            now: DateTime<Utc>,
        ) -> Result<ConsentRecord, crate::error::StoreError> {
            self.0.update_consent(update, now)
        }

        fn update_settings(
            &self,
            update: crate::domain::settings_store::SettingsUpdate,
        ) -> Result<Settings, crate::error::StoreError> {
            self.0.update_settings(update)
        }
    }

    #[tokio::test]
    async fn unpersisted_send_survives_reload() {
        let delivery = CountingDelivery::new(Reply::Ok);
        let store = Arc::new(ReadOnlyLastSent(MemorySettingsStore::new(
            Settings::default(),
            active_consent(),
        )));
        let daemon = ReportingDaemon::new(DaemonParts {
            registry: Arc::new(sample_registry()),
            store: store.clone(),
            delivery: delivery.clone(),
            identity: InstallationIdentity::generate(),
            geoip: Arc::new(GeoIpRegistry::default()),
        })
        .unwrap();

        let now = Local::now();
        assert_eq!(daemon.shared.tick(now).await, TickOutcome::Sent);
        assert_eq!(store.read_consent().unwrap().last_sent_at, None);

        daemon.shared.request_reload();
        assert_eq!(daemon.shared.tick(now).await, TickOutcome::NotDue);
        assert_eq!(delivery.calls(), 1);
        assert!(daemon.status().last_sent_at.is_some());
    }

    #[tokio::test]
    async fn crashing_collector_does_not_block_delivery() {
        use crate::domain::collector::tests::FixedCollector;

        let registry = CollectorRegistry::builder()
            .register(
                20,
                FixedCollector::new("APP", &["app_version"], vec![("app_version", "5.0")]),
            )
            .register(40, FixedCollector::panicking("HW", &["hw_cpu_model"]))
            .build()
            .unwrap();
        let mut record = ConsentRecord::default();
        record
            .apply(
                ConsentUpdate {
                    active: Some(true),
                    categories: Some(consent(&[("APP", true), ("HW", true)])),
                },
                Utc::now(),
            )
            .unwrap();

        let delivery = CountingDelivery::new(Reply::Ok);
        let daemon = ReportingDaemon::new(DaemonParts {
            registry: Arc::new(registry),
            store: Arc::new(MemorySettingsStore::new(Settings::default(), record)),
            delivery: delivery.clone(),
            identity: InstallationIdentity::generate(),
            geoip: Arc::new(GeoIpRegistry::default()),
        })
        .unwrap();

        assert_eq!(daemon.shared.tick(Local::now()).await, TickOutcome::Sent);
        let sent = delivery.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.get("app_version").map(String::as_str), Some("5.0"));
        assert!(!sent.contains_key("hw_cpu_model"));
    }

    #[tokio::test]
    async fn start_rereads_the_store() {
        let delivery = CountingDelivery::new(Reply::Ok);
        let (daemon, store) = daemon_with(ConsentRecord::default(), delivery.clone());

        store
            .update_consent(
                ConsentUpdate {
                    active: Some(true),
                    categories: Some(consent(&[("APP", true)])),
                },
                Utc::now(),
            )
            .unwrap();

        daemon.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(delivery.calls(), 1);
        assert!(daemon.status().reporting_active);
        daemon.shutdown().await;
    }

    #[tokio::test]
    async fn exposes_geoip_selection_and_categories() {
        let delivery = CountingDelivery::new(Reply::Ok);
        let (daemon, _store) = daemon_with(active_consent(), delivery);

        assert_eq!(daemon.selected_geoip_provider(), "ipapi.co");
        assert!(daemon.available_geoip_providers().contains_key("ipwho.is"));

        let categories = daemon.categories();
        let codes: Vec<&str> = categories.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["TIME", "APP", "OS"]);
        assert!(categories.iter().find(|c| c.code == "APP").unwrap().enabled);
        assert!(!categories.iter().find(|c| c.code == "OS").unwrap().enabled);
    }
}
