pub mod config;
pub mod metadata;

pub use config::{AgentConfig, ConsoleOptions, NetworkOptions};
pub use metadata::MetadataStore;

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::console::ConsoleLayer;
use crate::capture::network::NetworkWatch;
use crate::capture::panic_hook::{PanicHookSurface, PatchSurface};
use crate::context::{BasicSerializer, ContextProvider, Serializer};
use crate::engine::error::{normalize, CanonicalError, ErrorLike};
use crate::engine::gate::{Admission, Gate};
use crate::engine::log::{EntryKey, TelemetryLog};
use crate::engine::report::{assemble, EntryKind, LogSnapshots, ReportPayload, SessionInfo};
use crate::engine::telemetry::{
    Category, ConsoleEntry, NavigationEntry, Severity, Telemetry, VisitorAction, VisitorEntry,
};
use crate::host::{Host, TokioHost};
use crate::transport::{Endpoints, HttpTransport, Pipeline, Transport};
use crate::wrap::{run_guarded, BindContext, Callback, CallbackTable, FailureSink, GuardedSection, Wrapper};

/// Post-dedup, pre-send veto. Returning false suppresses transmission of
/// this specific payload.
pub type ErrorHook = Arc<dyn Fn(&ReportPayload, &CanonicalError) -> bool + Send + Sync>;

/// The engine singleton: one instance coordinates all interception for
/// the process. All mutable state (log, gate, channels, guard flag) lives
/// behind this interface; the only ambient surface it touches is the
/// process panic hook, through a capability-checked adapter.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

pub(crate) struct AgentInner {
    self_ref: Weak<AgentInner>,
    pub(crate) host: Arc<dyn Host>,
    serializer: Arc<dyn Serializer>,
    pipeline: Pipeline,
    wrapper: Wrapper,
    gate: Gate,
    pub(crate) log: Mutex<TelemetryLog>,
    metadata: MetadataStore,
    providers: Mutex<Vec<Arc<dyn ContextProvider>>>,
    pub(crate) config: RwLock<AgentConfig>,
    session: RwLock<SessionInfo>,
    on_error: RwLock<Option<ErrorHook>>,
    installed: AtomicBool,
    /// "Currently reporting" guard: a failure observed while a report is
    /// being assembled is a duplicate of it. Cleared via deferral, so the
    /// next turn's failures are evaluated fresh.
    reporting: AtomicBool,
}

impl Agent {
    /// Build an agent against explicit collaborators. Nothing is patched
    /// and nothing transmits until `install`.
    pub fn new(
        host: Arc<dyn Host>,
        transport: Arc<dyn Transport>,
        serializer: Arc<dyn Serializer>,
    ) -> Self {
        let inner = Arc::new_cyclic(|self_ref| AgentInner {
            self_ref: self_ref.clone(),
            wrapper: Wrapper::new(Arc::clone(&host)),
            pipeline: Pipeline::new(transport),
            gate: Gate::new(),
            log: Mutex::new(TelemetryLog::default()),
            metadata: MetadataStore::new(),
            providers: Mutex::new(Vec::new()),
            config: RwLock::new(AgentConfig::default()),
            session: RwLock::new(SessionInfo {
                token: String::new(),
                application: String::new(),
                session_id: Uuid::new_v4(),
                agent_version: env!("CARGO_PKG_VERSION").to_string(),
                started_ms: 0,
            }),
            on_error: RwLock::new(None),
            installed: AtomicBool::new(false),
            reporting: AtomicBool::new(false),
            serializer,
            host,
        });
        Self { inner }
    }

    /// Production wiring: system host, reqwest transport, default
    /// serialization.
    pub fn production() -> Self {
        Self::new(
            Arc::new(TokioHost::new()),
            Arc::new(HttpTransport::new()),
            Arc::new(BasicSerializer),
        )
    }

    /// Apply configuration and patch the ambient surfaces. Idempotent:
    /// the second call is a no-op returning false.
    pub fn install(&self, config: AgentConfig) -> bool {
        if self.inner.installed.swap(true, Ordering::SeqCst) {
            warn!(target: "vigil::agent", "already installed, ignoring");
            return false;
        }
        let config = config::sanitize(config);
        if config.token.is_empty() {
            // Degraded mode: the engine runs, nothing transmits.
            warn!(target: "vigil::agent", "no token configured, report channel disabled");
            self.inner.pipeline.report_channel().disable();
        }
        self.inner.wrapper.set_capture_bind_stack(config.capture_bind_stack);
        if let Ok(mut log) = self.inner.log.lock() {
            log.set_capacity(config.log_capacity);
        }
        if let Ok(mut session) = self.inner.session.write() {
            session.token = config.token.clone();
            session.application = config.application.clone();
            session.started_ms = self.inner.host.now_ms();
        }
        match self.inner.config.write() {
            Ok(mut slot) => *slot = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }

        // Capability-checked surfaces: skip anything absent or already
        // instrumented by another agent.
        let surfaces: [&dyn PatchSurface; 1] = [&PanicHookSurface];
        for surface in surfaces {
            if surface.can_patch() {
                surface.patch(self);
                info!(target: "vigil::agent", surface = surface.name(), "surface patched");
            } else {
                debug!(target: "vigil::agent", surface = surface.name(), "surface skipped");
            }
        }
        true
    }

    pub fn is_installed(&self) -> bool {
        self.inner.installed.load(Ordering::SeqCst)
    }

    /// Manual report entry point: bypasses interception but goes through
    /// the same normalize → admit → assemble → send pipeline.
    pub fn track(&self, raw: impl Into<ErrorLike>) {
        AgentInner::report(&self.inner, raw.into(), EntryKind::Direct, None, false);
    }

    /// Wrap a callback for interception. See [`Wrapper::wrap`].
    pub fn watch(&self, cb: Callback, context: &str) -> Callback {
        self.inner.wrapper.wrap(cb, context, self.sink())
    }

    /// Wrap every callback in the table in place, except excluded names.
    pub fn watch_all(&self, table: &mut CallbackTable, excluded: &[&str]) {
        self.inner.wrapper.wrap_all(table, excluded, &self.sink());
    }

    /// Run a closure under the interception guard without registering it:
    /// the result comes back unchanged, a panic is reported with kind
    /// `catch` and then resumed.
    pub fn run_watched<R>(&self, context: &str, f: impl FnOnce() -> R) -> R {
        let bind = BindContext {
            context: context.to_string(),
            bound_at_ms: self.inner.host.now_ms(),
            bind_stack: None,
        };
        run_guarded(f, self.inner.as_ref(), EntryKind::Catch, Some(&bind))
    }

    pub fn add_metadata(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.metadata.add(key, value);
    }

    pub fn remove_metadata(&self, key: &str) {
        self.inner.metadata.remove(key);
    }

    pub fn add_context_provider(&self, provider: Arc<dyn ContextProvider>) {
        if let Ok(mut providers) = self.inner.providers.lock() {
            providers.push(provider);
        }
    }

    pub fn on_error(&self, hook: ErrorHook) {
        match self.inner.on_error.write() {
            Ok(mut slot) => *slot = Some(hook),
            Err(poisoned) => *poisoned.into_inner() = Some(hook),
        }
    }

    /// The failure entry point handed to wrappers and capture adapters.
    pub fn sink(&self) -> Arc<dyn FailureSink> {
        self.inner.clone()
    }

    pub(crate) fn inner(&self) -> &Arc<AgentInner> {
        &self.inner
    }

    /// Tracing layer that feeds console telemetry into this agent.
    pub fn console_layer(&self) -> ConsoleLayer {
        ConsoleLayer::new(Arc::downgrade(&self.inner))
    }

    /// Handle for instrumenting outbound network calls.
    pub fn network(&self) -> NetworkWatch {
        NetworkWatch::new(Arc::clone(&self.inner))
    }

    pub fn navigation(&self, from: &str, to: &str) {
        let now = self.inner.host.now_ms();
        self.inner.append(Telemetry::Navigation(NavigationEntry {
            from: from.to_string(),
            to: to.to_string(),
            timestamp_ms: now,
        }));
    }

    pub fn visitor_action(&self, action: VisitorAction, element: &str) {
        let now = self.inner.host.now_ms();
        self.inner.append(Telemetry::Visitor(VisitorEntry {
            action,
            element: element.to_string(),
            timestamp_ms: now,
        }));
    }

    /// Snapshot accessor for one telemetry category.
    pub fn telemetry(&self, category: Category) -> Vec<Telemetry> {
        match self.inner.log.lock() {
            Ok(log) => log.all(category),
            Err(_) => Vec::new(),
        }
    }
}

impl AgentInner {
    fn read_config(&self) -> AgentConfig {
        match self.config.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn endpoints(config: &AgentConfig) -> Endpoints {
        Endpoints {
            capture: config.capture_endpoint.clone(),
            fault: config.fault_endpoint.clone(),
            forward: config.forward_endpoint.clone(),
        }
    }

    pub(crate) fn append(&self, value: Telemetry) -> Option<EntryKey> {
        let mut log = self.log.lock().ok()?;
        Some(log.add(value))
    }

    /// The aggregation entry point. Everything lands here: wrapped
    /// callables, the panic hook, watched tasks, console errors, manual
    /// tracks. `force` is the single asynchronous retry after a panicking
    /// user hook; it bypasses guard, gate and hook.
    pub(crate) fn report(
        this: &Arc<AgentInner>,
        raw: ErrorLike,
        kind: EntryKind,
        bind: Option<BindContext>,
        force: bool,
    ) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            Self::report_inner(this, raw, kind, bind, force);
        }));
        if outcome.is_err() {
            // Telemetry-capture failure: never propagated, never recursed
            // into the main error path.
            let config = this.read_config();
            this.pipeline.fault(
                &Self::endpoints(&config),
                &CanonicalError::new("ReportFault", "report path panicked"),
                &config.token,
            );
        }
    }

    fn report_inner(
        this: &Arc<AgentInner>,
        raw: ErrorLike,
        kind: EntryKind,
        bind: Option<BindContext>,
        force: bool,
    ) {
        let _section = GuardedSection::enter();
        if !this.installed.load(Ordering::SeqCst) {
            debug!(target: "vigil::agent", "failure observed before install, dropped");
            return;
        }
        if !force && this.reporting.load(Ordering::SeqCst) {
            debug!(target: "vigil::agent", "re-entrant failure during assembly, dropped");
            return;
        }

        let config = this.read_config();
        let error = normalize(raw, this.serializer.as_ref(), this.host.as_ref());
        let now = this.host.now_ms();

        let suppressed = if force {
            0
        } else {
            match this.gate.admit(&error, now, config.dedupe) {
                Admission::Admitted { suppressed } => suppressed,
                Admission::Duplicate | Admission::Throttled => return,
            }
        };

        this.reporting.store(true, Ordering::SeqCst);
        let payload = this.assemble_payload(kind, error.clone(), bind.clone(), suppressed, &config, now);

        let verdict = if force {
            HookVerdict::Proceed
        } else {
            Self::consult_hook(this, &payload, &error, kind, bind)
        };
        match verdict {
            HookVerdict::Proceed => {
                this.pipeline.send(&Self::endpoints(&config), &payload, &config.token);
            }
            HookVerdict::Veto => {
                debug!(target: "vigil::agent", "report vetoed by error hook");
            }
            HookVerdict::Retrying => {}
        }

        // Guard reset happens strictly after this turn: a synchronous
        // re-entrant failure stays classified as a duplicate, the next
        // turn's failure is evaluated fresh.
        let flag = Arc::clone(this);
        this.host.defer(Box::new(move || {
            flag.reporting.store(false, Ordering::SeqCst);
        }));
    }

    fn assemble_payload(
        &self,
        kind: EntryKind,
        error: CanonicalError,
        bind: Option<BindContext>,
        suppressed: u32,
        config: &AgentConfig,
        now: u64,
    ) -> ReportPayload {
        let snapshots = match self.log.lock() {
            Ok(log) => LogSnapshots {
                console: log
                    .all(Category::Console)
                    .into_iter()
                    .filter_map(Telemetry::into_console)
                    .collect(),
                network: log
                    .all(Category::Network)
                    .into_iter()
                    .filter_map(Telemetry::into_network)
                    .collect(),
                navigation: log
                    .all(Category::Navigation)
                    .into_iter()
                    .filter_map(Telemetry::into_navigation)
                    .collect(),
                visitor: log
                    .all(Category::Visitor)
                    .into_iter()
                    .filter_map(Telemetry::into_visitor)
                    .collect(),
            },
            Err(_) => LogSnapshots::default(),
        };

        let mut context = BTreeMap::new();
        if let Ok(providers) = self.providers.lock() {
            for provider in providers.iter() {
                let block = catch_unwind(AssertUnwindSafe(|| {
                    (provider.name().to_string(), provider.report())
                }));
                match block {
                    Ok((name, value)) => {
                        context.insert(name, value);
                    }
                    Err(_) => {
                        warn!(target: "vigil::agent", "context provider panicked, block omitted");
                    }
                }
            }
        }

        let session = match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let payload = assemble(
            kind,
            error,
            bind,
            snapshots,
            context,
            self.metadata.snapshot(),
            suppressed,
            session,
            config.console_budget_bytes,
            now,
        );

        // Scratchpad is spent: the same telemetry is never reported twice.
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
        payload
    }

    fn consult_hook(
        this: &Arc<AgentInner>,
        payload: &ReportPayload,
        error: &CanonicalError,
        kind: EntryKind,
        bind: Option<BindContext>,
    ) -> HookVerdict {
        let hook = match this.on_error.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let Some(hook) = hook else {
            return HookVerdict::Proceed;
        };
        match catch_unwind(AssertUnwindSafe(|| hook(payload, error))) {
            Ok(true) => HookVerdict::Proceed,
            Ok(false) => HookVerdict::Veto,
            Err(_) => {
                // The hook itself is broken; the failure must still be
                // observable. One deferred retry, hook bypassed.
                warn!(target: "vigil::agent", "error hook panicked, retrying without it");
                let retry_target = Arc::clone(this);
                let retry = ErrorLike::Canonical(error.clone());
                this.host.defer(Box::new(move || {
                    AgentInner::report(&retry_target, retry, kind, bind, true);
                }));
                HookVerdict::Retrying
            }
        }
    }

    /// Console line observed. Appends to the log; error severity also
    /// feeds the report path when configured.
    pub(crate) fn console_event(
        this: &Arc<AgentInner>,
        severity: Severity,
        target: &str,
        message: String,
    ) {
        let config = this.read_config();
        if !config.console.enabled {
            return;
        }
        let now = this.host.now_ms();
        this.append(Telemetry::Console(ConsoleEntry {
            severity,
            target: target.to_string(),
            message: message.clone(),
            timestamp_ms: now,
        }));
        if severity == Severity::Error && config.console.report_errors {
            Self::report(
                this,
                ErrorLike::Value(Value::String(message)),
                EntryKind::Console,
                None,
                false,
            );
        }
    }
}

enum HookVerdict {
    Proceed,
    Veto,
    Retrying,
}

impl FailureSink for AgentInner {
    fn failure(&self, raw: ErrorLike, kind: EntryKind, bind: Option<BindContext>) {
        if let Some(this) = self.self_ref.upgrade() {
            AgentInner::report(&this, raw, kind, bind, false);
        }
    }
}
