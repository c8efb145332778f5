use crate::*;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::Poll;

pub(crate) const FLOWCHART: &str = "graph TD\n A-->B";

/// Yields to the executor once, so concurrent callers get polled in between.
pub(crate) async fn yield_now() {
    let mut yielded = false;
    futures::future::poll_fn(move |cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await
}

/// What the fake engine saw.
#[derive(Debug, Default)]
pub(crate) struct EngineLog {
    pub loads: AtomicUsize,
    pub renders: AtomicUsize,
    pub initializations: Mutex<Vec<EngineConfig>>,
}

impl EngineLog {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn initializations(&self) -> Vec<EngineConfig> {
        self.initializations.lock().clone()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeLoader {
    pub log: Arc<EngineLog>,
    failing_loads: usize,
    reject_initialize: bool,
    output: Option<String>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` loads fail.
    pub fn failing_first(mut self, n: usize) -> Self {
        self.failing_loads = n;
        self
    }

    pub fn rejecting_initialize(mut self) -> Self {
        self.reject_initialize = true;
        self
    }

    /// Every render returns `output` verbatim.
    pub fn with_output(mut self, output: &str) -> Self {
        self.output = Some(output.to_string());
        self
    }
}

impl EngineLoader for FakeLoader {
    type Engine = FakeEngine;

    fn load(&self) -> BoxFuture<'static, std::result::Result<FakeEngine, EngineError>> {
        let loader = self.clone();
        async move {
            let attempt = loader.log.loads.fetch_add(1, Ordering::SeqCst) + 1;
            yield_now().await;
            yield_now().await;
            if attempt <= loader.failing_loads {
                return Err(EngineError::Load(format!("bundle unavailable (attempt {attempt})")));
            }
            Ok(FakeEngine {
                log: loader.log,
                reject_initialize: loader.reject_initialize,
                output: loader.output,
                config: Mutex::new(EngineConfig::empty_object()),
            })
        }
        .boxed()
    }
}

#[derive(Debug)]
pub(crate) struct FakeEngine {
    log: Arc<EngineLog>,
    reject_initialize: bool,
    output: Option<String>,
    config: Mutex<EngineConfig>,
}

impl Engine for FakeEngine {
    fn initialize(&self, config: &EngineConfig) -> std::result::Result<(), EngineError> {
        if self.reject_initialize {
            return Err(EngineError::Initialize("configuration rejected".to_string()));
        }
        self.log.initializations.lock().push(config.clone());
        *self.config.lock() = config.clone();
        Ok(())
    }

    /// Emits the theme and primary color that are applied when the render finishes, which
    /// exposes any interleaving of configuration changes.
    fn render<'a>(
        &'a self,
        id: &'a str,
        source: &'a str,
    ) -> BoxFuture<'a, std::result::Result<String, EngineError>> {
        async move {
            yield_now().await;
            self.log.renders.fetch_add(1, Ordering::SeqCst);
            if source.contains("-->>>") {
                return Err(EngineError::Syntax("Parse error on line 2".to_string()));
            }
            if source.contains("%% explode") {
                return Err(EngineError::Render("layout failed".to_string()));
            }
            if let Some(output) = &self.output {
                return Ok(output.clone());
            }
            let config = self.config.lock().clone();
            let theme = config.get_str("theme").unwrap_or("");
            let primary = config.get_str("themeVariables.primaryColor").unwrap_or("");
            Ok(format!(
                r#"<svg id="{id}" data-engine-theme="{theme}" data-primary="{primary}"></svg>"#
            ))
        }
        .boxed()
    }
}

pub(crate) fn shared_registry() -> Arc<ThemeRegistry> {
    Arc::new(ThemeRegistry::new())
}

#[derive(Debug, Clone, Default)]
pub(crate) struct WarnCounter(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Runs `f` with a thread-local subscriber and returns its output with the number of
/// warning-level events it emitted.
pub(crate) fn count_warnings<T>(f: impl FnOnce() -> T) -> (T, usize) {
    use tracing_subscriber::layer::SubscriberExt;

    let counter = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, counter.0.load(Ordering::SeqCst))
}
