use super::RenderJob;
use crate::compose::Requirement;
use crate::engine::{Engine, EngineError, EngineLoader};
use crate::service::{RenderService, RenderedArtifact, prepare_render};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use sirenia_core::{DiagramType, EngineConfig, RenderConfig, RenderError, Result, ThemeRegistry};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type LoadAttempt<E> = Shared<BoxFuture<'static, std::result::Result<Arc<E>, EngineError>>>;

enum InitState<E> {
    Uninitialized,
    Initializing {
        attempt: LoadAttempt<E>,
        waiters: usize,
    },
    Ready(Arc<E>),
}

/// A caller attached to an in-flight load attempt. Dropping it (after the attempt finished,
/// or when the caller is cancelled) detaches the caller.
struct Waiter<'a, L: EngineLoader> {
    renderer: &'a ServerRenderer<L>,
    attempt: LoadAttempt<L::Engine>,
}

impl<L: EngineLoader> Drop for Waiter<'_, L> {
    fn drop(&mut self) {
        self.renderer.detach(&self.attempt);
    }
}

/// Engine-backed renderer for multi-threaded executors.
pub struct ServerRenderer<L: EngineLoader> {
    loader: L,
    registry: Requirement<ThemeRegistry>,
    site_config: EngineConfig,
    state: Mutex<InitState<L::Engine>>,
    applied: futures::lock::Mutex<Option<EngineConfig>>,
    load_attempts: AtomicUsize,
}

impl<L: EngineLoader> ServerRenderer<L> {
    pub fn new(registry: Arc<ThemeRegistry>, loader: L) -> Self {
        Self::with_requirement(Requirement::resolved(registry), loader)
    }

    pub(crate) fn with_requirement(registry: Requirement<ThemeRegistry>, loader: L) -> Self {
        Self {
            loader,
            registry,
            site_config: EngineConfig::default(),
            state: Mutex::new(InitState::Uninitialized),
            applied: futures::lock::Mutex::new(Some(EngineConfig::default())),
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// Merges `site_config` onto the engine defaults used at initialization and for renders
    /// without overrides.
    pub fn with_site_config(mut self, site_config: EngineConfig) -> Self {
        self.site_config.deep_merge(site_config.as_value());
        // A fresh engine is initialized with the site config at load.
        *self.applied.get_mut() = Some(self.site_config.clone());
        self
    }

    pub fn site_config(&self) -> &EngineConfig {
        &self.site_config
    }

    /// Number of engine loads started so far.
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), InitState::Ready(_))
    }

    fn start_load(&self) -> LoadAttempt<L::Engine> {
        let attempt = self.load_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let load = self.loader.load();
        let site_config = self.site_config.clone();
        async move {
            tracing::debug!(attempt, "loading rendering engine");
            let loaded = match load.await {
                Ok(engine) => engine.initialize(&site_config).map(|()| Arc::new(engine)),
                Err(err) => Err(err),
            };
            match &loaded {
                Ok(_) => tracing::info!(attempt, "rendering engine ready"),
                Err(err) => {
                    tracing::error!(attempt, error = %err, "rendering engine failed to load");
                }
            }
            loaded
        }
        .boxed()
        .shared()
    }

    /// Returns the loaded engine, loading it first if needed.
    async fn ensure_ready(&self) -> Result<Arc<L::Engine>> {
        let attempt = {
            let mut state = self.state.lock();
            match &mut *state {
                InitState::Ready(engine) => return Ok(Arc::clone(engine)),
                InitState::Initializing { attempt, waiters } => {
                    *waiters += 1;
                    attempt.clone()
                }
                InitState::Uninitialized => {
                    let attempt = self.start_load();
                    *state = InitState::Initializing {
                        attempt: attempt.clone(),
                        waiters: 1,
                    };
                    attempt
                }
            }
        };

        let waiter = Waiter {
            renderer: self,
            attempt,
        };
        let outcome = waiter.attempt.clone().await;
        drop(waiter);

        outcome.map_err(|err| RenderError::unknown(err.to_string()))
    }

    /// Settles the guard once `attempt` has an outcome: a loaded engine right away, a failure
    /// only after the last attached caller has seen it.
    fn detach(&self, attempt: &LoadAttempt<L::Engine>) {
        let mut state = self.state.lock();
        let remaining = match &mut *state {
            InitState::Initializing {
                attempt: current,
                waiters,
            } if current.ptr_eq(attempt) => {
                *waiters -= 1;
                *waiters
            }
            _ => return,
        };
        let next = match attempt.peek() {
            Some(Ok(engine)) => InitState::Ready(Arc::clone(engine)),
            Some(Err(_)) if remaining == 0 => InitState::Uninitialized,
            _ => return,
        };
        *state = next;
    }

    pub async fn render(
        &self,
        source: &str,
        config: Option<&RenderConfig>,
    ) -> Result<RenderedArtifact> {
        let prepared = prepare_render(&self.registry, source, config)?;
        let engine = self
            .ensure_ready()
            .await
            .map_err(|err| err.with_diagram(source))?;

        let job = RenderJob::new(&self.site_config, &prepared, config);
        let _engine_lock = job
            .acquire(&self.applied, |effective| engine.initialize(effective), source)
            .await?;
        let rendered = engine.render(&job.render_id, source).await;
        job.finish(rendered, prepared, source)
    }

    /// Classifies `source`, warming the engine on the way.
    ///
    /// Classification does not depend on the engine, so a failed load is logged rather than
    /// returned; the next render reports it.
    pub async fn detect_type(&self, source: &str) -> Result<DiagramType> {
        let diagram_type = sirenia_core::detect_type(source)?;
        if let Err(err) = self.ensure_ready().await {
            tracing::warn!(error = %err, "engine warm-up failed during type detection");
        }
        Ok(diagram_type)
    }
}

impl<L: EngineLoader> RenderService for ServerRenderer<L> {
    async fn render(
        &self,
        source: &str,
        config: Option<&RenderConfig>,
    ) -> Result<RenderedArtifact> {
        ServerRenderer::render(self, source, config).await
    }

    async fn detect_type(&self, source: &str) -> Result<DiagramType> {
        ServerRenderer::detect_type(self, source).await
    }
}
