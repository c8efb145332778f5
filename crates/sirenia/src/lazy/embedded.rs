use super::RenderJob;
use crate::compose::Requirement;
use crate::engine::{EngineError, LocalEngine, LocalEngineLoader};
use crate::service::{RenderService, RenderedArtifact, prepare_render};
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use sirenia_core::{DiagramType, EngineConfig, RenderConfig, RenderError, Result, ThemeRegistry};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

type LoadAttempt<E> = Shared<LocalBoxFuture<'static, std::result::Result<Rc<E>, EngineError>>>;

enum InitState<E> {
    Uninitialized,
    Initializing {
        attempt: LoadAttempt<E>,
        waiters: usize,
    },
    Ready(Rc<E>),
}

struct Waiter<'a, L: LocalEngineLoader> {
    renderer: &'a EmbeddedRenderer<L>,
    attempt: LoadAttempt<L::Engine>,
}

impl<L: LocalEngineLoader> Drop for Waiter<'_, L> {
    fn drop(&mut self) {
        self.renderer.detach(&self.attempt);
    }
}

/// Engine-backed renderer for single-threaded, in-process hosts (a UI thread, a
/// `LocalSet`, wasm).
///
/// Same contract as [`super::ServerRenderer`]; the guard lives in a `RefCell` and the engine
/// behind an `Rc`, so the renderer is `!Send` and must stay on the thread that created it.
/// The engine itself may be `!Send` as well: any [`LocalEngineLoader`] works, and every
/// [`crate::EngineLoader`] is one.
pub struct EmbeddedRenderer<L: LocalEngineLoader> {
    loader: L,
    registry: Requirement<ThemeRegistry>,
    site_config: EngineConfig,
    state: RefCell<InitState<L::Engine>>,
    applied: futures::lock::Mutex<Option<EngineConfig>>,
    load_attempts: Cell<usize>,
}

impl<L: LocalEngineLoader> EmbeddedRenderer<L> {
    pub fn new(registry: Arc<ThemeRegistry>, loader: L) -> Self {
        Self::with_requirement(Requirement::resolved(registry), loader)
    }

    pub(crate) fn with_requirement(registry: Requirement<ThemeRegistry>, loader: L) -> Self {
        Self {
            loader,
            registry,
            site_config: EngineConfig::default(),
            state: RefCell::new(InitState::Uninitialized),
            applied: futures::lock::Mutex::new(Some(EngineConfig::default())),
            load_attempts: Cell::new(0),
        }
    }

    pub fn with_site_config(mut self, site_config: EngineConfig) -> Self {
        self.site_config.deep_merge(site_config.as_value());
        *self.applied.get_mut() = Some(self.site_config.clone());
        self
    }

    pub fn site_config(&self) -> &EngineConfig {
        &self.site_config
    }

    pub fn load_attempts(&self) -> usize {
        self.load_attempts.get()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), InitState::Ready(_))
    }

    fn start_load(&self) -> LoadAttempt<L::Engine> {
        let attempt = self.load_attempts.get() + 1;
        self.load_attempts.set(attempt);
        let load = self.loader.load();
        let site_config = self.site_config.clone();
        async move {
            tracing::debug!(attempt, "loading embedded rendering engine");
            let engine = match load.await {
                Ok(engine) => engine,
                Err(err) => {
                    tracing::error!(attempt, error = %err, "embedded engine failed to load");
                    return Err(err);
                }
            };
            if let Err(err) = engine.initialize(&site_config) {
                tracing::error!(attempt, error = %err, "embedded engine failed to initialize");
                return Err(err);
            }
            tracing::info!(attempt, "embedded rendering engine ready");
            Ok(Rc::new(engine))
        }
        .boxed_local()
        .shared()
    }

    async fn ensure_ready(&self) -> Result<Rc<L::Engine>> {
        let attempt = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                InitState::Ready(engine) => return Ok(Rc::clone(engine)),
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

    fn detach(&self, attempt: &LoadAttempt<L::Engine>) {
        let mut state = self.state.borrow_mut();
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
            Some(Ok(engine)) => InitState::Ready(Rc::clone(engine)),
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

    pub async fn detect_type(&self, source: &str) -> Result<DiagramType> {
        let diagram_type = sirenia_core::detect_type(source)?;
        if let Err(err) = self.ensure_ready().await {
            tracing::warn!(error = %err, "engine warm-up failed during type detection");
        }
        Ok(diagram_type)
    }
}

impl<L: LocalEngineLoader> RenderService for EmbeddedRenderer<L> {
    async fn render(
        &self,
        source: &str,
        config: Option<&RenderConfig>,
    ) -> Result<RenderedArtifact> {
        EmbeddedRenderer::render(self, source, config).await
    }

    async fn detect_type(&self, source: &str) -> Result<DiagramType> {
        EmbeddedRenderer::detect_type(self, source).await
    }
}
