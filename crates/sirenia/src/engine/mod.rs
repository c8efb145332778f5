//! Boundary to the real rendering engine.
//!
//! The engine is consumed through exactly two calls, [`Engine::initialize`] (global
//! configuration) and [`Engine::render`], both reachable only after [`EngineLoader::load`]
//! succeeded.
//!
//! [`LocalEngine`] and [`LocalEngineLoader`] are the same boundary without the `Send`/`Sync`
//! bounds, for engines tied to one thread (a JS runtime, a wasm instance). The embedded
//! backend accepts them; every [`Engine`] is also a [`LocalEngine`].

#[cfg(feature = "mmdc")]
pub mod mmdc;

use futures::future::{BoxFuture, LocalBoxFuture};
use sirenia_core::{EngineConfig, RenderError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("failed to load rendering engine: {0}")]
    Load(String),
    #[error("failed to initialize rendering engine: {0}")]
    Initialize(String),
    /// The engine rejected the diagram syntax.
    #[error("{0}")]
    Syntax(String),
    /// The engine accepted the syntax but could not lay out or serialize it.
    #[error("{0}")]
    Render(String),
}

impl EngineError {
    /// Maps a failure of a render call onto the service taxonomy.
    pub(crate) fn into_render_error(self, source: &str) -> RenderError {
        match self {
            Self::Syntax(message) => RenderError::parse(message).with_diagram(source),
            Self::Render(message) => RenderError::render(message).with_diagram(source),
            infra @ (Self::Load(_) | Self::Initialize(_)) => {
                RenderError::unknown(infra.to_string()).with_diagram(source)
            }
        }
    }
}

pub trait Engine: Send + Sync + 'static {
    /// Replaces the engine's global configuration.
    fn initialize(&self, config: &EngineConfig) -> Result<(), EngineError>;

    /// Renders `source` to SVG markup whose root element carries `id`.
    fn render<'a>(
        &'a self,
        id: &'a str,
        source: &'a str,
    ) -> BoxFuture<'a, Result<String, EngineError>>;
}

/// Produces an engine. Loading is the slow step the lazy backends run at most once per
/// successful attempt.
pub trait EngineLoader: Send + Sync + 'static {
    type Engine: Engine;

    fn load(&self) -> BoxFuture<'static, Result<Self::Engine, EngineError>>;
}

/// [`Engine`] for single-threaded hosts.
pub trait LocalEngine: 'static {
    fn initialize(&self, config: &EngineConfig) -> Result<(), EngineError>;

    fn render<'a>(
        &'a self,
        id: &'a str,
        source: &'a str,
    ) -> LocalBoxFuture<'a, Result<String, EngineError>>;
}

/// [`EngineLoader`] for single-threaded hosts.
pub trait LocalEngineLoader: 'static {
    type Engine: LocalEngine;

    fn load(&self) -> LocalBoxFuture<'static, Result<Self::Engine, EngineError>>;
}

impl<E: Engine> LocalEngine for E {
    fn initialize(&self, config: &EngineConfig) -> Result<(), EngineError> {
        Engine::initialize(self, config)
    }

    fn render<'a>(
        &'a self,
        id: &'a str,
        source: &'a str,
    ) -> LocalBoxFuture<'a, Result<String, EngineError>> {
        Engine::render(self, id, source)
    }
}

impl<L: EngineLoader> LocalEngineLoader for L {
    type Engine = L::Engine;

    fn load(&self) -> LocalBoxFuture<'static, Result<Self::Engine, EngineError>> {
        EngineLoader::load(self)
    }
}
