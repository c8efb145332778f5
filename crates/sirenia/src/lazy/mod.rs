//! Engine-backed renderers that load the engine on first use.
//!
//! Both backends hold the same three-state guard (`Uninitialized`, `Initializing`, `Ready`).
//! Callers that attach while a load attempt is in flight share its outcome. The attempt
//! counts its attached callers; a failed attempt stays visible (so callers arriving in the
//! meantime see the same failure) until the last of them has observed it, and only then does
//! the guard reset so the next call retries. A loaded engine is kept for the backend's
//! lifetime.
//!
//! [`ServerRenderer`] targets multi-threaded executors; [`EmbeddedRenderer`] targets
//! single-threaded, in-process hosts and is `!Send`.
//!
//! Renders on one backend are serialized: the engine configuration is global, so "apply
//! configuration, then render" runs under an async lock.

mod embedded;
mod server;

pub use embedded::EmbeddedRenderer;
pub use server::ServerRenderer;

use crate::engine::EngineError;
use crate::service::{PreparedRender, RenderedArtifact};
use futures::lock::{Mutex, MutexGuard};
use sirenia_core::error::diagram_excerpt;
use sirenia_core::{EngineConfig, RenderConfig, RenderError, Result};

pub(crate) fn render_id() -> String {
    format!("mermaid-{}", uuid::Uuid::new_v4().simple())
}

/// One render on a loaded engine: the effective configuration and the id of the SVG root.
pub(crate) struct RenderJob {
    pub render_id: String,
    effective: EngineConfig,
}

impl RenderJob {
    /// A render without overrides re-applies the site defaults.
    pub fn new(
        site_config: &EngineConfig,
        prepared: &PreparedRender,
        config: Option<&RenderConfig>,
    ) -> Self {
        let default_request = RenderConfig::default();
        let request = config.unwrap_or(&default_request);
        Self {
            render_id: render_id(),
            effective: site_config.for_render(&prepared.variables, request),
        }
    }

    /// Takes the engine for this render and applies the configuration if it differs from the
    /// one currently applied. Hold the returned guard until the render has finished.
    pub async fn acquire<'a>(
        &self,
        applied: &'a Mutex<Option<EngineConfig>>,
        initialize: impl FnOnce(&EngineConfig) -> std::result::Result<(), EngineError>,
        source: &str,
    ) -> Result<MutexGuard<'a, Option<EngineConfig>>> {
        let mut guard = applied.lock().await;
        if guard.as_ref() != Some(&self.effective) {
            if let Err(err) = initialize(&self.effective) {
                *guard = None;
                tracing::error!(
                    error = %err,
                    diagram = %diagram_excerpt(source),
                    "engine rejected render configuration"
                );
                return Err(RenderError::unknown(err.to_string()).with_diagram(source));
            }
            *guard = Some(self.effective.clone());
        }
        Ok(guard)
    }

    pub fn finish(
        self,
        rendered: std::result::Result<String, EngineError>,
        prepared: PreparedRender,
        source: &str,
    ) -> Result<RenderedArtifact> {
        let svg = rendered.map_err(|err| err.into_render_error(source))?;
        if !svg.contains("<svg") {
            return Err(
                RenderError::render("engine output has no <svg> root element").with_diagram(source),
            );
        }

        Ok(RenderedArtifact {
            svg,
            render_id: self.render_id,
            theme: prepared.theme,
            diagram_type: prepared.diagram_type,
        })
    }
}
