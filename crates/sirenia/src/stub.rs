use crate::compose::Requirement;
use crate::service::{RenderService, RenderedArtifact, escape_attr, prepare_render};
use parking_lot::Mutex;
use sirenia_core::{DiagramType, RenderConfig, Result, ThemeRegistry, ThemeVariables};
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Engine-free backend for tests and offline development.
///
/// Runs the same validation and theme resolution as the engine backends, then emits a
/// placeholder SVG tagged with a per-instance render id and the resolved theme. Output is
/// deterministic for a fresh instance.
#[derive(Debug)]
pub struct StubRenderer {
    registry: Requirement<ThemeRegistry>,
    renders: AtomicU64,
    last_variables: Mutex<ThemeVariables>,
}

impl StubRenderer {
    pub fn new(registry: Arc<ThemeRegistry>) -> Self {
        Self::with_requirement(Requirement::resolved(registry))
    }

    pub(crate) fn with_requirement(registry: Requirement<ThemeRegistry>) -> Self {
        Self {
            registry,
            renders: AtomicU64::new(0),
            last_variables: Mutex::new(ThemeVariables::new()),
        }
    }

    /// Theme variables resolved by the most recent successful render.
    pub fn last_theme_variables(&self) -> ThemeVariables {
        self.last_variables.lock().clone()
    }

    fn render_now(
        &self,
        source: &str,
        config: Option<&RenderConfig>,
    ) -> Result<RenderedArtifact> {
        let prepared = prepare_render(&self.registry, source, config)?;
        let n = self.renders.fetch_add(1, Ordering::Relaxed) + 1;
        let render_id = format!("stub-{n}");

        let mut style = String::new();
        for (role, value) in &prepared.variables {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let _ = write!(style, "--{}:{};", escape_attr(role), escape_attr(&value));
        }

        let svg = format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" id="{id}" data-render-id="{id}" "#,
                r#"data-theme="{theme}" data-diagram-type="{ty}" viewBox="0 0 160 40" "#,
                r#"role="img"><style>#{id}{{{style}}}</style>"#,
                r#"<text x="8" y="24">{ty}</text></svg>"#
            ),
            id = render_id,
            theme = escape_attr(&prepared.theme),
            ty = prepared.diagram_type,
            style = style,
        );

        *self.last_variables.lock() = prepared.variables;
        Ok(RenderedArtifact {
            svg,
            render_id,
            theme: prepared.theme,
            diagram_type: prepared.diagram_type,
        })
    }
}

impl RenderService for StubRenderer {
    async fn render(
        &self,
        source: &str,
        config: Option<&RenderConfig>,
    ) -> Result<RenderedArtifact> {
        self.render_now(source, config)
    }

    async fn detect_type(&self, source: &str) -> Result<DiagramType> {
        sirenia_core::detect_type(source)
    }
}
