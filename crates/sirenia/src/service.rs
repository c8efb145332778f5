use crate::compose::Requirement;
use serde_json::Value;
use sirenia_core::color::{ColorValue, canonical_role};
use sirenia_core::{
    DEFAULT_THEME, DiagramType, ErrorKind, RenderConfig, RenderError, Result, ThemeRegistry,
    ThemeVariables,
};
use std::future::Future;

/// Output of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    /// SVG markup.
    pub svg: String,
    pub render_id: String,
    /// Name of the theme the render actually used (after fallback).
    pub theme: String,
    pub diagram_type: DiagramType,
}

/// The operations every backend provides.
pub trait RenderService {
    fn render(
        &self,
        source: &str,
        config: Option<&RenderConfig>,
    ) -> impl Future<Output = Result<RenderedArtifact>>;

    fn detect_type(&self, source: &str) -> impl Future<Output = Result<DiagramType>>;
}

/// Validated input plus the resolved theme, shared by all backends.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PreparedRender {
    pub theme: String,
    pub variables: ThemeVariables,
    pub diagram_type: DiagramType,
}

/// Validation, theme resolution and override merging.
///
/// An unknown theme degrades to the default theme with a warning; it never fails the render.
pub(crate) fn prepare_render(
    registry: &Requirement<ThemeRegistry>,
    source: &str,
    config: Option<&RenderConfig>,
) -> Result<PreparedRender> {
    let diagram_type = sirenia_core::detect_type(source)?;
    let registry = registry.get().inspect_err(|err| {
        tracing::error!(error = %err, "render service is missing a dependency");
    })?;

    let requested = config.and_then(|c| c.theme.as_deref());
    let (theme, mut variables) = match requested {
        Some(name) if name != DEFAULT_THEME => match registry.resolve_variables(name) {
            Ok(vars) => (name.to_string(), vars),
            Err(err) if err.kind == ErrorKind::ThemeNotFound => {
                tracing::warn!(theme = name, "theme not found, falling back to default");
                (DEFAULT_THEME.to_string(), ThemeVariables::new())
            }
            Err(err) => {
                tracing::error!(theme = name, error = %err, "failed to resolve theme");
                return Err(RenderError::unknown(err.message).with_diagram(source));
            }
        },
        _ => (DEFAULT_THEME.to_string(), ThemeVariables::new()),
    };

    if let Some(overrides) = config.and_then(|c| c.theme_variables.as_ref()) {
        for (role, value) in overrides {
            variables.insert(canonical_role(role).to_string(), normalize_override(value));
        }
    }

    Ok(PreparedRender {
        theme,
        variables,
        diagram_type,
    })
}

/// Color-like strings and records are normalized; anything else (font names, sizes, flags) is
/// handed to the engine verbatim.
fn normalize_override(value: &Value) -> Value {
    let color = match value {
        Value::String(s) => ColorValue::Text(s.clone()),
        Value::Object(_) => match serde_json::from_value::<ColorValue>(value.clone()) {
            Ok(color) => color,
            Err(_) => return value.clone(),
        },
        _ => return value.clone(),
    };
    color
        .normalize()
        .map(Value::String)
        .unwrap_or_else(|_| value.clone())
}

pub(crate) fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
