//! Named style presets: the shipped palettes plus themes registered at runtime.

mod builtin;

pub use builtin::PALETTE_ROLES;

use crate::color::{ColorValue, canonical_role};
use crate::config::ThemeVariables;
use crate::{RenderError, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved name of the theme that defers entirely to the engine's own defaults.
pub const DEFAULT_THEME: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeDefinition {
    #[serde(default)]
    pub name: String,
    /// Color role -> color. Shorthand role names are expanded on resolution.
    pub colors: IndexMap<String, ColorValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ThemeDefinition {
    pub fn new(
        name: impl Into<String>,
        colors: impl IntoIterator<Item = (String, ColorValue)>,
    ) -> Self {
        Self {
            name: name.into(),
            colors: colors.into_iter().collect(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Normalized colors keyed by canonical role name.
    pub fn variables(&self) -> Result<ThemeVariables> {
        let mut out = ThemeVariables::with_capacity(self.colors.len());
        for (role, color) in &self.colors {
            let normalized = color.normalize().map_err(|err| {
                RenderError::invalid_theme(format!(
                    "theme `{}`: role `{role}`: {err}",
                    self.name
                ))
            })?;
            out.insert(canonical_role(role).to_string(), Value::String(normalized));
        }
        Ok(out)
    }

    fn validate(&self) -> Result<()> {
        if let Some(role) = self.colors.keys().find(|role| role.trim().is_empty()) {
            return Err(RenderError::invalid_theme(format!(
                "theme `{}` has an empty color role name ({role:?})",
                self.name
            )));
        }
        self.variables().map(|_| ())
    }
}

/// Catalogue of themes available to renderers.
///
/// Built-in themes are seeded at construction and cannot be replaced. Custom themes are added
/// with [`ThemeRegistry::register_theme`] and live as long as the registry.
#[derive(Debug)]
pub struct ThemeRegistry {
    builtins: Vec<ThemeDefinition>,
    custom: RwLock<IndexMap<String, ThemeDefinition>>,
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self {
            builtins: builtin::builtin_themes(),
            custom: RwLock::new(IndexMap::new()),
        }
    }
}

impl ThemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.iter().any(|t| t.name == name)
    }

    /// Registers a custom theme under `name`.
    ///
    /// A definition with an empty `name` takes the registration name, so
    /// [`get_theme`](Self::get_theme) returns it with `name` filled in. A definition named
    /// differently is rejected with `InvalidTheme`; a built-in or already registered name is
    /// `DuplicateTheme`.
    pub fn register_theme(&self, name: &str, mut definition: ThemeDefinition) -> Result<()> {
        if name.trim().is_empty() {
            return Err(RenderError::invalid_theme("theme name must not be empty"));
        }

        let mut custom = self.custom.write();
        if self.is_builtin(name) || custom.contains_key(name) {
            return Err(RenderError::duplicate_theme(name));
        }
        if definition.name.is_empty() {
            definition.name = name.to_string();
        } else if definition.name != name {
            return Err(RenderError::invalid_theme(format!(
                "theme is registered as `{name}` but its definition is named `{}`",
                definition.name
            )));
        }
        definition.validate()?;

        tracing::debug!(theme = name, roles = definition.colors.len(), "registered theme");
        custom.insert(name.to_string(), definition);
        Ok(())
    }

    /// Registers an untyped payload, e.g. a theme exported as JSON.
    pub fn register_theme_json(&self, name: &str, payload: Value) -> Result<()> {
        let Value::Object(map) = &payload else {
            return Err(RenderError::invalid_theme(format!(
                "theme `{name}` payload must be an object"
            )));
        };
        if !matches!(map.get("colors"), Some(Value::Object(_))) {
            return Err(RenderError::invalid_theme(format!(
                "theme `{name}` must define `colors` as a mapping"
            )));
        }
        let definition: ThemeDefinition = serde_json::from_value(payload).map_err(|err| {
            RenderError::invalid_theme(format!("theme `{name}` is malformed: {err}"))
        })?;
        self.register_theme(name, definition)
    }

    pub fn get_theme(&self, name: &str) -> Result<ThemeDefinition> {
        if let Some(theme) = self.custom.read().get(name) {
            return Ok(theme.clone());
        }
        self.builtins
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| RenderError::theme_not_found(name))
    }

    /// Built-in names first (`default` leading), then custom names in registration order.
    pub fn list_themes(&self) -> Vec<String> {
        let custom = self.custom.read();
        self.builtins
            .iter()
            .map(|t| t.name.clone())
            .chain(custom.keys().cloned())
            .collect()
    }

    /// Normalized color variables of the named theme.
    pub fn resolve_variables(&self, name: &str) -> Result<ThemeVariables> {
        self.get_theme(name)?.variables()
    }
}
