use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    #[default]
    Strict,
    Loose,
    Antiscript,
    Sandbox,
}

impl SecurityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Loose => "loose",
            Self::Antiscript => "antiscript",
            Self::Sandbox => "sandbox",
        }
    }
}

/// Per-call render options. Every field is optional; `None` means "backend default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Raw role -> value overrides. Shorthand role names are accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_variables: Option<IndexMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_level: Option<SecurityLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flowchart: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

impl RenderConfig {
    pub fn with_theme(theme: impl Into<String>) -> Self {
        Self {
            theme: Some(theme.into()),
            ..Self::default()
        }
    }

    pub fn theme_variable(mut self, role: impl Into<String>, value: impl Into<Value>) -> Self {
        self.theme_variables
            .get_or_insert_with(IndexMap::new)
            .insert(role.into(), value.into());
        self
    }

    pub(crate) fn family_overrides(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        [
            ("flowchart", self.flowchart.as_ref()),
            ("sequence", self.sequence.as_ref()),
            ("class", self.class.as_ref()),
            ("state", self.state.as_ref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
    }
}

/// The engine's global configuration object.
///
/// Mirrors the shape the engine's `initialize` call expects (`theme`, `themeVariables`,
/// `securityLevel`, per-family records, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig(Value);

impl Default for EngineConfig {
    fn default() -> Self {
        let mut cfg = Self::empty_object();
        cfg.set_value("startOnLoad", Value::Bool(false));
        cfg.set_value("theme", Value::String(crate::theme::DEFAULT_THEME.to_string()));
        cfg.set_value(
            "securityLevel",
            Value::String(SecurityLevel::default().as_str().to_string()),
        );
        cfg
    }
}

impl EngineConfig {
    pub fn empty_object() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn get(&self, dotted_path: &str) -> Option<&Value> {
        let mut cur = &self.0;
        for segment in dotted_path.split('.') {
            cur = cur.as_object()?.get(segment)?;
        }
        Some(cur)
    }

    pub fn get_str(&self, dotted_path: &str) -> Option<&str> {
        self.get(dotted_path)?.as_str()
    }

    pub fn set_value(&mut self, dotted_path: &str, value: Value) {
        // Configs are objects; a non-object root (possible via `from_value`) is replaced.
        if !self.0.is_object() {
            self.0 = Value::Object(Map::new());
        }

        let Value::Object(ref mut root) = self.0 else {
            return;
        };
        let mut cur: &mut Map<String, Value> = root;
        let mut segments = dotted_path.split('.').peekable();
        while let Some(seg) = segments.next() {
            if segments.peek().is_none() {
                cur.insert(seg.to_string(), value);
                return;
            }
            let slot = cur.entry(seg).or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Some(next) = slot.as_object_mut() else {
                return;
            };
            cur = next;
        }
    }

    pub fn deep_merge(&mut self, other: &Value) {
        deep_merge_value(&mut self.0, other);
    }

    fn merge_at(&mut self, key: &str, value: Value) {
        let mut patch = Map::new();
        patch.insert(key.to_string(), value);
        self.deep_merge(&Value::Object(patch));
    }

    /// Builds the configuration for one render: `self` (the site defaults) overlaid with the
    /// resolved theme variables, security level and diagram-family records of `request`.
    ///
    /// Empty `variables` keep the site theme untouched.
    pub fn for_render(&self, variables: &ThemeVariables, request: &RenderConfig) -> Self {
        let mut cfg = self.clone();
        if !variables.is_empty() {
            // Palettes ride on the engine's fully-derivable base theme.
            cfg.set_value("theme", Value::String("base".to_string()));
            let vars: Map<String, Value> = variables
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            cfg.merge_at("themeVariables", Value::Object(vars));
        }
        if let Some(level) = request.security_level {
            cfg.set_value("securityLevel", Value::String(level.as_str().to_string()));
        }
        for (family, value) in request.family_overrides() {
            cfg.merge_at(family, value.clone());
        }
        cfg
    }
}

/// Resolved, alias-expanded theme variables in insertion order.
pub type ThemeVariables = IndexMap<String, Value>;

fn deep_merge_value(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(in_map)) => {
            for (key, in_value) in in_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge_value(base_value, in_value),
                    None => {
                        base_map.insert(key.clone(), in_value.clone());
                    }
                }
            }
        }
        (base_slot, in_value) => {
            *base_slot = in_value.clone();
        }
    }
}
