#![forbid(unsafe_code)]

//! Executor-free building blocks for the sirenia rendering service.
//!
//! - [`error`]: the tagged error every component returns
//! - [`theme`]: built-in and custom theme registry
//! - [`color`]: color normalization for theme payloads
//! - [`detect`]: diagram family detection
//! - [`config`]: per-render options and the engine's global configuration object

pub mod color;
pub mod config;
pub mod detect;
pub mod error;
pub mod theme;

pub use color::{ColorError, ColorValue, Rgba};
pub use config::{EngineConfig, RenderConfig, SecurityLevel, ThemeVariables};
pub use detect::{DiagramType, detect_type};
pub use error::{ErrorKind, RenderError, Result};
pub use theme::{DEFAULT_THEME, ThemeDefinition, ThemeRegistry};
