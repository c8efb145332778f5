#![forbid(unsafe_code)]

//! `sirenia` renders diagram source text to SVG behind one contract, [`RenderService`], with
//! interchangeable backends:
//!
//! - [`StubRenderer`]: no engine, deterministic placeholder output
//! - [`ServerRenderer`]: lazily loaded engine, multi-threaded hosts
//! - [`EmbeddedRenderer`]: lazily loaded engine, single-threaded in-process hosts
//!
//! Backends depend on a [`ThemeRegistry`]; wire them with [`compose`].
//!
//! # Features
//!
//! - `mmdc` (default): [`engine::mmdc`], an engine driving the Mermaid CLI (needs a Tokio
//!   runtime)

pub use sirenia_core::*;

pub mod compose;
pub mod engine;
pub mod lazy;
pub mod service;
pub mod stub;

pub use compose::{RegistryLayer, RendererLayer, Requirement, ServiceGraph};
pub use engine::{Engine, EngineError, EngineLoader};
pub use lazy::{EmbeddedRenderer, ServerRenderer};
pub use service::{RenderService, RenderedArtifact};
pub use stub::StubRenderer;

#[cfg(test)]
mod tests;
