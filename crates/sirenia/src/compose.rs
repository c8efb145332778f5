//! Wiring a render backend to the theme registry it depends on.
//!
//! A [`RendererLayer`] builds a backend from a [`Requirement`] on the registry. Providing a
//! [`RegistryLayer`] to it with [`RendererLayer::provide`] declares the edge and resolves the
//! requirement. [`merge`] only places both layers side by side: composition succeeds, but the
//! backend reports `service not found` on its first operation.

use crate::engine::{EngineLoader, LocalEngineLoader};
use crate::lazy::{EmbeddedRenderer, ServerRenderer};
use crate::service::{RenderService, RenderedArtifact};
use crate::stub::StubRenderer;
use sirenia_core::{DiagramType, RenderConfig, RenderError, Result, ThemeRegistry};
use std::fmt;
use std::sync::Arc;

/// A dependency slot filled at composition time.
pub struct Requirement<T> {
    service: Option<Arc<T>>,
}

impl<T> Requirement<T> {
    pub fn resolved(service: Arc<T>) -> Self {
        Self {
            service: Some(service),
        }
    }

    pub fn missing() -> Self {
        Self { service: None }
    }

    pub fn is_resolved(&self) -> bool {
        self.service.is_some()
    }

    pub fn get(&self) -> Result<&Arc<T>> {
        self.service.as_ref().ok_or_else(|| {
            RenderError::unknown(format!("service not found: {}", short_type_name::<T>()))
        })
    }
}

impl<T> Clone for Requirement<T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<T> fmt::Debug for Requirement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requirement")
            .field("service", &short_type_name::<T>())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[derive(Debug, Clone, Default)]
pub struct RegistryLayer {
    registry: Arc<ThemeRegistry>,
}

impl RegistryLayer {
    pub fn new(registry: ThemeRegistry) -> Self {
        Self::from_shared(Arc::new(registry))
    }

    pub fn from_shared(registry: Arc<ThemeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ThemeRegistry> {
        &self.registry
    }
}

pub struct RendererLayer<R> {
    build: Box<dyn FnOnce(Requirement<ThemeRegistry>) -> R>,
}

impl<R: 'static> RendererLayer<R> {
    pub fn from_fn(build: impl FnOnce(Requirement<ThemeRegistry>) -> R + 'static) -> Self {
        Self {
            build: Box::new(build),
        }
    }

    /// Post-processes the backend once it is built, e.g. to attach a site config.
    pub fn map<S>(self, f: impl FnOnce(R) -> S + 'static) -> RendererLayer<S> {
        RendererLayer {
            build: Box::new(move |registry| f((self.build)(registry))),
        }
    }

    /// Builds the backend with `registry` as its declared dependency.
    pub fn provide(self, registry: RegistryLayer) -> ServiceGraph<R> {
        let renderer = (self.build)(Requirement::resolved(Arc::clone(&registry.registry)));
        ServiceGraph {
            registry: registry.registry,
            renderer,
        }
    }
}

impl RendererLayer<StubRenderer> {
    pub fn stub() -> Self {
        Self::from_fn(StubRenderer::with_requirement)
    }
}

impl<L: EngineLoader> RendererLayer<ServerRenderer<L>> {
    pub fn server(loader: L) -> Self {
        Self::from_fn(move |registry| ServerRenderer::with_requirement(registry, loader))
    }
}

impl<L: LocalEngineLoader> RendererLayer<EmbeddedRenderer<L>> {
    pub fn embedded(loader: L) -> Self {
        Self::from_fn(move |registry| EmbeddedRenderer::with_requirement(registry, loader))
    }
}

/// Places both layers next to each other without declaring the dependency edge.
///
/// Composition itself succeeds; the backend fails its first operation with an `Unknown`
/// "service not found" error.
pub fn merge<R: 'static>(registry: RegistryLayer, renderer: RendererLayer<R>) -> ServiceGraph<R> {
    tracing::debug!("merging renderer and registry layers without a dependency edge");
    ServiceGraph {
        registry: registry.registry,
        renderer: (renderer.build)(Requirement::missing()),
    }
}

/// A backend wired to its theme registry.
#[derive(Debug)]
pub struct ServiceGraph<R> {
    registry: Arc<ThemeRegistry>,
    renderer: R,
}

impl<R> ServiceGraph<R> {
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn registry(&self) -> &ThemeRegistry {
        &self.registry
    }

    pub fn shared_registry(&self) -> Arc<ThemeRegistry> {
        Arc::clone(&self.registry)
    }
}

impl<R: RenderService> RenderService for ServiceGraph<R> {
    async fn render(
        &self,
        source: &str,
        config: Option<&RenderConfig>,
    ) -> Result<RenderedArtifact> {
        self.renderer.render(source, config).await
    }

    async fn detect_type(&self, source: &str) -> Result<DiagramType> {
        self.renderer.detect_type(source).await
    }
}
