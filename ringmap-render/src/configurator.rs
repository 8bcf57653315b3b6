//! Applies the overlay style to a ready surface.
//!
//! Applying creates the named source with an empty collection and then adds
//! every layer in declaration order. It must run once per surface: a second
//! run fails on the duplicate source id.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info};
use ringmap_core::{FeatureCollection, StyleError, StyleSpec};

use crate::surface::{RenderSurface, SurfaceError};

pub struct StyleConfigurator {
    style: StyleSpec,
    applications: AtomicUsize,
}

impl StyleConfigurator {
    pub fn new(style: StyleSpec) -> Self {
        Self {
            style,
            applications: AtomicUsize::new(0),
        }
    }

    /// Configurator for the bundled ring overlay style.
    pub fn rings() -> Result<Self, StyleError> {
        Ok(Self::new(StyleSpec::rings()?))
    }

    pub fn style(&self) -> &StyleSpec {
        &self.style
    }

    /// The named source the overlay's data lives in.
    pub fn source_id(&self) -> &str {
        &self.style.source.id
    }

    /// Add the source and layers to `surface`.
    pub fn apply(&self, surface: &dyn RenderSurface) -> Result<(), SurfaceError> {
        if !surface.is_ready() {
            return Err(SurfaceError::NotReady);
        }

        surface.add_source(self.source_id(), Arc::new(FeatureCollection::empty()))?;
        for entry in &self.style.layers {
            surface.add_layer(&entry.layer, entry.before.as_deref())?;
            debug!(
                "Layer {} placed {}",
                entry.layer.id,
                entry.before.as_deref().map_or("on top".to_string(), |b| format!("below {b}"))
            );
        }

        self.applications.fetch_add(1, Ordering::Relaxed);
        info!(
            "Applied overlay style to surface {}: source {}, {} layers",
            surface.id(),
            self.source_id(),
            self.style.layers.len()
        );
        Ok(())
    }

    /// How many times [`apply`](Self::apply) has succeeded.
    pub fn applications(&self) -> usize {
        self.applications.load(Ordering::Relaxed)
    }
}
