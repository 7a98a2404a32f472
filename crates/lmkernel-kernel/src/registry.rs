//! Explicit kernel registration.
//!
//! The process assembling the host runtime registers each kernel it offers
//! with a spec and a factory, then starts instances by name.

use std::collections::BTreeMap;

use tracing::info;

use crate::spec::KernelSpec;

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Kernel already registered: {name}")]
    Duplicate { name: String },

    #[error("Kernel not found: {name}")]
    NotFound { name: String },
}

type Factory<K> = Box<dyn Fn() -> K + Send + Sync>;

struct Registration<K> {
    spec: KernelSpec,
    factory: Factory<K>,
}

/// Kernels available to a host, keyed by spec name.
pub struct KernelRegistry<K> {
    kernels: BTreeMap<String, Registration<K>>,
}

impl<K> Default for KernelRegistry<K> {
    fn default() -> Self {
        Self {
            kernels: BTreeMap::new(),
        }
    }
}

impl<K> KernelRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kernel. Names must be unique.
    pub fn register(
        &mut self,
        spec: KernelSpec,
        factory: impl Fn() -> K + Send + Sync + 'static,
    ) -> Result<(), RegistryError> {
        if self.kernels.contains_key(&spec.name) {
            return Err(RegistryError::Duplicate {
                name: spec.name.clone(),
            });
        }
        info!(name = %spec.name, display_name = %spec.display_name, "Registered kernel");
        self.kernels.insert(
            spec.name.clone(),
            Registration {
                spec,
                factory: Box::new(factory),
            },
        );
        Ok(())
    }

    /// Registered specs, ordered by name.
    pub fn specs(&self) -> impl Iterator<Item = &KernelSpec> {
        self.kernels.values().map(|r| &r.spec)
    }

    pub fn spec(&self, name: &str) -> Option<&KernelSpec> {
        self.kernels.get(name).map(|r| &r.spec)
    }

    /// Start a new instance of the named kernel.
    pub fn start(&self, name: &str) -> Result<K, RegistryError> {
        let registration = self
            .kernels
            .get(name)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })?;
        info!(name, "Starting kernel");
        Ok((registration.factory)())
    }
}
