use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::config::DetectorSettings;
use crate::detect::result::RawDetection;

use super::backend::DetectorBackend;
use super::backends::{CpuBackend, StubBackend};

/// Thread-safe registry of detector backends.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<Mutex<dyn DetectorBackend>>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Registry holding every backend the settings can name, with the
    /// configured one as default. Model-backed backends are only loaded when
    /// selected.
    pub fn from_settings(settings: &DetectorSettings) -> Result<Self> {
        let mut registry = Self::new();
        match settings.backend.as_str() {
            #[cfg(feature = "backend-tract")]
            "tract" => {
                let model_path = settings
                    .model_path
                    .as_ref()
                    .ok_or_else(|| anyhow!("tract backend requires detector.model_path"))?;
                let backend =
                    super::backends::TractBackend::new(model_path, settings.input_size)?;
                let backend = if settings.pixel_boxes {
                    backend.with_pixel_boxes()
                } else {
                    backend
                };
                registry.register(backend);
            }
            #[cfg(not(feature = "backend-tract"))]
            "tract" => {
                return Err(anyhow!("tract backend requires the backend-tract feature"));
            }
            _ => {}
        }
        registry.register(CpuBackend::default());
        registry.register(StubBackend::default());
        registry.set_default(&settings.backend)?;
        Ok(registry)
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.backends.get(name).cloned()
    }

    /// Get default backend.
    pub fn default_backend(&self) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// List registered backends, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run detection on the default backend.
    pub fn detect(&self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<RawDetection>> {
        let backend = self
            .default_backend()
            .ok_or_else(|| anyhow!("no detector backend registered"))?;
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        guard.detect(pixels, width, height)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registered_backend_is_default() -> Result<()> {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::default());
        registry.register(CpuBackend::default());

        let backend = registry.default_backend().unwrap();
        let name = backend.lock().unwrap().name();
        assert_eq!(name, "stub");
        assert_eq!(registry.list(), vec!["cpu", "stub"]);
        Ok(())
    }

    #[test]
    fn set_default_requires_registration() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::default());
        assert!(registry.set_default("tract").is_err());
        assert!(registry.set_default("stub").is_ok());
    }

    #[test]
    fn detect_without_backends_fails() {
        let registry = BackendRegistry::new();
        assert!(registry.detect(&[], 0, 0).is_err());
    }

    #[test]
    fn from_settings_selects_configured_backend() -> Result<()> {
        let settings = DetectorSettings {
            backend: "stub".to_string(),
            ..DetectorSettings::default()
        };
        let registry = BackendRegistry::from_settings(&settings)?;
        assert!(registry.detect(&[], 0, 0)?.is_empty());
        let name = registry.default_backend().unwrap().lock().unwrap().name();
        assert_eq!(name, "stub");
        Ok(())
    }

    #[test]
    fn from_settings_rejects_unknown_backend() {
        let settings = DetectorSettings {
            backend: "opencv".to_string(),
            ..DetectorSettings::default()
        };
        assert!(BackendRegistry::from_settings(&settings).is_err());
    }
}
