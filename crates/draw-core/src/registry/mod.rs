//! Plugin-based source registry
//!
//! The registry allows result sources and mirror sinks to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Registration
//!
//! Plugin crates register themselves during initialization:
//!
//! ```rust,ignore
//! // In draw-source-http
//! pub fn register(registry: &SourceRegistry) {
//!     registry.register_source("http", Box::new(HttpSourceFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

use crate::config::{IngestConfig, MirrorConfig};
use crate::error::{Error, Result};
use crate::traits::{MirrorSink, MirrorSinkFactory, NoopMirrorSink, ResultSource, ResultSourceFactory};

/// Registry for plugin-based source and sink creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct SourceRegistry {
    /// Registered result source factories
    sources: RwLock<HashMap<String, Box<dyn ResultSourceFactory>>>,

    /// Registered mirror sink factories
    mirrors: RwLock<HashMap<String, Box<dyn MirrorSinkFactory>>>,
}

impl SourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a result source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "http")
    /// - `factory`: Factory object for creating source instances
    pub fn register_source(&self, name: impl Into<String>, factory: Box<dyn ResultSourceFactory>) {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        sources.insert(name.into(), factory);
    }

    /// Register a mirror sink factory
    ///
    /// # Parameters
    ///
    /// - `name`: Sink type name (e.g., "rest")
    /// - `factory`: Factory object for creating sink instances
    pub fn register_mirror(&self, name: impl Into<String>, factory: Box<dyn MirrorSinkFactory>) {
        let mut mirrors = self.mirrors.write().unwrap_or_else(PoisonError::into_inner);
        mirrors.insert(name.into(), factory);
    }

    /// Create a result source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ResultSource>)`: Created source instance
    /// - `Err(Error)`: Push configuration, unregistered type, or creation failure
    pub fn create_source(&self, config: &IngestConfig) -> Result<Box<dyn ResultSource>> {
        let source_type = config
            .type_name()
            .ok_or_else(|| Error::config("Push ingest has no result source"))?;

        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown source type: {}", source_type)))?;

        factory.create(config)
    }

    /// Create a mirror sink from configuration
    ///
    /// A disabled mirror, or a REST mirror without a base URL, yields
    /// [`NoopMirrorSink`] without consulting the registry.
    pub fn create_mirror(&self, config: &MirrorConfig) -> Result<Arc<dyn MirrorSink>> {
        if !config.is_enabled() {
            info!("Mirror not configured, using no-op sink");
            return Ok(Arc::new(NoopMirrorSink));
        }

        let mirror_type = config.type_name();
        let mirrors = self.mirrors.read().unwrap_or_else(PoisonError::into_inner);

        let factory = mirrors
            .get(mirror_type)
            .ok_or_else(|| Error::config(format!("Unknown mirror type: {}", mirror_type)))?;

        Ok(Arc::from(factory.create(config)?))
    }

    /// List all registered source types
    pub fn list_sources(&self) -> Vec<String> {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.keys().cloned().collect()
    }

    /// List all registered mirror types
    pub fn list_mirrors(&self) -> Vec<String> {
        let mirrors = self.mirrors.read().unwrap_or_else(PoisonError::into_inner);
        mirrors.keys().cloned().collect()
    }

    /// Check if a source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }

    /// Check if a mirror type is registered
    pub fn has_mirror(&self, name: &str) -> bool {
        let mirrors = self.mirrors.read().unwrap_or_else(PoisonError::into_inner);
        mirrors.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecordDraft, ValidationMode};

    struct MockSourceFactory;

    impl ResultSourceFactory for MockSourceFactory {
        fn create(&self, _config: &IngestConfig) -> Result<Box<dyn ResultSource>> {
            Err(Error::config("Mock source not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = SourceRegistry::new();

        // Initially empty
        assert!(!registry.has_source("mock"));

        // Register
        registry.register_source("mock", Box::new(MockSourceFactory));

        // Now present
        assert!(registry.has_source("mock"));
        assert!(registry.list_sources().contains(&"mock".to_string()));
        assert!(registry.list_mirrors().is_empty());
    }

    #[test]
    fn test_push_config_has_no_source() {
        let registry = SourceRegistry::new();
        let config = IngestConfig::Push {
            validation: ValidationMode::Lenient,
        };

        assert!(registry.create_source(&config).is_err());
    }

    #[test]
    fn test_unconfigured_mirror_degrades_to_noop() {
        let registry = SourceRegistry::new();

        let sink = registry.create_mirror(&MirrorConfig::Disabled).unwrap();
        assert!(!sink.is_configured());

        let sink = registry
            .create_mirror(&MirrorConfig::Rest {
                base_url: String::new(),
                auth_token: None,
                records_path: "results".to_string(),
                queue_key: "live_queue".to_string(),
                queue_capacity: 100,
                timeout_secs: 10,
            })
            .unwrap();
        assert_eq!(sink.sink_name(), "noop");
    }

    /// Source that always reports the period found in its custom config
    struct FixedSource {
        period: String,
    }

    #[async_trait::async_trait]
    impl ResultSource for FixedSource {
        async fn fetch(&self) -> Result<RecordDraft> {
            Ok(RecordDraft {
                period: Some(self.period.clone()),
                ..RecordDraft::default()
            })
        }

        fn source_name(&self) -> &str {
            "fixed"
        }
    }

    struct FixedSourceFactory;

    impl ResultSourceFactory for FixedSourceFactory {
        fn create(&self, config: &IngestConfig) -> Result<Box<dyn ResultSource>> {
            match config {
                IngestConfig::Custom { config, .. } => {
                    let period = config["period"]
                        .as_str()
                        .ok_or_else(|| Error::config("fixed source needs a period"))?;
                    Ok(Box::new(FixedSource {
                        period: period.to_string(),
                    }))
                }
                _ => Err(Error::config("Invalid config for fixed source")),
            }
        }
    }

    struct NoopMirrorFactory;

    impl MirrorSinkFactory for NoopMirrorFactory {
        fn create(&self, _config: &MirrorConfig) -> Result<Box<dyn MirrorSink>> {
            Ok(Box::new(NoopMirrorSink))
        }
    }

    #[tokio::test]
    async fn test_custom_source_created_through_registry() {
        let registry = SourceRegistry::new();
        registry.register_source("fixed", Box::new(FixedSourceFactory));

        let config = IngestConfig::Custom {
            factory: "fixed".to_string(),
            interval_secs: 2,
            timeout_secs: 10,
            config: serde_json::json!({"period": "P42"}),
        };
        assert!(config.validate().is_ok());

        let source = registry.create_source(&config).unwrap();
        assert_eq!(source.source_name(), "fixed");
        assert_eq!(source.fetch().await.unwrap().period.as_deref(), Some("P42"));

        let missing_period = IngestConfig::Custom {
            factory: "fixed".to_string(),
            interval_secs: 2,
            timeout_secs: 10,
            config: serde_json::json!({}),
        };
        assert!(matches!(
            registry.create_source(&missing_period),
            Err(Error::Config(_))
        ));

        let unregistered = IngestConfig::Custom {
            factory: "elsewhere".to_string(),
            interval_secs: 2,
            timeout_secs: 10,
            config: serde_json::json!({"period": "P1"}),
        };
        assert!(registry.create_source(&unregistered).is_err());
    }

    #[test]
    fn test_custom_mirror_created_through_registry() {
        let registry = SourceRegistry::new();
        registry.register_mirror("memory", Box::new(NoopMirrorFactory));

        let config = MirrorConfig::Custom {
            factory: "memory".to_string(),
            config: serde_json::json!({}),
        };
        let sink = registry.create_mirror(&config).unwrap();
        assert_eq!(sink.sink_name(), "noop");
        assert!(registry.has_mirror("memory"));
    }

    #[test]
    fn test_unknown_mirror_type_is_config_error() {
        let registry = SourceRegistry::new();
        let config = MirrorConfig::Custom {
            factory: "nowhere".to_string(),
            config: serde_json::json!({}),
        };

        assert!(matches!(
            registry.create_mirror(&config),
            Err(Error::Config(_))
        ));
    }
}
