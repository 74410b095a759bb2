//! Name-keyed engine lookup

use std::collections::BTreeMap;
use std::sync::Arc;

use bees_core::{Engine, EngineError};

use crate::ab::AbEngine;
use crate::siege::SiegeEngine;

/// Explicit map from engine name to implementation
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: BTreeMap<String, Arc<dyn Engine>>,
}

impl EngineRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `ab` and `siege`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AbEngine::new()));
        registry.register(Arc::new(SiegeEngine::new()));
        registry
    }

    /// Add an engine under its lowercased name, replacing any previous entry
    pub fn register(&mut self, engine: Arc<dyn Engine>) {
        self.engines.insert(engine.name().to_lowercase(), engine);
    }

    /// Look up an engine by name (case-insensitive)
    pub fn get(&self, name: &str) -> Result<Arc<dyn Engine>, EngineError> {
        self.engines
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| EngineError::Unknown(name.to_string()))
    }

    /// Registered engine names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.engines.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bees_core::{BeesError, CommandSpec, MetricRecord, RawOutput};

    struct Wrk(&'static str);

    impl Engine for Wrk {
        fn name(&self) -> &str {
            self.0
        }

        fn build_command(&self, _spec: &CommandSpec) -> Result<String, EngineError> {
            Ok("wrk".into())
        }

        fn parse(&self, _output: &RawOutput) -> Option<MetricRecord> {
            None
        }
    }

    #[test]
    fn test_defaults() {
        let registry = EngineRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["ab", "siege"]);
        assert_eq!(registry.get("ab").unwrap().name(), "ab");
        assert_eq!(registry.get("Siege").unwrap().name(), "siege");
    }

    #[test]
    fn test_unknown_engine() {
        let registry = EngineRegistry::with_defaults();
        let err = registry.get("wrk").err().unwrap();
        assert_eq!(err, EngineError::Unknown("wrk".into()));

        let err: BeesError = err.into();
        assert!(matches!(err, BeesError::Config(_)));
    }

    #[test]
    fn test_register_custom_engine() {
        let mut registry = EngineRegistry::with_defaults();
        registry.register(Arc::new(Wrk("wrk")));
        assert_eq!(registry.names(), vec!["ab", "siege", "wrk"]);
        assert!(registry.get("wrk").is_ok());
    }

    #[test]
    fn test_mixed_case_name_is_reachable() {
        let mut registry = EngineRegistry::new();
        registry.register(Arc::new(Wrk("Wrk")));

        assert_eq!(registry.names(), vec!["wrk"]);
        assert_eq!(registry.get("wrk").unwrap().name(), "Wrk");
        assert_eq!(registry.get("WRK").unwrap().name(), "Wrk");
    }
}
