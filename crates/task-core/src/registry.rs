//! Calculator registry: resolves node calculator names to factories

use crate::calculator::Calculator;
use crate::error::{Result, TaskError};
use crate::graph::{NodeConfig, FLOW_LIMITER_CALCULATOR};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds a calculator instance for one node of an instantiated graph
pub type CalculatorFactory =
    Arc<dyn Fn(&NodeConfig) -> Result<Box<dyn Calculator>> + Send + Sync>;

/// Calculator registry for lookup at graph instantiation.
///
/// The flow limiter is built into the engine and always resolvable.
pub struct CalculatorRegistry {
    factories: HashMap<String, CalculatorFactory>,
}

impl CalculatorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::with_capacity(8),
        }
    }

    /// Register a calculator factory under `name`, replacing any previous one
    pub fn register(&mut self, name: impl Into<String>, factory: CalculatorFactory) {
        let name = name.into();
        info!("Registering calculator: {}", name);
        self.factories.insert(name, factory);
    }

    /// Register a plain closure as a factory
    pub fn register_fn<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&NodeConfig) -> Result<Box<dyn Calculator>> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        name == FLOW_LIMITER_CALCULATOR || self.factories.contains_key(name)
    }

    /// Get all registered calculator names
    pub fn calculator_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.factories.len());
        names.extend(self.factories.keys().cloned());
        names.sort();
        names
    }

    /// Instantiate the calculator for `node`
    pub fn create(&self, node: &NodeConfig) -> Result<Box<dyn Calculator>> {
        let factory = self.factories.get(&node.calculator).ok_or_else(|| {
            TaskError::InvalidGraph(format!(
                "No calculator registered for type: {}",
                node.calculator
            ))
        })?;
        debug!("Creating calculator '{}'", node.calculator);
        factory(node)
    }
}

impl Default for CalculatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CalculatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculatorRegistry")
            .field("calculators", &self.calculator_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::CalculatorContext;

    // Mock calculator for testing
    struct MockCalculator;

    impl Calculator for MockCalculator {
        fn name(&self) -> &str {
            "Mock"
        }

        fn process(&mut self, _cx: &mut CalculatorContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn node(calculator: &str) -> NodeConfig {
        NodeConfig {
            calculator: calculator.to_string(),
            input_streams: vec![],
            output_streams: vec![],
            options: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_registry_register_calculator() {
        let mut registry = CalculatorRegistry::new();
        registry.register_fn("Mock", |_| Ok(Box::new(MockCalculator)));

        assert_eq!(registry.calculator_names(), vec!["Mock".to_string()]);
        assert!(registry.contains("Mock"));
        assert!(registry.contains(FLOW_LIMITER_CALCULATOR));
        assert_eq!(registry.create(&node("Mock")).unwrap().name(), "Mock");
    }

    #[test]
    fn test_registry_unknown_calculator() {
        let registry = CalculatorRegistry::new();
        let err = registry.create(&node("Missing")).err().unwrap();
        assert!(matches!(err, TaskError::InvalidGraph(_)));
    }
}
