//! Kind-keyed operator registry.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use super::Operator;

/// Registry of operator kinds, keyed by `type_id`.
///
/// The built-in set covers the runtime's own needs; editor and plugin
/// collaborators register their operator packs on top.
#[derive(Default, Clone)]
pub struct OperatorCatalog {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl OperatorCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with all built-in operators registered.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        super::builtin::register_all(&mut catalog);
        catalog
    }

    /// Register an operator under its declared `type_id`. Re-registering a
    /// key replaces the previous operator.
    pub fn register(&mut self, operator: Arc<dyn Operator>) {
        let type_id = operator.definition().type_id;
        debug!("Registered operator '{}'", type_id);
        self.operators.insert(type_id, operator);
    }

    pub fn get(&self, type_id: &str) -> Option<Arc<dyn Operator>> {
        self.operators.get(type_id).cloned()
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.operators.contains_key(type_id)
    }

    /// All registered kind keys, sorted for stable listings.
    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_builtins_registers_known_kinds() {
        let catalog = OperatorCatalog::with_builtins();
        assert!(catalog.contains("value.float"));
        assert!(catalog.contains("math.add"));
        assert!(catalog.contains("time.clock"));
        assert!(catalog.contains("select.index"));
        assert!(!catalog.contains("does.not.exist"));
    }

    #[test]
    fn test_type_ids_sorted() {
        let catalog = OperatorCatalog::with_builtins();
        let ids = catalog.type_ids();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
