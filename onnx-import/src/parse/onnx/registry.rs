//! ONNX tensor name -> graph handler tensor.

use std::collections::{HashMap, HashSet};

use crate::error::ImportError;

/// Name registry filled during one import.
///
/// Graph inputs, initializers and outputs are declared once each; every node
/// output is produced once. Reads must follow a write.
#[derive(Debug, Clone)]
pub struct TensorRegistry<T> {
    tensors: HashMap<String, T>,
    produced: HashSet<String>,
}

impl<T: Copy> TensorRegistry<T> {
    pub fn new() -> Self {
        Self {
            tensors: HashMap::new(),
            produced: HashSet::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<T> {
        self.tensors.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, T)> + '_ {
        self.tensors.iter().map(|(name, t)| (name.as_str(), *t))
    }

    /// Handle for a node input.
    pub fn resolve(&self, op_type: &str, name: &str) -> Result<T, ImportError> {
        self.get(name).ok_or_else(|| ImportError::UnresolvedInput {
            op_type: op_type.to_string(),
            name: name.to_string(),
        })
    }

    /// Register a declared (input or initializer) tensor under a fresh name.
    pub(crate) fn declare(&mut self, name: &str, tensor: T) -> Result<(), ImportError> {
        if self.contains(name) {
            return Err(ImportError::DuplicateTensor {
                name: name.to_string(),
            });
        }
        self.tensors.insert(name.to_string(), tensor);
        Ok(())
    }

    /// Fails if a previous node already produced `name`.
    pub(crate) fn check_unproduced(&self, name: &str) -> Result<(), ImportError> {
        if self.produced.contains(name) {
            return Err(ImportError::DuplicateTensor {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Record a node output, replacing any pre-declared handle.
    pub(crate) fn produce(&mut self, name: &str, tensor: T) {
        self.produced.insert(name.to_string());
        self.tensors.insert(name.to_string(), tensor);
    }
}

impl<T: Copy> Default for TensorRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_requires_prior_write() {
        let mut reg = TensorRegistry::new();
        reg.declare("a", 0usize).unwrap();
        assert_eq!(reg.resolve("Relu", "a").unwrap(), 0);

        let err = reg.resolve("Relu", "b").unwrap_err();
        assert_eq!(err.to_string(), "Relu: input \"b\" is not defined before use");
    }

    #[test]
    fn declare_rejects_duplicates() {
        let mut reg = TensorRegistry::new();
        reg.declare("a", 0usize).unwrap();
        assert!(matches!(
            reg.declare("a", 1).unwrap_err(),
            ImportError::DuplicateTensor { .. }
        ));
        assert_eq!(reg.get("a"), Some(0));
    }

    #[test]
    fn produce_overwrites_declaration_once() {
        let mut reg = TensorRegistry::new();
        reg.declare("y", 3usize).unwrap();
        reg.check_unproduced("y").unwrap();
        reg.produce("y", 3);
        assert_eq!(reg.len(), 1);
        assert!(reg.check_unproduced("y").is_err());
    }
}
