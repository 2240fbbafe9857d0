use rustc_hash::FxHashMap;

use crate::builtins;
use crate::error::VrmlError;
use crate::node_type::{NodeType, NodeTypeRef};

/// Name → descriptor table. One per scene; PROTO definitions extend it at
/// load time, scoped copies handle nested PROTO bodies.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: FxHashMap<String, NodeTypeRef>,
}

impl TypeRegistry {
    /// Empty registry, no built-in types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the base-profile node set.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::install(&mut registry);
        registry
    }

    pub fn get(&self, name: &str) -> Option<NodeTypeRef> {
        self.types.get(name).cloned()
    }

    pub fn lookup(&self, name: &str) -> Result<NodeTypeRef, VrmlError> {
        self.get(name).ok_or_else(|| VrmlError::UnknownType {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Register a descriptor. Registration is idempotent by name: if the
    /// name is already taken the existing descriptor wins and is returned,
    /// so a repeated PROTO definition cannot re-type existing instances.
    pub fn register(&mut self, ty: NodeType) -> NodeTypeRef {
        self.register_shared(NodeTypeRef::new(ty))
    }

    pub fn register_shared(&mut self, ty: NodeTypeRef) -> NodeTypeRef {
        self.types
            .entry(ty.name().to_string())
            .or_insert(ty)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_type::NodeKind;

    #[test]
    fn builtin_set_is_present() {
        let reg = TypeRegistry::with_builtins();
        for name in ["Group", "Transform", "Shape", "Box", "Viewpoint", "WorldInfo"] {
            assert!(reg.contains(name), "missing builtin {name}");
        }
    }

    #[test]
    fn register_is_idempotent_by_name() {
        let mut reg = TypeRegistry::new();
        let first = reg.register(NodeType::new("Thing", NodeKind::Attribute));
        let second = reg.register(NodeType::new("Thing", NodeKind::Grouping));
        assert!(NodeTypeRef::ptr_eq(&first, &second));
        assert_eq!(second.kind(), NodeKind::Attribute);
    }

    #[test]
    fn lookup_unknown_is_an_error() {
        let reg = TypeRegistry::with_builtins();
        assert!(matches!(
            reg.lookup("NoSuchNode"),
            Err(VrmlError::UnknownType { .. })
        ));
    }
}
