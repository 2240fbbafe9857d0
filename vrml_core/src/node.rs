use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use vrml_field::FieldValue;
use vrml_ids::NodeId;

use crate::bvolume::BVolume;
use crate::error::VrmlError;
use crate::node_type::{IsTarget, NodeTypeRef};

/// An installed route hanging off its source node. `from` is the canonical
/// emitted name (`x_changed` for an exposed field `x`).
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub from: String,
    pub to_node: NodeId,
    pub to_event_in: String,
}

/// Per-instance PROTO state: the private copy of the implementation
/// subgraph and the IS dispatch table built from the descriptor's map,
/// rewritten to the copied node ids.
#[derive(Debug, Default)]
pub struct ProtoInstance {
    pub impl_roots: Vec<NodeId>,
    pub dispatch: FxHashMap<String, Vec<IsTarget>>,
}

/// One node instance. Field storage is declaration-ordered; eventOut values
/// are recorded as they are emitted so late-added routes and pollers see the
/// last value.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    ty: NodeTypeRef,
    name: Option<String>,
    fields: IndexMap<String, FieldValue>,
    event_outs: FxHashMap<String, FieldValue>,
    routes: SmallVec<[Route; 4]>,
    pub(crate) modified: bool,
    pub(crate) bvolume_dirty: bool,
    pub(crate) bvolume: BVolume,
    pub(crate) proto: Option<Box<ProtoInstance>>,
}

impl Node {
    /// Instantiate with every stored field at its declared default.
    pub fn new(id: NodeId, ty: NodeTypeRef) -> Self {
        let mut fields = IndexMap::new();
        for name in ty.stored_field_names() {
            if let Some(default) = ty.field_default(name) {
                fields.insert(name.to_string(), default);
            }
        }
        Self {
            id,
            ty,
            name: None,
            fields,
            event_outs: FxHashMap::default(),
            routes: SmallVec::new(),
            modified: true,
            bvolume_dirty: true,
            bvolume: BVolume::Empty,
            proto: None,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn node_type(&self) -> &NodeTypeRef {
        &self.ty
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    // ---- fields ----

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Store `value` into the named field after a tag check. Purely local:
    /// modified flags, IS forwarding and eventOut emission are the scene's
    /// business.
    pub fn store_field(&mut self, name: &str, value: &FieldValue) -> Result<(), VrmlError> {
        let slot = self
            .fields
            .get_mut(name)
            .ok_or_else(|| VrmlError::UnknownField {
                type_name: self.ty.name().to_string(),
                field: name.to_string(),
            })?;
        slot.assign(value)?;
        Ok(())
    }

    /// Node ids referenced by every SFNode/MFNode field, in field order.
    pub fn child_ids(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for value in self.fields.values() {
            out.extend_from_slice(value.node_refs());
        }
        out
    }

    // ---- eventOuts ----

    pub fn event_out_value(&self, name: &str) -> Option<&FieldValue> {
        self.event_outs.get(name)
    }

    pub fn record_event_out(&mut self, name: &str, value: FieldValue) {
        self.event_outs.insert(name.to_string(), value);
    }

    // ---- routes ----

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Install a route if an identical one is not already present.
    pub fn add_route(&mut self, route: Route) {
        if !self.routes.contains(&route) {
            self.routes.push(route);
        }
    }

    pub fn remove_route(&mut self, route: &Route) {
        self.routes.retain(|r| r != route);
    }

    /// Routes whose source is the given canonical eventOut name.
    pub fn routes_from<'a>(&'a self, from: &'a str) -> impl Iterator<Item = &'a Route> {
        self.routes.iter().filter(move |r| r.from == from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_type::{NodeKind, NodeType};
    use vrml_field::FieldKind;

    fn test_type() -> NodeTypeRef {
        let mut ty = NodeType::new("Probe", NodeKind::Attribute);
        ty.add_field("count", FieldKind::SfInt32, Some(FieldValue::SfInt32(3)))
            .unwrap();
        ty.add_exposed_field("target", FieldKind::SfNode, None).unwrap();
        NodeTypeRef::new(ty)
    }

    #[test]
    fn fields_start_at_declared_defaults() {
        let node = Node::new(NodeId::from_parts(1, 0), test_type());
        assert_eq!(node.field("count"), Some(&FieldValue::SfInt32(3)));
        assert_eq!(node.field("target"), Some(&FieldValue::SfNode(None)));
        assert!(node.field("missing").is_none());
    }

    #[test]
    fn store_field_rejects_wrong_tag() {
        let mut node = Node::new(NodeId::from_parts(1, 0), test_type());
        let err = node
            .store_field("count", &FieldValue::SfFloat(1.0))
            .unwrap_err();
        assert!(matches!(err, VrmlError::TypeMismatch(_)));
        assert_eq!(node.field("count"), Some(&FieldValue::SfInt32(3)));
    }

    #[test]
    fn child_ids_follow_node_fields() {
        let mut node = Node::new(NodeId::from_parts(1, 0), test_type());
        let child = NodeId::from_parts(2, 0);
        node.store_field("target", &FieldValue::SfNode(Some(child)))
            .unwrap();
        assert_eq!(node.child_ids(), vec![child]);
    }

    #[test]
    fn duplicate_routes_collapse() {
        let mut node = Node::new(NodeId::from_parts(1, 0), test_type());
        let route = Route {
            from: "target_changed".into(),
            to_node: NodeId::from_parts(2, 0),
            to_event_in: "set_target".into(),
        };
        node.add_route(route.clone());
        node.add_route(route.clone());
        assert_eq!(node.routes().len(), 1);
        node.remove_route(&route);
        assert!(node.routes().is_empty());
    }
}
