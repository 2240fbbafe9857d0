use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use vrml_field::{FieldKind, FieldValue};
use vrml_ids::NodeId;

use crate::bindable::BindableKind;
use crate::error::VrmlError;

/// Interface categories of a node type declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceCategory {
    Field,
    ExposedField,
    EventIn,
    EventOut,
}

/// One declared interface: category, value tag, optional declared default.
#[derive(Clone, Debug)]
pub struct Interface {
    pub category: InterfaceCategory,
    pub kind: FieldKind,
    pub default: Option<FieldValue>,
}

/// Built-in geometry shapes the bounding-volume pass knows how to measure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryKind {
    Box,
    Sphere,
    Cone,
    Cylinder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpolatorKind {
    Scalar,
    Color,
    Position,
    Orientation,
    Coordinate,
}

/// Closed capability tag for a node type. Type-specific behavior dispatches
/// on this instead of a downcast ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Group, Transform, Switch: nodes with an MFNode `children` field.
    Grouping,
    Shape,
    Geometry(GeometryKind),
    /// Appearance, Material, Coordinate, Color, Normal: pure field holders.
    Attribute,
    Light,
    Bindable(BindableKind),
    Interpolator(InterpolatorKind),
    Info,
    /// Instance of a user-defined PROTO/EXTERNPROTO.
    Proto,
}

impl NodeKind {
    /// Whether writing `field` can move this node's bounding volume.
    /// Conservative: true unless the kind has no spatial extent at all.
    pub fn field_affects_geometry(self, _field: &str) -> bool {
        !matches!(
            self,
            NodeKind::Interpolator(_) | NodeKind::Bindable(_) | NodeKind::Info | NodeKind::Light
        )
    }
}

/// IS-map entry: an implementation node and the interface on it that a
/// PROTO interface forwards to.
#[derive(Clone, Debug)]
pub struct IsTarget {
    pub node: NodeId,
    pub interface: String,
}

/// The implementation half of a PROTO descriptor: the template subgraph
/// (nodes owned by the defining scene's arena) and the IS forwarding map,
/// keyed by interface name.
#[derive(Debug, Default)]
pub struct ProtoImpl {
    pub roots: Vec<NodeId>,
    pub is_map: FxHashMap<String, Vec<IsTarget>>,
}

/// PROTO/EXTERNPROTO payload of a descriptor. An EXTERNPROTO starts with
/// candidate URLs and no implementation; `resolve` fills it in later.
/// An unresolved descriptor is usable for structural validation only.
#[derive(Debug, Default)]
pub struct ProtoData {
    pub urls: Vec<String>,
    implementation: OnceLock<ProtoImpl>,
}

impl ProtoData {
    pub fn implementation(&self) -> Option<&ProtoImpl> {
        self.implementation.get()
    }

    /// Attach the implementation. First resolution wins; repeats are no-ops.
    pub fn resolve(&self, implementation: ProtoImpl) {
        let _ = self.implementation.set(implementation);
    }
}

/// A node "class": its name, capability kind, and ordered interface table.
/// PROTO descriptors additionally carry their implementation subgraph.
///
/// An exposed field `x` implicitly contributes a `set_x` eventIn and an
/// `x_changed` eventOut with the same tag; those synthesized names count
/// for duplicate detection and for event lookup.
#[derive(Debug)]
pub struct NodeType {
    name: String,
    kind: NodeKind,
    interfaces: IndexMap<String, Interface>,
    proto: Option<ProtoData>,
}

impl NodeType {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            interfaces: IndexMap::new(),
            proto: None,
        }
    }

    pub fn new_proto(name: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Proto,
            interfaces: IndexMap::new(),
            proto: Some(ProtoData {
                urls,
                ..ProtoData::default()
            }),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn proto(&self) -> Option<&ProtoData> {
        self.proto.as_ref()
    }

    pub fn interfaces(&self) -> impl Iterator<Item = (&str, &Interface)> {
        self.interfaces.iter().map(|(n, i)| (n.as_str(), i))
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }

    // ---- declaration ----

    pub fn add_field(
        &mut self,
        name: &str,
        kind: FieldKind,
        default: Option<FieldValue>,
    ) -> Result<(), VrmlError> {
        self.declare(name, InterfaceCategory::Field, kind, default)
    }

    pub fn add_exposed_field(
        &mut self,
        name: &str,
        kind: FieldKind,
        default: Option<FieldValue>,
    ) -> Result<(), VrmlError> {
        // The synthesized pair must be free as well.
        if self.is_taken(&format!("set_{name}")) || self.is_taken(&format!("{name}_changed")) {
            return Err(self.duplicate(name));
        }
        self.declare(name, InterfaceCategory::ExposedField, kind, default)
    }

    pub fn add_event_in(&mut self, name: &str, kind: FieldKind) -> Result<(), VrmlError> {
        self.declare(name, InterfaceCategory::EventIn, kind, None)
    }

    pub fn add_event_out(&mut self, name: &str, kind: FieldKind) -> Result<(), VrmlError> {
        self.declare(name, InterfaceCategory::EventOut, kind, None)
    }

    fn declare(
        &mut self,
        name: &str,
        category: InterfaceCategory,
        kind: FieldKind,
        default: Option<FieldValue>,
    ) -> Result<(), VrmlError> {
        if self.is_taken(name) {
            return Err(self.duplicate(name));
        }
        self.interfaces.insert(
            name.to_string(),
            Interface {
                category,
                kind,
                default,
            },
        );
        Ok(())
    }

    /// True if `name` collides with a declared interface or with a name
    /// synthesized by an exposed field (`set_x`, `x_changed`).
    fn is_taken(&self, name: &str) -> bool {
        if self.interfaces.contains_key(name) {
            return true;
        }
        if let Some(base) = name.strip_prefix("set_") {
            if self.exposed(base) {
                return true;
            }
        }
        if let Some(base) = name.strip_suffix("_changed") {
            if self.exposed(base) {
                return true;
            }
        }
        false
    }

    fn duplicate(&self, name: &str) -> VrmlError {
        VrmlError::DuplicateInterface {
            type_name: self.name.clone(),
            interface: name.to_string(),
        }
    }

    // ---- lookup ----

    fn exposed(&self, name: &str) -> bool {
        matches!(
            self.interfaces.get(name),
            Some(Interface {
                category: InterfaceCategory::ExposedField,
                ..
            })
        )
    }

    pub fn has_exposed_field(&self, name: &str) -> bool {
        self.exposed(name)
    }

    /// Tag of a stored field (field or exposedField).
    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        match self.interfaces.get(name) {
            Some(i)
                if matches!(
                    i.category,
                    InterfaceCategory::Field | InterfaceCategory::ExposedField
                ) =>
            {
                Some(i.kind)
            }
            _ => None,
        }
    }

    /// Tag of an eventIn. Accepts the declared name, `set_x` for an exposed
    /// field `x`, and the bare exposed name.
    pub fn event_in_kind(&self, name: &str) -> Option<FieldKind> {
        if let Some(i) = self.interfaces.get(name) {
            match i.category {
                InterfaceCategory::EventIn | InterfaceCategory::ExposedField => {
                    return Some(i.kind);
                }
                _ => {}
            }
        }
        let base = name.strip_prefix("set_").unwrap_or(name);
        self.interfaces.get(base).and_then(|i| {
            (i.category == InterfaceCategory::ExposedField).then_some(i.kind)
        })
    }

    /// Tag of an eventOut. Accepts the declared name, `x_changed` for an
    /// exposed field `x`, and the bare exposed name.
    pub fn event_out_kind(&self, name: &str) -> Option<FieldKind> {
        if let Some(i) = self.interfaces.get(name) {
            match i.category {
                InterfaceCategory::EventOut | InterfaceCategory::ExposedField => {
                    return Some(i.kind);
                }
                _ => {}
            }
        }
        let base = name.strip_suffix("_changed").unwrap_or(name);
        self.interfaces.get(base).and_then(|i| {
            (i.category == InterfaceCategory::ExposedField).then_some(i.kind)
        })
    }

    /// Canonical emitted name of an eventOut: `x_changed` for exposed `x`,
    /// the declared name otherwise.
    pub fn canonical_event_out(&self, name: &str) -> Option<(String, FieldKind)> {
        if let Some(i) = self.interfaces.get(name) {
            match i.category {
                InterfaceCategory::EventOut => return Some((name.to_string(), i.kind)),
                InterfaceCategory::ExposedField => {
                    return Some((format!("{name}_changed"), i.kind));
                }
                _ => {}
            }
        }
        let base = name.strip_suffix("_changed").unwrap_or(name);
        if self.exposed(base) {
            let kind = self.interfaces[base].kind;
            return Some((format!("{base}_changed"), kind));
        }
        None
    }

    /// Canonical delivery name of an eventIn: `set_x` for exposed `x`, the
    /// declared name otherwise.
    pub fn canonical_event_in(&self, name: &str) -> Option<(String, FieldKind)> {
        if let Some(i) = self.interfaces.get(name) {
            match i.category {
                InterfaceCategory::EventIn => return Some((name.to_string(), i.kind)),
                InterfaceCategory::ExposedField => return Some((format!("set_{name}"), i.kind)),
                _ => {}
            }
        }
        let base = name.strip_prefix("set_").unwrap_or(name);
        if self.exposed(base) {
            let kind = self.interfaces[base].kind;
            return Some((format!("set_{base}"), kind));
        }
        None
    }

    /// Declared default for a stored field, falling back to the tag default.
    pub fn field_default(&self, name: &str) -> Option<FieldValue> {
        let i = self.interfaces.get(name)?;
        match i.category {
            InterfaceCategory::Field | InterfaceCategory::ExposedField => Some(
                i.default
                    .clone()
                    .unwrap_or_else(|| FieldValue::default_for(i.kind)),
            ),
            _ => None,
        }
    }

    /// Names of all stored fields (fields and exposed fields), declaration
    /// order.
    pub fn stored_field_names(&self) -> impl Iterator<Item = &str> {
        self.interfaces.iter().filter_map(|(n, i)| {
            matches!(
                i.category,
                InterfaceCategory::Field | InterfaceCategory::ExposedField
            )
            .then_some(n.as_str())
        })
    }
}

/// Shared handle to a frozen descriptor.
pub type NodeTypeRef = Arc<NodeType>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_interface_is_rejected_and_table_unchanged() {
        let mut ty = NodeType::new("Test", NodeKind::Attribute);
        ty.add_field("size", FieldKind::SfFloat, None).unwrap();
        let err = ty.add_event_in("size", FieldKind::SfFloat).unwrap_err();
        assert!(matches!(err, VrmlError::DuplicateInterface { .. }));
        assert_eq!(ty.interfaces().count(), 1);
        assert_eq!(
            ty.interface("size").map(|i| i.category),
            Some(InterfaceCategory::Field)
        );
    }

    #[test]
    fn exposed_field_reserves_synthesized_names() {
        let mut ty = NodeType::new("Test", NodeKind::Attribute);
        ty.add_exposed_field("on", FieldKind::SfBool, None).unwrap();
        assert!(ty.add_event_in("set_on", FieldKind::SfBool).is_err());
        assert!(ty.add_event_out("on_changed", FieldKind::SfBool).is_err());

        // And the other direction.
        let mut ty = NodeType::new("Test", NodeKind::Attribute);
        ty.add_event_in("set_on", FieldKind::SfBool).unwrap();
        assert!(ty.add_exposed_field("on", FieldKind::SfBool, None).is_err());
    }

    #[test]
    fn event_lookup_accepts_synthesized_spellings() {
        let mut ty = NodeType::new("Test", NodeKind::Attribute);
        ty.add_exposed_field("on", FieldKind::SfBool, None).unwrap();
        ty.add_event_in("set_fraction", FieldKind::SfFloat).unwrap();

        assert_eq!(ty.event_in_kind("set_on"), Some(FieldKind::SfBool));
        assert_eq!(ty.event_in_kind("on"), Some(FieldKind::SfBool));
        assert_eq!(ty.event_out_kind("on_changed"), Some(FieldKind::SfBool));
        assert_eq!(ty.event_in_kind("set_fraction"), Some(FieldKind::SfFloat));
        assert_eq!(ty.event_in_kind("fraction"), None);
        assert_eq!(ty.event_out_kind("set_on"), None);

        assert_eq!(
            ty.canonical_event_out("on"),
            Some(("on_changed".to_string(), FieldKind::SfBool))
        );
        assert_eq!(
            ty.canonical_event_in("on_changed"),
            None,
            "an eventOut spelling is not an eventIn"
        );
    }

    #[test]
    fn field_default_falls_back_to_tag_default() {
        let mut ty = NodeType::new("Test", NodeKind::Attribute);
        ty.add_field("a", FieldKind::SfInt32, Some(FieldValue::SfInt32(7)))
            .unwrap();
        ty.add_field("b", FieldKind::SfInt32, None).unwrap();
        assert_eq!(ty.field_default("a"), Some(FieldValue::SfInt32(7)));
        assert_eq!(ty.field_default("b"), Some(FieldValue::SfInt32(0)));
        assert_eq!(ty.field_default("missing"), None);
    }
}
