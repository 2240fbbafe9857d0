//! The declarative statement model: the parsed form of a world, and the
//! driver that turns a statement list into a live graph. Errors are
//! per-statement: a bad statement is logged and skipped, the rest of the
//! world still loads.

use log::error;
use rustc_hash::FxHashMap;
use vrml_field::{FieldKind, FieldValue, TypeMismatch};
use vrml_ids::NodeId;

use crate::error::VrmlError;
use crate::node_type::{
    InterfaceCategory, IsTarget, NodeType, NodeTypeRef, ProtoImpl,
};
use crate::proto;
use crate::scene::Scene;

#[derive(Clone, Debug)]
pub enum Statement {
    Node(NodeStatement),
    Proto(ProtoStatement),
    ExternProto(ExternProtoStatement),
    Route(RouteStatement),
}

#[derive(Clone, Debug)]
pub struct NodeStatement {
    /// DEF name, if any.
    pub def: Option<String>,
    pub body: NodeBody,
}

#[derive(Clone, Debug)]
pub enum NodeBody {
    Type {
        type_name: String,
        initializers: Vec<(String, InitValue)>,
    },
    /// USE of a previously DEF'd node: a shared reference, not a copy.
    Use { name: String },
}

#[derive(Clone, Debug)]
pub enum InitValue {
    Value(FieldValue),
    Node(Box<NodeStatement>),
    Nodes(Vec<NodeStatement>),
    /// IS connection to an enclosing PROTO interface.
    Is(String),
}

#[derive(Clone, Debug)]
pub struct InterfaceDecl {
    pub category: InterfaceCategory,
    pub name: String,
    pub kind: FieldKind,
    pub default: Option<FieldValue>,
}

#[derive(Clone, Debug)]
pub struct ProtoStatement {
    pub name: String,
    pub interfaces: Vec<InterfaceDecl>,
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug)]
pub struct ExternProtoStatement {
    pub name: String,
    pub interfaces: Vec<InterfaceDecl>,
    pub urls: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct RouteStatement {
    pub from_node: String,
    pub from_field: String,
    pub to_node: String,
    pub to_field: String,
}

impl Scene {
    /// Execute a statement list against this scene. Top-level nodes become
    /// roots. Returns the errors encountered; an empty vec means a clean
    /// load.
    pub fn load(&mut self, statements: &[Statement]) -> Vec<VrmlError> {
        let mut loader = Loader::new();
        let mut errors = Vec::new();
        for statement in statements {
            if let Err(e) = loader.exec(self, statement) {
                error!("skipping statement: {e}");
                errors.push(e);
            }
        }
        errors
    }
}

/// In-definition state for one PROTO body.
struct ProtoCtx {
    ty: NodeTypeRef,
    is_map: FxHashMap<String, Vec<IsTarget>>,
}

struct Loader {
    /// DEF scopes, innermost last. A PROTO body opens a fresh scope.
    scopes: Vec<FxHashMap<String, NodeId>>,
    protos: Vec<ProtoCtx>,
}

impl Loader {
    fn new() -> Self {
        Self {
            scopes: vec![FxHashMap::default()],
            protos: Vec::new(),
        }
    }

    fn exec(&mut self, scene: &mut Scene, statement: &Statement) -> Result<(), VrmlError> {
        match statement {
            Statement::Node(ns) => {
                let id = self.realize_node(scene, ns)?;
                if self.protos.is_empty() {
                    scene.add_root(id);
                }
                Ok(())
            }
            Statement::Proto(ps) => self.define_proto(scene, ps),
            Statement::ExternProto(es) => {
                let mut ty = NodeType::new_proto(&es.name, es.urls.clone());
                declare_interfaces(&mut ty, &es.interfaces)?;
                scene.registry_mut().register(ty);
                Ok(())
            }
            Statement::Route(rs) => {
                let from = self.resolve(&rs.from_node)?;
                let to = self.resolve(&rs.to_node)?;
                scene.add_route(from, &rs.from_field, to, &rs.to_field)
            }
        }
    }

    fn resolve(&self, name: &str) -> Result<NodeId, VrmlError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .ok_or_else(|| VrmlError::UnknownNode {
                name: name.to_string(),
            })
    }

    fn realize_node(
        &mut self,
        scene: &mut Scene,
        statement: &NodeStatement,
    ) -> Result<NodeId, VrmlError> {
        let (type_name, initializers) = match &statement.body {
            NodeBody::Use { name } => return self.resolve(name),
            NodeBody::Type {
                type_name,
                initializers,
            } => (type_name, initializers),
        };

        let ty = scene.registry().lookup(type_name)?;
        let live = self.protos.is_empty();

        // Realize plain values and nested nodes first; IS connections need
        // the instance id and are applied after.
        let mut values: Vec<(String, FieldValue)> = Vec::new();
        let mut is_inits: Vec<(String, String)> = Vec::new();
        for (field, init) in initializers {
            match init {
                InitValue::Value(v) => values.push((field.clone(), v.clone())),
                InitValue::Node(child) => {
                    let child_id = self.realize_node(scene, child)?;
                    values.push((field.clone(), FieldValue::SfNode(Some(child_id))));
                }
                InitValue::Nodes(children) => {
                    let ids = children
                        .iter()
                        .map(|c| self.realize_node(scene, c))
                        .collect::<Result<Vec<_>, _>>()?;
                    values.push((field.clone(), FieldValue::mf_node(&ids)));
                }
                InitValue::Is(interface) => {
                    is_inits.push((field.clone(), interface.clone()));
                }
            }
        }

        let id = if ty.proto().is_some() {
            proto::instantiate_inner(scene, ty.clone(), &values, live)?
        } else {
            let id = scene.create_typed(ty.clone(), live);
            for (field, value) in &values {
                scene.set_field(id, field, value)?;
            }
            id
        };

        if let Some(def) = &statement.def {
            if self.scopes.len() == 1 {
                scene.bind_name(def, id);
            } else if let Some(node) = scene.node_mut(id) {
                node.set_name(def);
            }
            if let Some(scope) = self.scopes.last_mut() {
                scope.insert(def.clone(), id);
            }
        }

        for (field, interface) in is_inits {
            self.connect_is(id, &ty, &field, &interface)?;
        }
        Ok(id)
    }

    /// Record `field IS interface` into the enclosing PROTO's map, after
    /// checking both ends carry the same tag.
    fn connect_is(
        &mut self,
        node: NodeId,
        node_ty: &NodeTypeRef,
        field: &str,
        interface: &str,
    ) -> Result<(), VrmlError> {
        let ctx = self.protos.last_mut().ok_or_else(|| VrmlError::StrayIs {
            interface: interface.to_string(),
        })?;

        let proto_kind = interface_kind(&ctx.ty, interface).ok_or_else(|| {
            VrmlError::UnknownInterface {
                type_name: ctx.ty.name().to_string(),
                interface: interface.to_string(),
            }
        })?;
        let target_kind =
            interface_kind(node_ty, field).ok_or_else(|| VrmlError::UnknownInterface {
                type_name: node_ty.name().to_string(),
                interface: field.to_string(),
            })?;
        if proto_kind != target_kind {
            return Err(VrmlError::TypeMismatch(TypeMismatch {
                expected: target_kind,
                found: proto_kind,
            }));
        }
        ctx.is_map
            .entry(interface.to_string())
            .or_default()
            .push(IsTarget {
                node,
                interface: field.to_string(),
            });
        Ok(())
    }

    fn define_proto(
        &mut self,
        scene: &mut Scene,
        statement: &ProtoStatement,
    ) -> Result<(), VrmlError> {
        let mut ty = NodeType::new_proto(&statement.name, Vec::new());
        declare_interfaces(&mut ty, &statement.interfaces)?;
        let ty = NodeTypeRef::new(ty);

        self.scopes.push(FxHashMap::default());
        self.protos.push(ProtoCtx {
            ty: ty.clone(),
            is_map: FxHashMap::default(),
        });

        let mut roots = Vec::new();
        let mut result = Ok(());
        for inner in &statement.body {
            let outcome = match inner {
                Statement::Node(ns) => self.realize_node(scene, ns).map(|id| roots.push(id)),
                other => self.exec(scene, other),
            };
            if let Err(e) = outcome {
                result = Err(e);
                break;
            }
        }

        let ctx = match self.protos.pop() {
            Some(ctx) => ctx,
            None => return result,
        };
        self.scopes.pop();
        result?;

        if let Some(data) = ty.proto() {
            data.resolve(ProtoImpl {
                roots,
                is_map: ctx.is_map,
            });
        }
        scene.registry_mut().register_shared(ty);
        Ok(())
    }
}

fn declare_interfaces(ty: &mut NodeType, decls: &[InterfaceDecl]) -> Result<(), VrmlError> {
    for decl in decls {
        match decl.category {
            InterfaceCategory::Field => ty.add_field(&decl.name, decl.kind, decl.default.clone())?,
            InterfaceCategory::ExposedField => {
                ty.add_exposed_field(&decl.name, decl.kind, decl.default.clone())?
            }
            InterfaceCategory::EventIn => ty.add_event_in(&decl.name, decl.kind)?,
            InterfaceCategory::EventOut => ty.add_event_out(&decl.name, decl.kind)?,
        }
    }
    Ok(())
}

/// Tag of any interface, whatever its category.
fn interface_kind(ty: &NodeTypeRef, name: &str) -> Option<FieldKind> {
    ty.field_kind(name)
        .or_else(|| ty.event_in_kind(name))
        .or_else(|| ty.event_out_kind(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn ty_node(type_name: &str, initializers: Vec<(&str, InitValue)>) -> NodeStatement {
        NodeStatement {
            def: None,
            body: NodeBody::Type {
                type_name: type_name.to_string(),
                initializers: initializers
                    .into_iter()
                    .map(|(n, v)| (n.to_string(), v))
                    .collect(),
            },
        }
    }

    fn def_node(def: &str, type_name: &str, initializers: Vec<(&str, InitValue)>) -> NodeStatement {
        NodeStatement {
            def: Some(def.to_string()),
            ..ty_node(type_name, initializers)
        }
    }

    fn use_node(name: &str) -> NodeStatement {
        NodeStatement {
            def: None,
            body: NodeBody::Use {
                name: name.to_string(),
            },
        }
    }

    fn route(from: &str, from_field: &str, to: &str, to_field: &str) -> Statement {
        Statement::Route(RouteStatement {
            from_node: from.to_string(),
            from_field: from_field.to_string(),
            to_node: to.to_string(),
            to_field: to_field.to_string(),
        })
    }

    fn exposed(name: &str, kind: FieldKind, default: Option<FieldValue>) -> InterfaceDecl {
        InterfaceDecl {
            category: InterfaceCategory::ExposedField,
            name: name.to_string(),
            kind,
            default,
        }
    }

    #[test]
    fn def_and_use_share_one_node() {
        let mut scene = Scene::new();
        let statements = [
            Statement::Node(def_node("S", "Shape", vec![])),
            Statement::Node(ty_node(
                "Group",
                vec![("children", InitValue::Nodes(vec![use_node("S")]))],
            )),
        ];
        assert!(scene.load(&statements).is_empty());

        let shape = scene.named_node("S").unwrap();
        let group = scene.roots()[1];
        assert_eq!(
            scene.field(group, "children").unwrap(),
            FieldValue::mf_node(&[shape])
        );
        assert_eq!(scene.node(shape).unwrap().name(), Some("S"));
    }

    #[test]
    fn route_statements_resolve_def_names() {
        let mut scene = Scene::new();
        let statements = [
            Statement::Node(def_node("A", "Transform", vec![])),
            Statement::Node(def_node("B", "Transform", vec![])),
            route("A", "translation", "B", "set_translation"),
            route("Nope", "translation", "B", "set_translation"),
        ];
        let errors = scene.load(&statements);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], VrmlError::UnknownNode { .. }));

        let a = scene.named_node("A").unwrap();
        let b = scene.named_node("B").unwrap();
        let value = FieldValue::SfVec3f(Vec3::X);
        scene.send_event(a, "set_translation", value.clone(), 0.0).unwrap();
        scene.update();
        assert_eq!(scene.field(b, "translation").unwrap(), value);
    }

    #[test]
    fn proto_instance_forwards_through_the_is_map() {
        let mut scene = Scene::new();
        let statements = [
            Statement::Proto(ProtoStatement {
                name: "Blinker".to_string(),
                interfaces: vec![exposed(
                    "on",
                    FieldKind::SfBool,
                    Some(FieldValue::SfBool(true)),
                )],
                body: vec![Statement::Node(ty_node(
                    "DirectionalLight",
                    vec![("on", InitValue::Is("on".to_string()))],
                ))],
            }),
            Statement::Node(def_node("BL", "Blinker", vec![])),
        ];
        assert!(scene.load(&statements).is_empty());

        let instance = scene.named_node("BL").unwrap();
        let light = scene.node(instance).unwrap().proto.as_ref().unwrap().impl_roots[0];
        assert_eq!(
            scene.field(light, "on").unwrap(),
            FieldValue::SfBool(true)
        );

        scene
            .send_event(instance, "set_on", FieldValue::SfBool(false), 1.0)
            .unwrap();
        assert_eq!(scene.field(instance, "on").unwrap(), FieldValue::SfBool(false));
        assert_eq!(scene.field(light, "on").unwrap(), FieldValue::SfBool(false));
        assert_eq!(
            scene.event_out(instance, "on_changed"),
            Some(FieldValue::SfBool(false))
        );
    }

    #[test]
    fn routed_event_reaches_a_proto_instance() {
        let mut scene = Scene::new();
        let statements = [
            Statement::Proto(ProtoStatement {
                name: "Blinker".to_string(),
                interfaces: vec![exposed(
                    "on",
                    FieldKind::SfBool,
                    Some(FieldValue::SfBool(true)),
                )],
                body: vec![Statement::Node(ty_node(
                    "DirectionalLight",
                    vec![("on", InitValue::Is("on".to_string()))],
                ))],
            }),
            Statement::Node(def_node("BL", "Blinker", vec![])),
            Statement::Node(def_node("SRC", "PointLight", vec![])),
            route("SRC", "on_changed", "BL", "set_on"),
        ];
        assert!(scene.load(&statements).is_empty());

        let instance = scene.named_node("BL").unwrap();
        let light = scene.node(instance).unwrap().proto.as_ref().unwrap().impl_roots[0];
        let src = scene.named_node("SRC").unwrap();

        // The hop into the instance goes through the queue and the IS
        // dispatch, not a direct delivery.
        scene
            .send_event_out(src, "on", FieldValue::SfBool(false), 1.0)
            .unwrap();
        assert_eq!(scene.pending_events(), 1);
        assert!(scene.update());

        assert_eq!(scene.field(light, "on").unwrap(), FieldValue::SfBool(false));
        assert_eq!(
            scene.event_out(instance, "on_changed"),
            Some(FieldValue::SfBool(false))
        );
    }

    #[test]
    fn proto_instances_are_independent() {
        let mut scene = Scene::new();
        let statements = [
            Statement::Proto(ProtoStatement {
                name: "Placed".to_string(),
                interfaces: vec![exposed("pos", FieldKind::SfVec3f, None)],
                body: vec![Statement::Node(ty_node(
                    "Transform",
                    vec![("translation", InitValue::Is("pos".to_string()))],
                ))],
            }),
            Statement::Node(def_node(
                "P1",
                "Placed",
                vec![("pos", InitValue::Value(FieldValue::SfVec3f(Vec3::X)))],
            )),
            Statement::Node(def_node(
                "P2",
                "Placed",
                vec![("pos", InitValue::Value(FieldValue::SfVec3f(Vec3::Y)))],
            )),
        ];
        assert!(scene.load(&statements).is_empty());

        let impl_of = |scene: &Scene, name: &str| {
            let id = scene.named_node(name).unwrap();
            scene.node(id).unwrap().proto.as_ref().unwrap().impl_roots[0]
        };
        let t1 = impl_of(&scene, "P1");
        let t2 = impl_of(&scene, "P2");
        assert_ne!(t1, t2);
        assert_eq!(
            scene.field(t1, "translation").unwrap(),
            FieldValue::SfVec3f(Vec3::X)
        );
        assert_eq!(
            scene.field(t2, "translation").unwrap(),
            FieldValue::SfVec3f(Vec3::Y)
        );
    }

    #[test]
    fn is_outside_a_proto_body_is_rejected() {
        let mut scene = Scene::new();
        let statements = [Statement::Node(ty_node(
            "Transform",
            vec![("translation", InitValue::Is("pos".to_string()))],
        ))];
        let errors = scene.load(&statements);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], VrmlError::StrayIs { .. }));
    }

    #[test]
    fn unresolved_externproto_cannot_be_instantiated() {
        let mut scene = Scene::new();
        let statements = [
            Statement::ExternProto(ExternProtoStatement {
                name: "Remote".to_string(),
                interfaces: vec![exposed("on", FieldKind::SfBool, None)],
                urls: vec!["http://example.com/remote.wrl".to_string()],
            }),
            Statement::Node(ty_node("Remote", vec![])),
        ];
        let errors = scene.load(&statements);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], VrmlError::ExternprotoUnresolved { .. }));
        assert!(scene.roots().is_empty());
    }

    #[test]
    fn is_tag_mismatch_is_rejected() {
        let mut scene = Scene::new();
        let statements = [Statement::Proto(ProtoStatement {
            name: "Bad".to_string(),
            interfaces: vec![exposed("amount", FieldKind::SfFloat, None)],
            body: vec![Statement::Node(ty_node(
                "Transform",
                vec![("translation", InitValue::Is("amount".to_string()))],
            ))],
        })];
        let errors = scene.load(&statements);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], VrmlError::TypeMismatch(_)));
        assert!(!scene.registry().contains("Bad"));
    }
}
