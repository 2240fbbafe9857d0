//! PROTO instantiation: every instance gets a private, freshly-addressed
//! copy of the descriptor's implementation subgraph, plus a dispatch table
//! built from the IS map so events and field writes on the instance reach
//! the copied nodes.

use rustc_hash::{FxHashMap, FxHashSet};
use vrml_field::FieldValue;
use vrml_ids::NodeId;

use crate::error::VrmlError;
use crate::node::{ProtoInstance, Route};
use crate::node_type::{IsTarget, NodeTypeRef};
use crate::scene::Scene;

/// Build an instance of the PROTO type `ty`, applying `initializers` to the
/// instance's fields (and, through the IS map, to the implementation).
/// Fails on an EXTERNPROTO whose implementation was never resolved.
pub(crate) fn instantiate(
    scene: &mut Scene,
    ty: NodeTypeRef,
    initializers: &[(String, FieldValue)],
) -> Result<NodeId, VrmlError> {
    instantiate_inner(scene, ty, initializers, true)
}

pub(crate) fn instantiate_inner(
    scene: &mut Scene,
    ty: NodeTypeRef,
    initializers: &[(String, FieldValue)],
    live: bool,
) -> Result<NodeId, VrmlError> {
    let unresolved = || VrmlError::ExternprotoUnresolved {
        type_name: ty.name().to_string(),
    };
    let data = ty.proto().ok_or_else(unresolved)?;
    let implementation = data.implementation().ok_or_else(unresolved)?;
    let template_roots = implementation.roots.clone();
    let is_map: Vec<(String, Vec<IsTarget>)> = implementation
        .is_map
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    // Copy the template subgraph with fresh ids.
    let order = reachable(scene, &template_roots);
    let mut map: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    for &old in &order {
        let Some(node) = scene.node(old) else { continue };
        let node_ty = node.node_type().clone();
        let new = scene.create_typed(node_ty, live);
        map.insert(old, new);
    }
    for &old in &order {
        copy_node(scene, old, &map);
    }

    // The instance node itself, wired to the copied implementation.
    let proto_id = scene.create_typed(ty.clone(), live);
    let dispatch = is_map
        .into_iter()
        .map(|(interface, targets)| {
            let targets = targets
                .into_iter()
                .map(|t| IsTarget {
                    node: map.get(&t.node).copied().unwrap_or(t.node),
                    interface: t.interface,
                })
                .collect();
            (interface, targets)
        })
        .collect();
    let impl_roots = template_roots
        .iter()
        .map(|r| map.get(r).copied().unwrap_or(*r))
        .collect();
    if let Some(node) = scene.node_mut(proto_id) {
        node.proto = Some(Box::new(ProtoInstance {
            impl_roots,
            dispatch,
        }));
    }

    for (name, value) in initializers {
        scene.set_field(proto_id, name, value)?;
    }
    Ok(proto_id)
}

/// Template nodes reachable from the roots through node fields, routes and
/// nested instance implementations, in discovery order.
fn reachable(scene: &Scene, roots: &[NodeId]) -> Vec<NodeId> {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut order = Vec::new();
    let mut pending: Vec<NodeId> = roots.to_vec();
    while let Some(id) = pending.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(node) = scene.node(id) else { continue };
        order.push(id);
        pending.extend(node.child_ids());
        pending.extend(node.routes().iter().map(|r| r.to_node));
        if let Some(instance) = node.proto.as_ref() {
            pending.extend_from_slice(&instance.impl_roots);
        }
    }
    order
}

/// Transfer fields, routes and nested instance state from a template node
/// onto its copy, rewriting every node reference through `map`.
fn copy_node(scene: &mut Scene, old: NodeId, map: &FxHashMap<NodeId, NodeId>) {
    let Some(&new) = map.get(&old) else { return };
    let Some(node) = scene.node(old) else { return };

    let fields: Vec<(String, FieldValue)> = node
        .fields()
        .map(|(n, v)| (n.to_string(), remap_value(v, map)))
        .collect();
    let routes: Vec<Route> = node
        .routes()
        .iter()
        .map(|r| Route {
            from: r.from.clone(),
            to_node: map.get(&r.to_node).copied().unwrap_or(r.to_node),
            to_event_in: r.to_event_in.clone(),
        })
        .collect();
    let instance = node.proto.as_ref().map(|p| ProtoInstance {
        impl_roots: p
            .impl_roots
            .iter()
            .map(|r| map.get(r).copied().unwrap_or(*r))
            .collect(),
        dispatch: p
            .dispatch
            .iter()
            .map(|(k, targets)| {
                let targets = targets
                    .iter()
                    .map(|t| IsTarget {
                        node: map.get(&t.node).copied().unwrap_or(t.node),
                        interface: t.interface.clone(),
                    })
                    .collect();
                (k.clone(), targets)
            })
            .collect(),
    });

    let Some(copy) = scene.node_mut(new) else { return };
    for (name, value) in fields {
        // Same type, same tags: cannot fail.
        let _ = copy.store_field(&name, &value);
    }
    for route in routes {
        copy.add_route(route);
    }
    if let Some(instance) = instance {
        copy.proto = Some(Box::new(instance));
    }
}

fn remap_value(value: &FieldValue, map: &FxHashMap<NodeId, NodeId>) -> FieldValue {
    match value {
        FieldValue::SfNode(Some(id)) => {
            FieldValue::SfNode(Some(map.get(id).copied().unwrap_or(*id)))
        }
        FieldValue::MfNode(ids) => {
            let remapped: Vec<NodeId> = ids
                .iter()
                .map(|id| map.get(id).copied().unwrap_or(*id))
                .collect();
            FieldValue::mf_node(&remapped)
        }
        other => other.clone(),
    }
}
