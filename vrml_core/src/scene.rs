use glam::{Quat, Vec3};
use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use vrml_field::{FieldValue, SfRotation};
use vrml_ids::NodeId;

use crate::bindable::{BindChange, BindStackSet, BindableKind};
use crate::bvolume::BVolume;
use crate::error::VrmlError;
use crate::events::{EventQueue, QueuedEvent, DEFAULT_EVENT_CAPACITY};
use crate::node::{Node, Route};
use crate::node_arena::NodeArena;
use crate::node_type::{GeometryKind, InterpolatorKind, IsTarget, NodeKind, NodeTypeRef};
use crate::registry::TypeRegistry;
use crate::{interpolate, proto};

/// Tunables for a scene. The defaults reproduce the classic runtime limits;
/// `max_cascade` bounds route feedback loops, which would otherwise spin
/// forever.
#[derive(Clone, Copy, Debug)]
pub struct SceneConfig {
    pub event_capacity: usize,
    pub max_cascade: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            max_cascade: 1000,
        }
    }
}

/// The scene: node storage, the type registry, root list, DEF names, the
/// pending event queue and the bindable stacks.
pub struct Scene {
    registry: TypeRegistry,
    arena: NodeArena,
    roots: Vec<NodeId>,
    names: FxHashMap<String, NodeId>,
    queue: EventQueue,
    binds: BindStackSet,
    max_cascade: usize,
    modified: bool,
}

impl Scene {
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    pub fn with_config(config: SceneConfig) -> Self {
        Self {
            registry: TypeRegistry::with_builtins(),
            arena: NodeArena::new(),
            roots: Vec::new(),
            names: FxHashMap::default(),
            queue: EventQueue::with_capacity(config.event_capacity),
            binds: BindStackSet::default(),
            max_cascade: config.max_cascade.max(1),
            modified: false,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.arena.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.arena.get_mut(id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn add_root(&mut self, id: NodeId) {
        if !self.roots.contains(&id) {
            self.roots.push(id);
            self.modified = true;
        }
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// DEF-named node lookup (top-level scope).
    pub fn named_node(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub(crate) fn bind_name(&mut self, name: &str, id: NodeId) {
        if let Some(node) = self.arena.get_mut(id) {
            node.set_name(name);
        }
        self.names.insert(name.to_string(), id);
    }

    // -------------------- lifecycle --------------------

    /// Create a node of the named type with default fields. PROTO types get
    /// a private copy of their implementation subgraph.
    pub fn create_node(&mut self, type_name: &str) -> Result<NodeId, VrmlError> {
        let ty = self.registry.lookup(type_name)?;
        if ty.proto().is_some() {
            proto::instantiate(self, ty, &[])
        } else {
            Ok(self.create_typed(ty, true))
        }
    }

    /// Allocate an instance of `ty`. `live` is false for nodes built as
    /// PROTO template material, which must not touch the bindable stacks.
    pub(crate) fn create_typed(&mut self, ty: NodeTypeRef, live: bool) -> NodeId {
        let kind = ty.kind();
        let id = self.arena.insert_with(|id| Node::new(id, ty));
        if live {
            if let NodeKind::Bindable(which) = kind {
                let first = self.binds.get_mut(which).register(id);
                if first {
                    // The first bindable of a category is bound on arrival.
                    self.binds.get_mut(which).push(id);
                    if let Some(node) = self.arena.get_mut(id) {
                        node.record_event_out("isBound", FieldValue::SfBool(true));
                    }
                }
            }
            self.modified = true;
        }
        id
    }

    /// Remove a node at `timestamp`. Its handle goes stale; references from
    /// other nodes' SFNode/MFNode fields simply stop resolving. A bound
    /// bindable is unbound first, with the usual isBound notifications.
    pub fn remove_node(&mut self, id: NodeId, timestamp: f64) {
        let kind = match self.arena.get(id) {
            Some(node) => node.node_type().kind(),
            None => return,
        };
        if let NodeKind::Bindable(which) = kind {
            let change = self.binds.get_mut(which).remove(id);
            self.binds.get_mut(which).unregister(id);
            self.apply_bind_change(change, timestamp);
        }
        if let Some(node) = self.arena.remove(id) {
            if let Some(name) = node.name() {
                self.names.remove(name);
            }
        }
        self.roots.retain(|&r| r != id);
        self.modified = true;
    }

    // -------------------- fields --------------------

    pub fn field(&self, id: NodeId, name: &str) -> Result<FieldValue, VrmlError> {
        let node = self.arena.get(id).ok_or(VrmlError::StaleNode(id))?;
        node.field(name)
            .cloned()
            .ok_or_else(|| VrmlError::UnknownField {
                type_name: node.node_type().name().to_string(),
                field: name.to_string(),
            })
    }

    /// Write a stored field. Validation happens before any mutation, so a
    /// rejected write leaves the node untouched. On a PROTO instance the
    /// value also forwards through the IS map to the implementation nodes.
    pub fn set_field(&mut self, id: NodeId, name: &str, value: &FieldValue) -> Result<(), VrmlError> {
        let node = self.arena.get(id).ok_or(VrmlError::StaleNode(id))?;
        let kind = node.node_type().kind();
        let targets: Vec<IsTarget> = node
            .proto
            .as_ref()
            .and_then(|p| p.dispatch.get(name))
            .cloned()
            .unwrap_or_default();

        let node = match self.arena.get_mut(id) {
            Some(node) => node,
            None => return Err(VrmlError::StaleNode(id)),
        };
        node.store_field(name, value)?;
        node.modified = true;
        if kind.field_affects_geometry(name) {
            node.bvolume_dirty = true;
        }
        self.modified = true;

        for target in targets {
            self.set_field(target.node, &target.interface, value)?;
        }
        Ok(())
    }

    // -------------------- events --------------------

    /// Deliver an event to a node's eventIn right now, bypassing the queue.
    /// This is the entry point for embedder-generated events (sensors, UI).
    pub fn send_event(
        &mut self,
        id: NodeId,
        event_in: &str,
        value: FieldValue,
        timestamp: f64,
    ) -> Result<(), VrmlError> {
        let node = self.arena.get(id).ok_or(VrmlError::StaleNode(id))?;
        let ty = node.node_type().clone();
        let kind = ty.event_in_kind(event_in).ok_or_else(|| VrmlError::UnknownInterface {
            type_name: ty.name().to_string(),
            interface: event_in.to_string(),
        })?;
        if value.kind() != kind {
            return Err(VrmlError::TypeMismatch(vrml_field::TypeMismatch {
                expected: kind,
                found: value.kind(),
            }));
        }
        self.deliver(QueuedEvent {
            timestamp,
            to_node: id,
            to_event_in: event_in.to_string(),
            value,
        });
        Ok(())
    }

    /// Append an event to the pending queue; it is delivered by the next
    /// `update`. The endpoint is checked at delivery, not here.
    pub fn queue_event(&mut self, timestamp: f64, id: NodeId, event_in: &str, value: FieldValue) {
        self.queue.push(QueuedEvent {
            timestamp,
            to_node: id,
            to_event_in: event_in.to_string(),
            value,
        });
    }

    /// Emit an eventOut from a node: record the value and fan it out to
    /// every route, all carrying the emission timestamp.
    pub fn send_event_out(
        &mut self,
        id: NodeId,
        event_out: &str,
        value: FieldValue,
        timestamp: f64,
    ) -> Result<(), VrmlError> {
        let node = self.arena.get(id).ok_or(VrmlError::StaleNode(id))?;
        let ty = node.node_type().clone();
        let (canonical, kind) =
            ty.canonical_event_out(event_out)
                .ok_or_else(|| VrmlError::UnknownInterface {
                    type_name: ty.name().to_string(),
                    interface: event_out.to_string(),
                })?;
        if value.kind() != kind {
            return Err(VrmlError::TypeMismatch(vrml_field::TypeMismatch {
                expected: kind,
                found: value.kind(),
            }));
        }
        self.emit(id, &canonical, value, timestamp);
        Ok(())
    }

    /// Last value emitted from an eventOut, if any. On a PROTO instance an
    /// IS-mapped eventOut falls through to the implementation node.
    pub fn event_out(&self, id: NodeId, name: &str) -> Option<FieldValue> {
        let node = self.arena.get(id)?;
        let ty = node.node_type();
        let (canonical, _) = ty.canonical_event_out(name)?;
        if let Some(value) = node.event_out_value(&canonical) {
            return Some(value.clone());
        }
        let instance = node.proto.as_ref()?;
        let key = canonical
            .strip_suffix("_changed")
            .filter(|base| ty.has_exposed_field(base))
            .unwrap_or(&canonical);
        let target = instance.dispatch.get(key)?.first()?;
        self.event_out(target.node, &target.interface)
    }

    /// Drain the pending queue in arrival order. Cascades (deliveries that
    /// enqueue more events) keep being processed at the tail until the
    /// delivery ceiling is hit, at which point the remainder is flushed.
    /// Returns true when anything changed since the last call.
    pub fn update(&mut self) -> bool {
        let mut delivered = 0usize;
        while let Some(event) = self.queue.pop() {
            delivered += 1;
            if delivered > self.max_cascade {
                warn!(
                    "event cascade exceeded {} deliveries, flushing {} pending events",
                    self.max_cascade,
                    self.queue.len() + 1
                );
                self.queue.flush();
                break;
            }
            self.deliver(event);
        }
        std::mem::take(&mut self.modified)
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Record + fan out a canonical eventOut.
    fn emit(&mut self, id: NodeId, canonical: &str, value: FieldValue, timestamp: f64) {
        let Some(node) = self.arena.get_mut(id) else {
            return;
        };
        node.record_event_out(canonical, value.clone());
        node.modified = true;
        self.modified = true;

        let fan_out: Vec<(NodeId, String)> = node
            .routes_from(canonical)
            .map(|r| (r.to_node, r.to_event_in.clone()))
            .collect();
        for (to_node, to_event_in) in fan_out {
            self.queue.push(QueuedEvent {
                timestamp,
                to_node,
                to_event_in,
                value: value.clone(),
            });
        }
    }

    fn deliver(&mut self, event: QueuedEvent) {
        let Some(node) = self.arena.get(event.to_node) else {
            debug!("dropping event to dead node {}", event.to_node);
            return;
        };
        let id = event.to_node;
        let ty = node.node_type().clone();
        let name = event.to_event_in.as_str();

        // PROTO instances route IS-mapped eventIns to their implementation.
        if let Some(instance) = node.proto.as_ref() {
            let base = name.strip_prefix("set_").unwrap_or(name);
            let key = if instance.dispatch.contains_key(name) {
                Some(name)
            } else if instance.dispatch.contains_key(base) {
                Some(base)
            } else {
                None
            };
            if let Some(key) = key {
                let targets = instance.dispatch[key].clone();
                if ty.has_exposed_field(key) {
                    // Keep the instance's own copy in sync and announce it.
                    let field = key.to_string();
                    if let Some(node) = self.arena.get_mut(id) {
                        if let Err(e) = node.store_field(&field, &event.value) {
                            warn!("{}.{}: {e}", ty.name(), field);
                            return;
                        }
                        node.modified = true;
                    }
                    self.modified = true;
                    self.emit(
                        id,
                        &format!("{field}_changed"),
                        event.value.clone(),
                        event.timestamp,
                    );
                }
                for target in targets {
                    self.deliver(QueuedEvent {
                        timestamp: event.timestamp,
                        to_node: target.node,
                        to_event_in: target.interface,
                        value: event.value.clone(),
                    });
                }
                return;
            }
        }

        // Type-specific eventIns.
        match ty.kind() {
            NodeKind::Grouping if name == "addChildren" || name == "removeChildren" => {
                self.group_children_event(id, name, &event);
                return;
            }
            NodeKind::Bindable(which) if name == "set_bind" => {
                if let FieldValue::SfBool(bind) = event.value {
                    self.bind_event(id, which, bind, event.timestamp);
                } else {
                    warn!("set_bind on {} expects SFBool", ty.name());
                }
                return;
            }
            NodeKind::Interpolator(which) if name == "set_fraction" => {
                if let FieldValue::SfFloat(fraction) = event.value {
                    self.interpolator_event(id, which, fraction, event.timestamp);
                } else {
                    warn!("set_fraction on {} expects SFFloat", ty.name());
                }
                return;
            }
            _ => {}
        }

        // The generic exposed-field path: set_x stores x and fires x_changed.
        if let Some((canonical, _)) = ty.canonical_event_in(name) {
            let base = canonical.trim_start_matches("set_");
            if ty.has_exposed_field(base) {
                let base = base.to_string();
                if let Err(e) = self.set_field(id, &base, &event.value) {
                    warn!("{}.{}: {e}", ty.name(), base);
                    return;
                }
                self.emit(id, &format!("{base}_changed"), event.value, event.timestamp);
                return;
            }
            // A declared eventIn with no runtime behavior in this profile.
            debug!("ignoring {}.{}", ty.name(), canonical);
            return;
        }

        warn!("unknown eventIn {}.{}", ty.name(), name);
    }

    fn group_children_event(&mut self, id: NodeId, name: &str, event: &QueuedEvent) {
        let FieldValue::MfNode(delta) = &event.value else {
            warn!("{name} expects MFNode");
            return;
        };
        let Some(node) = self.arena.get(id) else {
            return;
        };
        let Some(FieldValue::MfNode(current)) = node.field("children") else {
            debug!(
                "ignoring {name} on {}: no children field",
                node.node_type().name()
            );
            return;
        };

        let mut next: Vec<NodeId> = current.as_ref().clone();
        if name == "addChildren" {
            for &child in delta.iter() {
                if !next.contains(&child) {
                    next.push(child);
                }
            }
        } else {
            next.retain(|c| !delta.contains(c));
        }
        let value = FieldValue::mf_node(&next);
        if let Err(e) = self.set_field(id, "children", &value) {
            warn!("{name}: {e}");
            return;
        }
        self.emit(id, "children_changed", value, event.timestamp);
    }

    fn bind_event(&mut self, id: NodeId, which: BindableKind, bind: bool, timestamp: f64) {
        let stack = self.binds.get_mut(which);
        let change = if bind { stack.push(id) } else { stack.remove(id) };
        self.apply_bind_change(change, timestamp);
    }

    /// Turn the isBound notifications owed by a stack operation into real
    /// eventOuts, stamped with the time of the operation that caused them.
    fn apply_bind_change(&mut self, change: BindChange, timestamp: f64) {
        if let Some(unbound) = change.unbound {
            self.emit(unbound, "isBound", FieldValue::SfBool(false), timestamp);
        }
        if let Some(bound) = change.bound {
            self.emit(bound, "isBound", FieldValue::SfBool(true), timestamp);
            let has_bind_time = self
                .arena
                .get(bound)
                .is_some_and(|n| n.node_type().event_out_kind("bindTime").is_some());
            if has_bind_time {
                self.emit(bound, "bindTime", FieldValue::SfTime(timestamp), timestamp);
            }
        }
    }

    fn interpolator_event(
        &mut self,
        id: NodeId,
        which: InterpolatorKind,
        fraction: f32,
        timestamp: f64,
    ) {
        let Some(node) = self.arena.get(id) else {
            return;
        };
        let key = match node.field("key") {
            Some(FieldValue::MfFloat(k)) => k.clone(),
            _ => return,
        };
        let key_value = match node.field("keyValue") {
            Some(v) => v.clone(),
            None => return,
        };
        if let Some(out) = interpolate::sample(which, fraction, &key, &key_value) {
            self.emit(id, "value_changed", out, timestamp);
        }
    }

    /// Currently bound node of a bindable category, if any.
    pub fn bound_node(&self, which: BindableKind) -> Option<NodeId> {
        self.binds.get(which).top()
    }

    pub(crate) fn binds_mut(&mut self) -> &mut BindStackSet {
        &mut self.binds
    }

    // -------------------- routes --------------------

    /// Install a route. Names may use any accepted spelling; the stored
    /// route uses canonical names. A route from an IS-mapped eventOut on a
    /// PROTO instance is installed on the implementation nodes, which is
    /// where the events actually originate.
    pub fn add_route(
        &mut self,
        from: NodeId,
        from_name: &str,
        to: NodeId,
        to_name: &str,
    ) -> Result<(), VrmlError> {
        let (canonical_out, canonical_in) =
            self.check_route(from, from_name, to, to_name)?;

        let from_node = self.arena.get(from).ok_or(VrmlError::StaleNode(from))?;
        if let Some(targets) = Self::is_targets_for_out(from_node, &canonical_out) {
            for target in targets {
                self.add_route(target.node, &target.interface, to, &canonical_in)?;
            }
            return Ok(());
        }
        if let Some(node) = self.arena.get_mut(from) {
            node.add_route(Route {
                from: canonical_out,
                to_node: to,
                to_event_in: canonical_in,
            });
        }
        Ok(())
    }

    pub fn delete_route(
        &mut self,
        from: NodeId,
        from_name: &str,
        to: NodeId,
        to_name: &str,
    ) -> Result<(), VrmlError> {
        let (canonical_out, canonical_in) =
            self.check_route(from, from_name, to, to_name)?;

        let from_node = self.arena.get(from).ok_or(VrmlError::StaleNode(from))?;
        if let Some(targets) = Self::is_targets_for_out(from_node, &canonical_out) {
            for target in targets {
                self.delete_route(target.node, &target.interface, to, &canonical_in)?;
            }
            return Ok(());
        }
        if let Some(node) = self.arena.get_mut(from) {
            node.remove_route(&Route {
                from: canonical_out,
                to_node: to,
                to_event_in: canonical_in,
            });
        }
        Ok(())
    }

    /// Validate both endpoints and the tag match; returns canonical names.
    fn check_route(
        &self,
        from: NodeId,
        from_name: &str,
        to: NodeId,
        to_name: &str,
    ) -> Result<(String, String), VrmlError> {
        let from_node = self.arena.get(from).ok_or(VrmlError::StaleNode(from))?;
        let to_node = self.arena.get(to).ok_or(VrmlError::StaleNode(to))?;
        let from_ty = from_node.node_type();
        let to_ty = to_node.node_type();

        let (canonical_out, out_kind) =
            from_ty
                .canonical_event_out(from_name)
                .ok_or_else(|| VrmlError::BadRouteSource {
                    type_name: from_ty.name().to_string(),
                    interface: from_name.to_string(),
                })?;
        let (canonical_in, in_kind) =
            to_ty
                .canonical_event_in(to_name)
                .ok_or_else(|| VrmlError::BadRouteDestination {
                    type_name: to_ty.name().to_string(),
                    interface: to_name.to_string(),
                })?;
        if out_kind != in_kind {
            return Err(VrmlError::RouteTypeMismatch {
                from_interface: canonical_out,
                from_kind: out_kind,
                to_interface: canonical_in,
                to_kind: in_kind,
            });
        }
        Ok((canonical_out, canonical_in))
    }

    fn is_targets_for_out(node: &Node, canonical_out: &str) -> Option<Vec<IsTarget>> {
        let instance = node.proto.as_ref()?;
        let ty = node.node_type();
        let key = canonical_out
            .strip_suffix("_changed")
            .filter(|base| ty.has_exposed_field(base))
            .unwrap_or(canonical_out);
        instance.dispatch.get(key).cloned()
    }

    // -------------------- modified protocol --------------------

    /// Deep modified query: true if the node or anything reachable from its
    /// node fields (and, for PROTO instances, its implementation) has
    /// changed since the flag was last cleared. Re-derived on every call;
    /// shared subtrees answer for every referrer.
    pub fn is_node_modified(&self, id: NodeId) -> bool {
        let mut visited = FxHashSet::default();
        self.modified_rec(id, &mut visited)
    }

    fn modified_rec(&self, id: NodeId, visited: &mut FxHashSet<NodeId>) -> bool {
        if !visited.insert(id) {
            return false;
        }
        let Some(node) = self.arena.get(id) else {
            return false;
        };
        if node.modified {
            return true;
        }
        let mut children = node.child_ids();
        if let Some(instance) = node.proto.as_ref() {
            children.extend_from_slice(&instance.impl_roots);
        }
        children.into_iter().any(|c| self.modified_rec(c, visited))
    }

    /// Clear the modified flag on this node only.
    pub fn clear_node_modified(&mut self, id: NodeId) {
        if let Some(node) = self.arena.get_mut(id) {
            node.modified = false;
        }
    }

    /// Clear the modified flag on the node and its whole subtree.
    pub fn clear_subtree_modified(&mut self, id: NodeId) {
        let mut visited = FxHashSet::default();
        self.clear_modified_rec(id, &mut visited);
    }

    /// Walk the subtree and set the modified flag on every ancestor of a
    /// modified node, so a renderer can find dirty paths top-down without
    /// deep queries per node.
    pub fn update_modified_path(&mut self, root: NodeId) {
        let mut active = FxHashSet::default();
        let mut memo = FxHashMap::default();
        self.mark_path_rec(root, &mut active, &mut memo);
    }

    fn mark_path_rec(
        &mut self,
        id: NodeId,
        active: &mut FxHashSet<NodeId>,
        memo: &mut FxHashMap<NodeId, bool>,
    ) -> bool {
        if let Some(&answer) = memo.get(&id) {
            return answer;
        }
        if !active.insert(id) {
            return false;
        }
        let (self_modified, children) = match self.arena.get(id) {
            Some(node) => {
                let mut children = node.child_ids();
                if let Some(instance) = node.proto.as_ref() {
                    children.extend_from_slice(&instance.impl_roots);
                }
                (node.modified, children)
            }
            None => {
                active.remove(&id);
                memo.insert(id, false);
                return false;
            }
        };
        let mut any = self_modified;
        for child in children {
            any |= self.mark_path_rec(child, active, memo);
        }
        if any && !self_modified {
            if let Some(node) = self.arena.get_mut(id) {
                node.modified = true;
            }
        }
        active.remove(&id);
        memo.insert(id, any);
        any
    }

    fn clear_modified_rec(&mut self, id: NodeId, visited: &mut FxHashSet<NodeId>) {
        if !visited.insert(id) {
            return;
        }
        let children = match self.arena.get_mut(id) {
            Some(node) => {
                node.modified = false;
                let mut children = node.child_ids();
                if let Some(instance) = node.proto.as_ref() {
                    children.extend_from_slice(&instance.impl_roots);
                }
                children
            }
            None => return,
        };
        for child in children {
            self.clear_modified_rec(child, visited);
        }
    }

    // -------------------- bounding volumes --------------------

    /// Conservative bounding volume of the subtree at `id`. Cached per node
    /// and recomputed only where a geometry-affecting write has landed since
    /// the last query.
    pub fn bounding_volume(&mut self, id: NodeId) -> BVolume {
        let mut active = FxHashSet::default();
        let mut memo = FxHashMap::default();
        self.bvolume_rec(id, &mut active, &mut memo).0
    }

    /// Returns (volume, changed-since-cache). `active` holds the recursion
    /// path so only a true back-edge short-circuits; `memo` lets a shared
    /// (USE'd) child answer every parent with its real volume.
    fn bvolume_rec(
        &mut self,
        id: NodeId,
        active: &mut FxHashSet<NodeId>,
        memo: &mut FxHashMap<NodeId, (BVolume, bool)>,
    ) -> (BVolume, bool) {
        if let Some(&answer) = memo.get(&id) {
            return answer;
        }
        active.insert(id);
        let answer = self.bvolume_node(id, active, memo);
        active.remove(&id);
        memo.insert(id, answer);
        answer
    }

    fn bvolume_node(
        &mut self,
        id: NodeId,
        active: &mut FxHashSet<NodeId>,
        memo: &mut FxHashMap<NodeId, (BVolume, bool)>,
    ) -> (BVolume, bool) {
        let Some(node) = self.arena.get(id) else {
            return (BVolume::Empty, false);
        };
        let dirty = node.bvolume_dirty;
        let cached = node.bvolume;
        let kind = node.node_type().kind();

        match kind {
            NodeKind::Geometry(shape) => {
                if !dirty {
                    return (cached, false);
                }
                let volume = Self::geometry_volume(shape, node);
                self.store_bvolume(id, volume);
                (volume, true)
            }
            NodeKind::Grouping | NodeKind::Shape | NodeKind::Proto => {
                let children: Vec<NodeId> = if kind == NodeKind::Proto {
                    node.proto
                        .as_ref()
                        .map(|p| p.impl_roots.clone())
                        .unwrap_or_default()
                } else {
                    node.child_ids()
                };
                let transform = Self::transform_of(node);

                let mut volume = BVolume::Empty;
                let mut changed = dirty;
                let mut partial = false;
                for child in children {
                    if active.contains(&child) {
                        // Containment cycle: skip the back-edge and leave
                        // this node's cache untouched.
                        partial = true;
                        continue;
                    }
                    let (child_volume, child_changed) = self.bvolume_rec(child, active, memo);
                    volume = volume.union(child_volume);
                    changed |= child_changed;
                }
                if !changed {
                    return (cached, false);
                }
                if let Some((translation, rotation, scale)) = transform {
                    volume = volume.transformed(translation, rotation, scale);
                }
                if !partial {
                    self.store_bvolume(id, volume);
                }
                (volume, true)
            }
            // Lights, bindables, interpolators, attributes, info nodes have
            // no spatial extent.
            _ => (BVolume::Empty, false),
        }
    }

    fn store_bvolume(&mut self, id: NodeId, volume: BVolume) {
        if let Some(node) = self.arena.get_mut(id) {
            node.bvolume = volume;
            node.bvolume_dirty = false;
        }
    }

    fn geometry_volume(shape: GeometryKind, node: &Node) -> BVolume {
        let float = |name: &str, fallback: f32| match node.field(name) {
            Some(&FieldValue::SfFloat(v)) => v,
            _ => fallback,
        };
        match shape {
            GeometryKind::Box => {
                let size = match node.field("size") {
                    Some(&FieldValue::SfVec3f(s)) => s,
                    _ => Vec3::splat(2.0),
                };
                BVolume::sphere(Vec3::ZERO, (size * 0.5).length())
            }
            GeometryKind::Sphere => BVolume::sphere(Vec3::ZERO, float("radius", 1.0)),
            GeometryKind::Cone => {
                let r = float("bottomRadius", 1.0);
                let h = float("height", 2.0) * 0.5;
                BVolume::sphere(Vec3::ZERO, (r * r + h * h).sqrt())
            }
            GeometryKind::Cylinder => {
                let r = float("radius", 1.0);
                let h = float("height", 2.0) * 0.5;
                BVolume::sphere(Vec3::ZERO, (r * r + h * h).sqrt())
            }
        }
    }

    /// Transform components if the node carries them (Transform does, plain
    /// Group does not).
    fn transform_of(node: &Node) -> Option<(Vec3, Quat, Vec3)> {
        let translation = match node.field("translation")? {
            &FieldValue::SfVec3f(t) => t,
            _ => return None,
        };
        let rotation = match node.field("rotation") {
            Some(&FieldValue::SfRotation(r)) => r,
            _ => SfRotation::default(),
        };
        let scale = match node.field("scale") {
            Some(&FieldValue::SfVec3f(s)) => s,
            _ => Vec3::ONE,
        };
        Some((translation, rotation.to_quat(), scale))
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
