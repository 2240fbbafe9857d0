use vrml_ids::NodeId;

/// The four bindable categories of the base profile. At most one node per
/// category is active ("bound") at a time in a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindableKind {
    Viewpoint,
    Background,
    Fog,
    NavigationInfo,
}

impl BindableKind {
    pub const ALL: [BindableKind; 4] = [
        BindableKind::Viewpoint,
        BindableKind::Background,
        BindableKind::Fog,
        BindableKind::NavigationInfo,
    ];
}

/// isBound notifications owed after a stack operation. The scene turns
/// these into real eventOuts on the affected nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BindChange {
    /// Node that lost the top spot (send `isBound FALSE`).
    pub unbound: Option<NodeId>,
    /// Node now at the top (send `isBound TRUE`).
    pub bound: Option<NodeId>,
}

/// One bindable category: an append-only registry of every bindable of the
/// category reachable in the graph, plus the stack of currently bound nodes.
/// The last element of `stack` is the top (the active node).
#[derive(Debug, Default)]
pub struct BindStack {
    registry: Vec<NodeId>,
    stack: Vec<NodeId>,
}

impl BindStack {
    /// Record a bindable as reachable. Returns true if it is the first of
    /// its category (callers auto-bind the first arrival).
    pub fn register(&mut self, node: NodeId) -> bool {
        if !self.registry.contains(&node) {
            self.registry.push(node);
        }
        self.registry.len() == 1
    }

    /// The active node, if any. A default is the renderer's business, not
    /// ours.
    pub fn top(&self) -> Option<NodeId> {
        self.stack.last().copied()
    }

    pub fn registered(&self) -> &[NodeId] {
        &self.registry
    }

    /// Bind `node`: remove it from the stack wherever it occurs, then push
    /// it on top. The previous top (if different) is owed `isBound FALSE`,
    /// the new top `isBound TRUE`.
    pub fn push(&mut self, node: NodeId) -> BindChange {
        let previous = self.top();
        self.stack.retain(|&n| n != node);
        self.stack.push(node);
        BindChange {
            unbound: previous.filter(|&p| p != node),
            bound: Some(node),
        }
    }

    /// Unbind `node` wherever it sits in the stack. If it was the top, the
    /// node revealed underneath (if any) is owed `isBound TRUE`.
    pub fn remove(&mut self, node: NodeId) -> BindChange {
        let was_top = self.top() == Some(node);
        let had = self.stack.contains(&node);
        self.stack.retain(|&n| n != node);
        BindChange {
            unbound: had.then_some(node),
            bound: if was_top { self.top() } else { None },
        }
    }

    pub fn is_bound(&self, node: NodeId) -> bool {
        self.top() == Some(node)
    }

    /// Forget a removed node entirely. Does not touch the stack; unbind
    /// with `remove` first if it might be bound.
    pub fn unregister(&mut self, node: NodeId) {
        self.registry.retain(|&n| n != node);
    }
}

/// The per-scene stacks, one per category.
#[derive(Debug, Default)]
pub struct BindStackSet {
    viewpoint: BindStack,
    background: BindStack,
    fog: BindStack,
    navigation_info: BindStack,
}

impl BindStackSet {
    pub fn get(&self, kind: BindableKind) -> &BindStack {
        match kind {
            BindableKind::Viewpoint => &self.viewpoint,
            BindableKind::Background => &self.background,
            BindableKind::Fog => &self.fog,
            BindableKind::NavigationInfo => &self.navigation_info,
        }
    }

    pub fn get_mut(&mut self, kind: BindableKind) -> &mut BindStack {
        match kind {
            BindableKind::Viewpoint => &mut self.viewpoint,
            BindableKind::Background => &mut self.background,
            BindableKind::Fog => &mut self.fog,
            BindableKind::NavigationInfo => &mut self.navigation_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> NodeId {
        NodeId::from_parts(n, 0)
    }

    #[test]
    fn push_notifies_previous_top() {
        let mut s = BindStack::default();
        let change = s.push(id(1));
        assert_eq!(change.bound, Some(id(1)));
        assert_eq!(change.unbound, None);

        let change = s.push(id(2));
        assert_eq!(change.bound, Some(id(2)));
        assert_eq!(change.unbound, Some(id(1)));
        assert_eq!(s.top(), Some(id(2)));
    }

    #[test]
    fn rebinding_the_top_sends_no_false() {
        let mut s = BindStack::default();
        s.push(id(1));
        let change = s.push(id(1));
        assert_eq!(change.unbound, None);
        assert_eq!(change.bound, Some(id(1)));
    }

    #[test]
    fn remove_top_reveals_previous() {
        let mut s = BindStack::default();
        s.push(id(1));
        s.push(id(2));
        let change = s.remove(id(2));
        assert_eq!(change.bound, Some(id(1)));
        assert_eq!(s.top(), Some(id(1)));

        let change = s.remove(id(1));
        assert_eq!(change.bound, None);
        assert_eq!(s.top(), None);
    }

    #[test]
    fn remove_from_middle_keeps_top() {
        let mut s = BindStack::default();
        s.push(id(1));
        s.push(id(2));
        s.push(id(3));
        let change = s.remove(id(2));
        assert_eq!(change.bound, None);
        assert_eq!(change.unbound, Some(id(2)));
        assert_eq!(s.top(), Some(id(3)));
    }

    #[test]
    fn register_reports_first_arrival() {
        let mut s = BindStack::default();
        assert!(s.register(id(1)));
        assert!(!s.register(id(2)));
        assert!(!s.register(id(1)));
        assert_eq!(s.registered(), &[id(1), id(2)]);
    }
}
