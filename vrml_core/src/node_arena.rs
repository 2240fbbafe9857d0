use vrml_ids::NodeId;

use crate::node::Node;

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena storage for nodes: a slot vector indexed by the id's low half,
/// with a generation stamp per slot so stale handles miss instead of
/// aliasing a recycled slot. Index 0 is never issued (nil).
#[derive(Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Allocate a fresh id and build the node in place with it.
    pub fn insert_with(&mut self, build: impl FnOnce(NodeId) -> Node) -> NodeId {
        let (index, generation) = match self.free.pop() {
            Some(index) => {
                let generation = self.slots[index as usize - 1].generation;
                (index, generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: None,
                });
                (self.slots.len() as u32, 0)
            }
        };
        let id = NodeId::from_parts(index, generation);
        self.slots[index as usize - 1].node = Some(build(id));
        self.live += 1;
        id
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        if id.is_nil() {
            return None;
        }
        let slot = self.slots.get(id.index() as usize - 1)?;
        (slot.generation == id.generation()).then_some(slot)
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slot(id)?.node.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_nil() {
            return None;
        }
        let slot = self.slots.get_mut(id.index() as usize - 1)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    /// Remove a node, bumping the slot generation so the handle goes stale.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        if id.is_nil() {
            return None;
        }
        let index = id.index();
        let slot = self.slots.get_mut(index as usize - 1)?;
        if slot.generation != id.generation() {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
        Some(node)
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let node = slot.node.as_ref()?;
            Some((NodeId::from_parts(i as u32 + 1, slot.generation), node))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut Node)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let node = slot.node.as_mut()?;
            Some((NodeId::from_parts(i as u32 + 1, slot.generation), node))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.iter().map(|(id, _)| id)
    }
}
