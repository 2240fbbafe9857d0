//! Scene-graph runtime for the classic VRML97 world model: typed nodes in
//! an arena, a registry of node types extensible with PROTO/EXTERNPROTO,
//! ROUTE-based event propagation with per-frame queue draining, bindable
//! stacks, and the modified/bounding-volume protocols a renderer sits on.

#![forbid(unsafe_code)]

pub mod bindable;
pub mod builtins;
pub mod bvolume;
pub mod error;
pub mod events;
mod interpolate;
pub mod node;
pub mod node_arena;
pub mod node_type;
mod proto;
pub mod registry;
pub mod scene;
pub mod statement;

pub use bindable::{BindChange, BindStack, BindStackSet, BindableKind};
pub use bvolume::{BSphere, BVolume};
pub use error::VrmlError;
pub use events::{EventQueue, QueuedEvent, DEFAULT_EVENT_CAPACITY};
pub use node::{Node, ProtoInstance, Route};
pub use node_arena::NodeArena;
pub use node_type::{
    GeometryKind, Interface, InterfaceCategory, InterpolatorKind, IsTarget, NodeKind, NodeType,
    NodeTypeRef, ProtoData, ProtoImpl,
};
pub use registry::TypeRegistry;
pub use scene::{Scene, SceneConfig};
pub use statement::{
    ExternProtoStatement, InitValue, InterfaceDecl, NodeBody, NodeStatement, ProtoStatement,
    RouteStatement, Statement,
};
