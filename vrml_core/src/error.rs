use thiserror::Error;
use vrml_field::{FieldKind, TypeMismatch};

/// Everything the runtime can reject. All variants are recoverable: the
/// statement driver reports and moves on, a bad statement never aborts
/// graph construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VrmlError {
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),

    #[error("unknown field `{field}` on `{type_name}`")]
    UnknownField { type_name: String, field: String },

    #[error("unknown interface `{interface}` on `{type_name}`")]
    UnknownInterface {
        type_name: String,
        interface: String,
    },

    #[error("interface `{interface}` already declared on `{type_name}`")]
    DuplicateInterface {
        type_name: String,
        interface: String,
    },

    #[error("EXTERNPROTO `{type_name}` has no resolved implementation")]
    ExternprotoUnresolved { type_name: String },

    #[error(
        "route type mismatch: `{from_interface}` is {from_kind}, `{to_interface}` is {to_kind}"
    )]
    RouteTypeMismatch {
        from_interface: String,
        from_kind: FieldKind,
        to_interface: String,
        to_kind: FieldKind,
    },

    #[error("`{interface}` on `{type_name}` is not an eventOut or exposedField")]
    BadRouteSource {
        type_name: String,
        interface: String,
    },

    #[error("`{interface}` on `{type_name}` is not an eventIn or exposedField")]
    BadRouteDestination {
        type_name: String,
        interface: String,
    },

    #[error("unknown node type `{name}`")]
    UnknownType { name: String },

    #[error("unknown node `{name}`")]
    UnknownNode { name: String },

    #[error("node handle {0} is stale or was never allocated")]
    StaleNode(vrml_ids::NodeId),

    #[error("IS `{interface}` used outside a PROTO body")]
    StrayIs { interface: String },
}
