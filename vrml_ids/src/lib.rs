//! Type-safe generational identifiers for the scene arena.
//! IDs use u64 = index (low 32 bits) | generation (high 32 bits). Index 0 = nil.
//! IDs are created by their owning arena; slot reuse bumps the generation so
//! stale IDs no longer resolve.

pub mod ids;
pub use ids::*;
