use std::fmt;

// ---- Generational ID: base encoding ----
// u64 layout: low 32 = index (0 = nil, 1.. = slot), high 32 = generation.
// When a slot is reused, generation is bumped so old IDs no longer match.

/// Defines a generational ID type (NodeId, TypeId, ...).
/// All such IDs use index + generation for safe arena slot reuse.
macro_rules! define_generational_id {
    ($type_name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $type_name(pub u64);

        impl $type_name {
            #[inline]
            pub const fn nil() -> Self {
                Self(0)
            }

            #[inline]
            pub const fn index(self) -> u32 {
                (self.0 & 0xFFFF_FFFF) as u32
            }

            #[inline]
            pub const fn generation(self) -> u32 {
                (self.0 >> 32) as u32
            }

            #[inline]
            pub const fn from_parts(index: u32, generation: u32) -> Self {
                Self((index as u64) | ((generation as u64) << 32))
            }

            #[inline]
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            #[inline]
            pub const fn from_u64(value: u64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn is_nil(self) -> bool {
                self.0 == 0
            }
        }

        impl Default for $type_name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl fmt::Debug for $type_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!(stringify!($type_name), "({}:{})"),
                    self.index(),
                    self.generation()
                )
            }
        }

        impl fmt::Display for $type_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", self.index(), self.generation())
            }
        }
    };
}

define_generational_id!(
    NodeId,
    "Node ID — allocated by the scene's NodeArena. Index + generation."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_is_index_zero() {
        let nil = NodeId::nil();
        assert!(nil.is_nil());
        assert_eq!(nil.index(), 0);
        assert_eq!(nil.generation(), 0);
        assert_eq!(NodeId::default(), nil);
    }

    #[test]
    fn parts_round_trip() {
        let id = NodeId::from_parts(42, 7);
        assert_eq!(id.index(), 42);
        assert_eq!(id.generation(), 7);
        assert_eq!(NodeId::from_u64(id.as_u64()), id);
    }

    #[test]
    fn generation_distinguishes_reused_slots() {
        let a = NodeId::from_parts(3, 0);
        let b = NodeId::from_parts(3, 1);
        assert_ne!(a, b);
        assert_eq!(a.index(), b.index());
    }
}
