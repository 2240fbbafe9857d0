use glam::{Quat, Vec3};

/// Bounding sphere. The conservative volume cached per node and consulted by
/// the renderer for culling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BSphere {
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Smallest sphere enclosing both `self` and `other`.
    pub fn enclosing(self, other: BSphere) -> BSphere {
        let d = other.center - self.center;
        let dist = d.length();

        // One sphere already contains the other.
        if dist + other.radius <= self.radius {
            return self;
        }
        if dist + self.radius <= other.radius {
            return other;
        }

        let radius = (dist + self.radius + other.radius) * 0.5;
        let center = if dist > f32::EPSILON {
            self.center + d * ((radius - self.radius) / dist)
        } else {
            self.center
        };
        BSphere { center, radius }
    }

    /// Apply a rigid transform plus (possibly non-uniform) scale. The radius
    /// is scaled by the largest scale component, which keeps the result
    /// conservative.
    pub fn transformed(self, translation: Vec3, rotation: Quat, scale: Vec3) -> BSphere {
        let s = scale.x.abs().max(scale.y.abs()).max(scale.z.abs());
        BSphere {
            center: rotation * (self.center * scale) + translation,
            radius: self.radius * s,
        }
    }

    pub fn contains_point(self, p: Vec3) -> bool {
        (p - self.center).length_squared() <= self.radius * self.radius
    }
}

/// A node's cached bounding volume. `Empty` is the identity for union and
/// the answer for non-spatial nodes (interpolators, bindables, info nodes).
/// `Infinite` absorbs everything; a culler must treat it as always visible.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum BVolume {
    #[default]
    Empty,
    Sphere(BSphere),
    Infinite,
}

impl BVolume {
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        BVolume::Sphere(BSphere::new(center, radius))
    }

    pub fn union(self, other: BVolume) -> BVolume {
        match (self, other) {
            (BVolume::Infinite, _) | (_, BVolume::Infinite) => BVolume::Infinite,
            (BVolume::Empty, v) | (v, BVolume::Empty) => v,
            (BVolume::Sphere(a), BVolume::Sphere(b)) => BVolume::Sphere(a.enclosing(b)),
        }
    }

    pub fn transformed(self, translation: Vec3, rotation: Quat, scale: Vec3) -> BVolume {
        match self {
            BVolume::Empty => BVolume::Empty,
            BVolume::Sphere(s) => BVolume::Sphere(s.transformed(translation, rotation, scale)),
            BVolume::Infinite => BVolume::Infinite,
        }
    }

    pub fn as_sphere(self) -> Option<BSphere> {
        match self {
            BVolume::Sphere(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_with_empty_is_identity() {
        let s = BVolume::sphere(Vec3::ONE, 2.0);
        assert_eq!(BVolume::Empty.union(s), s);
        assert_eq!(s.union(BVolume::Empty), s);
    }

    #[test]
    fn infinite_absorbs_union() {
        let s = BVolume::sphere(Vec3::ONE, 2.0);
        assert_eq!(BVolume::Infinite.union(s), BVolume::Infinite);
        assert_eq!(s.union(BVolume::Infinite), BVolume::Infinite);
        assert_eq!(
            BVolume::Infinite.transformed(Vec3::X, Quat::IDENTITY, Vec3::ONE),
            BVolume::Infinite
        );
        assert_eq!(BVolume::Infinite.as_sphere(), None);
    }

    #[test]
    fn enclosing_contains_both() {
        let a = BSphere::new(Vec3::ZERO, 1.0);
        let b = BSphere::new(Vec3::new(4.0, 0.0, 0.0), 2.0);
        let u = a.enclosing(b);
        assert!(u.contains_point(Vec3::new(-1.0, 0.0, 0.0)));
        assert!(u.contains_point(Vec3::new(6.0, 0.0, 0.0)));
        assert!((u.radius - 3.5).abs() < 1e-5);
    }

    #[test]
    fn enclosing_keeps_container() {
        let big = BSphere::new(Vec3::ZERO, 10.0);
        let small = BSphere::new(Vec3::ONE, 1.0);
        assert_eq!(big.enclosing(small), big);
        assert_eq!(small.enclosing(big), big);
    }

    #[test]
    fn transform_scales_radius_by_max_component() {
        let s = BSphere::new(Vec3::ZERO, 1.0);
        let t = s.transformed(Vec3::X, Quat::IDENTITY, Vec3::new(1.0, 3.0, 2.0));
        assert_eq!(t.center, Vec3::X);
        assert_eq!(t.radius, 3.0);
    }
}
