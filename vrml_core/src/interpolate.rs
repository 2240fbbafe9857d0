//! Keyframe sampling for the interpolator nodes.

use glam::Vec3;
use vrml_field::{FieldValue, SfRotation};

use crate::node_type::InterpolatorKind;

/// Locate `fraction` in the key list: the flanking key indices and the
/// normalized position between them. Outside the key range the nearest end
/// is held.
fn span(fraction: f32, key: &[f32]) -> Option<(usize, usize, f32)> {
    match key {
        [] => None,
        [_] => Some((0, 0, 0.0)),
        [first, ..] if fraction <= *first => Some((0, 0, 0.0)),
        [.., last] if fraction >= *last => {
            let i = key.len() - 1;
            Some((i, i, 0.0))
        }
        _ => {
            let hi = key.partition_point(|&k| k <= fraction);
            let lo = hi - 1;
            let width = key[hi] - key[lo];
            let t = if width > 0.0 {
                (fraction - key[lo]) / width
            } else {
                0.0
            };
            Some((lo, hi, t))
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn slerp(a: SfRotation, b: SfRotation, t: f32) -> SfRotation {
    SfRotation::from_quat(a.to_quat().slerp(b.to_quat(), t))
}

/// Sample an interpolator at `fraction`. Returns None when the keyframe
/// data is empty or the keyValue tag does not match the interpolator kind.
pub(crate) fn sample(
    which: InterpolatorKind,
    fraction: f32,
    key: &[f32],
    key_value: &FieldValue,
) -> Option<FieldValue> {
    let (lo, hi, t) = span(fraction, key)?;

    match (which, key_value) {
        (InterpolatorKind::Scalar, FieldValue::MfFloat(v)) => {
            let (a, b) = (*v.get(lo)?, *v.get(hi)?);
            Some(FieldValue::SfFloat(lerp(a, b, t)))
        }
        (InterpolatorKind::Color, FieldValue::MfColor(v)) => {
            let (a, b) = (*v.get(lo)?, *v.get(hi)?);
            Some(FieldValue::SfColor(a.lerp(b, t)))
        }
        (InterpolatorKind::Position, FieldValue::MfVec3f(v)) => {
            let (a, b) = (*v.get(lo)?, *v.get(hi)?);
            Some(FieldValue::SfVec3f(a.lerp(b, t)))
        }
        (InterpolatorKind::Orientation, FieldValue::MfRotation(v)) => {
            let (a, b) = (*v.get(lo)?, *v.get(hi)?);
            Some(FieldValue::SfRotation(slerp(a, b, t)))
        }
        (InterpolatorKind::Coordinate, FieldValue::MfVec3f(v)) => {
            // keyValue holds key.len() consecutive coordinate sets.
            let stride = v.len() / key.len().max(1);
            if stride == 0 {
                return None;
            }
            let a = v.get(lo * stride..lo * stride + stride)?;
            let b = v.get(hi * stride..hi * stride + stride)?;
            let out: Vec<Vec3> = a.iter().zip(b).map(|(&a, &b)| a.lerp(b, t)).collect();
            Some(FieldValue::mf_vec3f(&out))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_ends_outside_the_key_range() {
        let key = [0.2, 0.8];
        let kv = FieldValue::mf_float(&[10.0, 20.0]);
        assert_eq!(
            sample(InterpolatorKind::Scalar, 0.0, &key, &kv),
            Some(FieldValue::SfFloat(10.0))
        );
        assert_eq!(
            sample(InterpolatorKind::Scalar, 1.0, &key, &kv),
            Some(FieldValue::SfFloat(20.0))
        );
    }

    #[test]
    fn interpolates_within_a_span() {
        let key = [0.0, 1.0];
        let kv = FieldValue::mf_vec3f(&[Vec3::ZERO, Vec3::new(2.0, 4.0, 6.0)]);
        let out = sample(InterpolatorKind::Position, 0.5, &key, &kv);
        assert_eq!(out, Some(FieldValue::SfVec3f(Vec3::new(1.0, 2.0, 3.0))));
    }

    #[test]
    fn empty_keys_produce_nothing() {
        let kv = FieldValue::mf_float(&[1.0]);
        assert_eq!(sample(InterpolatorKind::Scalar, 0.5, &[], &kv), None);
    }

    #[test]
    fn coordinate_sets_interpolate_elementwise() {
        let key = [0.0, 1.0];
        let kv = FieldValue::mf_vec3f(&[
            Vec3::ZERO,
            Vec3::X,
            Vec3::splat(2.0),
            Vec3::new(3.0, 0.0, 0.0),
        ]);
        let out = sample(InterpolatorKind::Coordinate, 0.5, &key, &kv);
        assert_eq!(
            out,
            Some(FieldValue::mf_vec3f(&[
                Vec3::splat(1.0),
                Vec3::new(2.0, 0.0, 0.0)
            ]))
        );
    }

    #[test]
    fn orientation_midpoint_halves_the_angle() {
        let key = [0.0, 1.0];
        let a = SfRotation::default();
        let b = SfRotation {
            axis: Vec3::Z,
            angle: std::f32::consts::FRAC_PI_2,
        };
        let kv = FieldValue::mf_rotation(&[a, b]);
        let Some(FieldValue::SfRotation(mid)) =
            sample(InterpolatorKind::Orientation, 0.5, &key, &kv)
        else {
            panic!("no sample");
        };
        assert!((mid.angle - std::f32::consts::FRAC_PI_4).abs() < 1e-4);
    }
}
