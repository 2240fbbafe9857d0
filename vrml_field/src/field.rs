use std::fmt;
use std::sync::Arc;

use glam::{Quat, Vec2, Vec3};
use thiserror::Error;
use vrml_ids::NodeId;

use crate::image::SfImage;

/// Field type tags, one per concrete `FieldValue` variant.
/// The name strings are the stable VRML97 spellings used in PROTO interface
/// text and diagnostics. Note the asymmetry inherited from the standard:
/// there is no MFBool or MFImage, and MFTime exists without further pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    SfBool,
    SfColor,
    SfFloat,
    SfImage,
    SfInt32,
    SfNode,
    SfRotation,
    SfString,
    SfTime,
    SfVec2f,
    SfVec3f,
    MfColor,
    MfFloat,
    MfInt32,
    MfNode,
    MfRotation,
    MfString,
    MfTime,
    MfVec2f,
    MfVec3f,
}

impl FieldKind {
    /// The stable VRML97 type name.
    pub const fn name(self) -> &'static str {
        match self {
            FieldKind::SfBool => "SFBool",
            FieldKind::SfColor => "SFColor",
            FieldKind::SfFloat => "SFFloat",
            FieldKind::SfImage => "SFImage",
            FieldKind::SfInt32 => "SFInt32",
            FieldKind::SfNode => "SFNode",
            FieldKind::SfRotation => "SFRotation",
            FieldKind::SfString => "SFString",
            FieldKind::SfTime => "SFTime",
            FieldKind::SfVec2f => "SFVec2f",
            FieldKind::SfVec3f => "SFVec3f",
            FieldKind::MfColor => "MFColor",
            FieldKind::MfFloat => "MFFloat",
            FieldKind::MfInt32 => "MFInt32",
            FieldKind::MfNode => "MFNode",
            FieldKind::MfRotation => "MFRotation",
            FieldKind::MfString => "MFString",
            FieldKind::MfTime => "MFTime",
            FieldKind::MfVec2f => "MFVec2f",
            FieldKind::MfVec3f => "MFVec3f",
        }
    }

    /// Parse one of the 20 stable type names.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "SFBool" => FieldKind::SfBool,
            "SFColor" => FieldKind::SfColor,
            "SFFloat" => FieldKind::SfFloat,
            "SFImage" => FieldKind::SfImage,
            "SFInt32" => FieldKind::SfInt32,
            "SFNode" => FieldKind::SfNode,
            "SFRotation" => FieldKind::SfRotation,
            "SFString" => FieldKind::SfString,
            "SFTime" => FieldKind::SfTime,
            "SFVec2f" => FieldKind::SfVec2f,
            "SFVec3f" => FieldKind::SfVec3f,
            "MFColor" => FieldKind::MfColor,
            "MFFloat" => FieldKind::MfFloat,
            "MFInt32" => FieldKind::MfInt32,
            "MFNode" => FieldKind::MfNode,
            "MFRotation" => FieldKind::MfRotation,
            "MFString" => FieldKind::MfString,
            "MFTime" => FieldKind::MfTime,
            "MFVec2f" => FieldKind::MfVec2f,
            "MFVec3f" => FieldKind::MfVec3f,
            _ => return None,
        })
    }

    #[inline]
    pub const fn is_multi(self) -> bool {
        matches!(
            self,
            FieldKind::MfColor
                | FieldKind::MfFloat
                | FieldKind::MfInt32
                | FieldKind::MfNode
                | FieldKind::MfRotation
                | FieldKind::MfString
                | FieldKind::MfTime
                | FieldKind::MfVec2f
                | FieldKind::MfVec3f
        )
    }

    /// Element tag of a multi-value kind.
    pub const fn element(self) -> Option<FieldKind> {
        Some(match self {
            FieldKind::MfColor => FieldKind::SfColor,
            FieldKind::MfFloat => FieldKind::SfFloat,
            FieldKind::MfInt32 => FieldKind::SfInt32,
            FieldKind::MfNode => FieldKind::SfNode,
            FieldKind::MfRotation => FieldKind::SfRotation,
            FieldKind::MfString => FieldKind::SfString,
            FieldKind::MfTime => FieldKind::SfTime,
            FieldKind::MfVec2f => FieldKind::SfVec2f,
            FieldKind::MfVec3f => FieldKind::SfVec3f,
            _ => return None,
        })
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Assigning or routing a value whose tag disagrees with the target's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("type mismatch: expected {expected}, found {found}")]
pub struct TypeMismatch {
    pub expected: FieldKind,
    pub found: FieldKind,
}

/// Axis-angle rotation, the SFRotation payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SfRotation {
    pub axis: Vec3,
    pub angle: f32,
}

impl SfRotation {
    pub const fn new(axis: Vec3, angle: f32) -> Self {
        Self { axis, angle }
    }

    pub fn to_quat(self) -> Quat {
        Quat::from_axis_angle(self.axis.normalize_or_zero(), self.angle)
    }

    pub fn from_quat(q: Quat) -> Self {
        let (axis, angle) = q.to_axis_angle();
        Self { axis, angle }
    }
}

impl Default for SfRotation {
    // VRML97 default rotation is "0 0 1 0".
    fn default() -> Self {
        Self {
            axis: Vec3::Z,
            angle: 0.0,
        }
    }
}

impl fmt::Display for SfRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.axis.x, self.axis.y, self.axis.z, self.angle
        )
    }
}

/// A tagged VRML97 field value. The tag never changes after construction;
/// cross-tag writes go through `assign` and fail with `TypeMismatch`.
///
/// Multi-value variants share their backing buffer on clone and privatize it
/// on the first write (`Arc::make_mut`), so PROTO expansion and DEF/USE can
/// hand the same array to many owners cheaply.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    // --- Single-value ---
    SfBool(bool),
    SfColor(Vec3),
    SfFloat(f32),
    SfImage(SfImage),
    SfInt32(i32),
    SfNode(Option<NodeId>),
    SfRotation(SfRotation),
    SfString(String),
    SfTime(f64),
    SfVec2f(Vec2),
    SfVec3f(Vec3),

    // --- Multi-value (copy-on-write) ---
    MfColor(Arc<Vec<Vec3>>),
    MfFloat(Arc<Vec<f32>>),
    MfInt32(Arc<Vec<i32>>),
    MfNode(Arc<Vec<NodeId>>),
    MfRotation(Arc<Vec<SfRotation>>),
    MfString(Arc<Vec<String>>),
    MfTime(Arc<Vec<f64>>),
    MfVec2f(Arc<Vec<Vec2>>),
    MfVec3f(Arc<Vec<Vec3>>),
}

// Applies an operation to every multi-value variant.
macro_rules! for_each_mf {
    ($value:expr, $buf:ident => $body:expr, $else:expr) => {
        match $value {
            FieldValue::MfColor($buf) => $body,
            FieldValue::MfFloat($buf) => $body,
            FieldValue::MfInt32($buf) => $body,
            FieldValue::MfNode($buf) => $body,
            FieldValue::MfRotation($buf) => $body,
            FieldValue::MfString($buf) => $body,
            FieldValue::MfTime($buf) => $body,
            FieldValue::MfVec2f($buf) => $body,
            FieldValue::MfVec3f($buf) => $body,
            _ => $else,
        }
    };
}

// -------------------- Constructors --------------------

impl FieldValue {
    /// The declared default for a kind: FALSE, zeros, "", NULL, or an empty
    /// sequence.
    pub fn default_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::SfBool => FieldValue::SfBool(false),
            FieldKind::SfColor => FieldValue::SfColor(Vec3::ZERO),
            FieldKind::SfFloat => FieldValue::SfFloat(0.0),
            FieldKind::SfImage => FieldValue::SfImage(SfImage::default()),
            FieldKind::SfInt32 => FieldValue::SfInt32(0),
            FieldKind::SfNode => FieldValue::SfNode(None),
            FieldKind::SfRotation => FieldValue::SfRotation(SfRotation::default()),
            FieldKind::SfString => FieldValue::SfString(String::new()),
            FieldKind::SfTime => FieldValue::SfTime(0.0),
            FieldKind::SfVec2f => FieldValue::SfVec2f(Vec2::ZERO),
            FieldKind::SfVec3f => FieldValue::SfVec3f(Vec3::ZERO),
            FieldKind::MfColor => FieldValue::MfColor(Arc::new(Vec::new())),
            FieldKind::MfFloat => FieldValue::MfFloat(Arc::new(Vec::new())),
            FieldKind::MfInt32 => FieldValue::MfInt32(Arc::new(Vec::new())),
            FieldKind::MfNode => FieldValue::MfNode(Arc::new(Vec::new())),
            FieldKind::MfRotation => FieldValue::MfRotation(Arc::new(Vec::new())),
            FieldKind::MfString => FieldValue::MfString(Arc::new(Vec::new())),
            FieldKind::MfTime => FieldValue::MfTime(Arc::new(Vec::new())),
            FieldKind::MfVec2f => FieldValue::MfVec2f(Arc::new(Vec::new())),
            FieldKind::MfVec3f => FieldValue::MfVec3f(Arc::new(Vec::new())),
        }
    }

    // Multi-value constructors always copy the input slice; callers keep no
    // aliasing with the stored buffer.

    pub fn mf_color(values: &[Vec3]) -> Self {
        FieldValue::MfColor(Arc::new(values.to_vec()))
    }

    pub fn mf_float(values: &[f32]) -> Self {
        FieldValue::MfFloat(Arc::new(values.to_vec()))
    }

    pub fn mf_int32(values: &[i32]) -> Self {
        FieldValue::MfInt32(Arc::new(values.to_vec()))
    }

    pub fn mf_node(values: &[NodeId]) -> Self {
        FieldValue::MfNode(Arc::new(values.to_vec()))
    }

    pub fn mf_rotation(values: &[SfRotation]) -> Self {
        FieldValue::MfRotation(Arc::new(values.to_vec()))
    }

    pub fn mf_string(values: &[String]) -> Self {
        FieldValue::MfString(Arc::new(values.to_vec()))
    }

    pub fn mf_time(values: &[f64]) -> Self {
        FieldValue::MfTime(Arc::new(values.to_vec()))
    }

    pub fn mf_vec2f(values: &[Vec2]) -> Self {
        FieldValue::MfVec2f(Arc::new(values.to_vec()))
    }

    pub fn mf_vec3f(values: &[Vec3]) -> Self {
        FieldValue::MfVec3f(Arc::new(values.to_vec()))
    }
}

// -------------------- Tag, assignment --------------------

impl FieldValue {
    pub const fn kind(&self) -> FieldKind {
        match self {
            FieldValue::SfBool(_) => FieldKind::SfBool,
            FieldValue::SfColor(_) => FieldKind::SfColor,
            FieldValue::SfFloat(_) => FieldKind::SfFloat,
            FieldValue::SfImage(_) => FieldKind::SfImage,
            FieldValue::SfInt32(_) => FieldKind::SfInt32,
            FieldValue::SfNode(_) => FieldKind::SfNode,
            FieldValue::SfRotation(_) => FieldKind::SfRotation,
            FieldValue::SfString(_) => FieldKind::SfString,
            FieldValue::SfTime(_) => FieldKind::SfTime,
            FieldValue::SfVec2f(_) => FieldKind::SfVec2f,
            FieldValue::SfVec3f(_) => FieldKind::SfVec3f,
            FieldValue::MfColor(_) => FieldKind::MfColor,
            FieldValue::MfFloat(_) => FieldKind::MfFloat,
            FieldValue::MfInt32(_) => FieldKind::MfInt32,
            FieldValue::MfNode(_) => FieldKind::MfNode,
            FieldValue::MfRotation(_) => FieldKind::MfRotation,
            FieldValue::MfString(_) => FieldKind::MfString,
            FieldValue::MfTime(_) => FieldKind::MfTime,
            FieldValue::MfVec2f(_) => FieldKind::MfVec2f,
            FieldValue::MfVec3f(_) => FieldKind::MfVec3f,
        }
    }

    /// Overwrite this value with another of the same tag. Multi-value
    /// assignment shares the source buffer (copy-on-write kicks in on the
    /// next element write).
    pub fn assign(&mut self, other: &FieldValue) -> Result<(), TypeMismatch> {
        if self.kind() != other.kind() {
            return Err(TypeMismatch {
                expected: self.kind(),
                found: other.kind(),
            });
        }
        *self = other.clone();
        Ok(())
    }
}

// -------------------- Multi-value accessors --------------------

impl FieldValue {
    /// Element count of a multi-value; `None` for single values.
    pub fn len(&self) -> Option<usize> {
        for_each_mf!(self, buf => Some(buf.len()), None)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Element `index` of a multi-value, boxed back up as the single-value
    /// tag.
    pub fn element(&self, index: usize) -> Option<FieldValue> {
        match self {
            FieldValue::MfColor(buf) => buf.get(index).map(|v| FieldValue::SfColor(*v)),
            FieldValue::MfFloat(buf) => buf.get(index).map(|v| FieldValue::SfFloat(*v)),
            FieldValue::MfInt32(buf) => buf.get(index).map(|v| FieldValue::SfInt32(*v)),
            FieldValue::MfNode(buf) => buf
                .get(index)
                .map(|v| FieldValue::SfNode((!v.is_nil()).then_some(*v))),
            FieldValue::MfRotation(buf) => buf.get(index).map(|v| FieldValue::SfRotation(*v)),
            FieldValue::MfString(buf) => buf.get(index).map(|v| FieldValue::SfString(v.clone())),
            FieldValue::MfTime(buf) => buf.get(index).map(|v| FieldValue::SfTime(*v)),
            FieldValue::MfVec2f(buf) => buf.get(index).map(|v| FieldValue::SfVec2f(*v)),
            FieldValue::MfVec3f(buf) => buf.get(index).map(|v| FieldValue::SfVec3f(*v)),
            _ => None,
        }
    }

    /// Write element `index` of a multi-value; grows with element defaults
    /// if `index` is past the end. Privatizes a shared buffer first.
    pub fn set_element(&mut self, index: usize, value: &FieldValue) -> Result<(), TypeMismatch> {
        let expected = match self.kind().element() {
            Some(k) => k,
            None => {
                return Err(TypeMismatch {
                    expected: self.kind(),
                    found: value.kind(),
                });
            }
        };
        if value.kind() != expected {
            return Err(TypeMismatch {
                expected,
                found: value.kind(),
            });
        }
        if self.len().is_some_and(|len| index >= len) {
            self.set_len(index + 1);
        }
        match (self, value) {
            (FieldValue::MfColor(buf), FieldValue::SfColor(v)) => {
                Arc::make_mut(buf)[index] = *v;
            }
            (FieldValue::MfFloat(buf), FieldValue::SfFloat(v)) => {
                Arc::make_mut(buf)[index] = *v;
            }
            (FieldValue::MfInt32(buf), FieldValue::SfInt32(v)) => {
                Arc::make_mut(buf)[index] = *v;
            }
            (FieldValue::MfNode(buf), FieldValue::SfNode(v)) => {
                Arc::make_mut(buf)[index] = v.unwrap_or(NodeId::nil());
            }
            (FieldValue::MfRotation(buf), FieldValue::SfRotation(v)) => {
                Arc::make_mut(buf)[index] = *v;
            }
            (FieldValue::MfString(buf), FieldValue::SfString(v)) => {
                Arc::make_mut(buf)[index] = v.clone();
            }
            (FieldValue::MfTime(buf), FieldValue::SfTime(v)) => {
                Arc::make_mut(buf)[index] = *v;
            }
            (FieldValue::MfVec2f(buf), FieldValue::SfVec2f(v)) => {
                Arc::make_mut(buf)[index] = *v;
            }
            (FieldValue::MfVec3f(buf), FieldValue::SfVec3f(v)) => {
                Arc::make_mut(buf)[index] = *v;
            }
            _ => unreachable!("tags checked above"),
        }
        Ok(())
    }

    /// Truncate or extend (with element defaults) a multi-value. No-op on
    /// single values.
    pub fn set_len(&mut self, len: usize) {
        match self {
            FieldValue::MfColor(buf) => Arc::make_mut(buf).resize(len, Vec3::ZERO),
            FieldValue::MfFloat(buf) => Arc::make_mut(buf).resize(len, 0.0),
            FieldValue::MfInt32(buf) => Arc::make_mut(buf).resize(len, 0),
            FieldValue::MfNode(buf) => Arc::make_mut(buf).resize(len, NodeId::nil()),
            FieldValue::MfRotation(buf) => Arc::make_mut(buf).resize(len, SfRotation::default()),
            FieldValue::MfString(buf) => Arc::make_mut(buf).resize(len, String::new()),
            FieldValue::MfTime(buf) => Arc::make_mut(buf).resize(len, 0.0),
            FieldValue::MfVec2f(buf) => Arc::make_mut(buf).resize(len, Vec2::ZERO),
            FieldValue::MfVec3f(buf) => Arc::make_mut(buf).resize(len, Vec3::ZERO),
            _ => {}
        }
    }
}

// -------------------- Typed accessors --------------------

impl FieldValue {
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::SfBool(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            FieldValue::SfFloat(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int32(&self) -> Option<i32> {
        match self {
            FieldValue::SfInt32(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_time(&self) -> Option<f64> {
        match self {
            FieldValue::SfTime(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::SfString(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            FieldValue::SfNode(v) => *v,
            _ => None,
        }
    }

    #[inline]
    pub fn as_vec2f(&self) -> Option<Vec2> {
        match self {
            FieldValue::SfVec2f(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_vec3f(&self) -> Option<Vec3> {
        match self {
            FieldValue::SfVec3f(v) | FieldValue::SfColor(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_rotation(&self) -> Option<SfRotation> {
        match self {
            FieldValue::SfRotation(v) => Some(*v),
            _ => None,
        }
    }

    /// Node ids referenced by this value (SFNode or MFNode), for graph
    /// traversal.
    pub fn node_refs(&self) -> &[NodeId] {
        match self {
            FieldValue::SfNode(Some(id)) => std::slice::from_ref(id),
            FieldValue::MfNode(buf) => buf,
            _ => &[],
        }
    }
}

// -------------------- Text rendering --------------------

fn write_string_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            _ => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

fn write_mf<T, F>(f: &mut fmt::Formatter<'_>, items: &[T], mut each: F) -> fmt::Result
where
    F: FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
{
    write!(f, "[ ")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        each(f, item)?;
    }
    write!(f, " ]")
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::SfBool(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
            FieldValue::SfColor(v) | FieldValue::SfVec3f(v) => {
                write!(f, "{} {} {}", v.x, v.y, v.z)
            }
            FieldValue::SfFloat(v) => write!(f, "{v}"),
            FieldValue::SfImage(v) => write!(f, "{v}"),
            FieldValue::SfInt32(v) => write!(f, "{v}"),
            FieldValue::SfNode(None) => write!(f, "NULL"),
            FieldValue::SfNode(Some(id)) => write!(f, "<node {id}>"),
            FieldValue::SfRotation(v) => write!(f, "{v}"),
            FieldValue::SfString(v) => write_string_escaped(f, v),
            FieldValue::SfTime(v) => write!(f, "{v}"),
            FieldValue::SfVec2f(v) => write!(f, "{} {}", v.x, v.y),
            FieldValue::MfColor(buf) | FieldValue::MfVec3f(buf) => {
                write_mf(f, buf, |f, v| write!(f, "{} {} {}", v.x, v.y, v.z))
            }
            FieldValue::MfFloat(buf) => write_mf(f, buf, |f, v| write!(f, "{v}")),
            FieldValue::MfInt32(buf) => write_mf(f, buf, |f, v| write!(f, "{v}")),
            FieldValue::MfNode(buf) => write_mf(f, buf, |f, v| write!(f, "<node {v}>")),
            FieldValue::MfRotation(buf) => write_mf(f, buf, |f, v| write!(f, "{v}")),
            FieldValue::MfString(buf) => write_mf(f, buf, |f, v| write_string_escaped(f, v)),
            FieldValue::MfTime(buf) => write_mf(f, buf, |f, v| write!(f, "{v}")),
            FieldValue::MfVec2f(buf) => write_mf(f, buf, |f, v| write!(f, "{} {}", v.x, v.y)),
        }
    }
}
