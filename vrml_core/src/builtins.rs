//! Interface tables for the base-profile node set.

use glam::Vec3;
use vrml_field::{FieldKind, FieldValue};

use crate::bindable::BindableKind;
use crate::error::VrmlError;
use crate::node_type::{GeometryKind, InterpolatorKind, NodeKind, NodeType};
use crate::registry::TypeRegistry;

use FieldKind::*;

fn must(result: Result<(), VrmlError>) {
    if let Err(e) = result {
        unreachable!("builtin declaration: {e}");
    }
}

fn field(ty: &mut NodeType, name: &str, kind: FieldKind, default: Option<FieldValue>) {
    must(ty.add_field(name, kind, default));
}

fn exposed(ty: &mut NodeType, name: &str, kind: FieldKind, default: Option<FieldValue>) {
    must(ty.add_exposed_field(name, kind, default));
}

fn event_in(ty: &mut NodeType, name: &str, kind: FieldKind) {
    must(ty.add_event_in(name, kind));
}

fn event_out(ty: &mut NodeType, name: &str, kind: FieldKind) {
    must(ty.add_event_out(name, kind));
}

fn vec3(x: f32, y: f32, z: f32) -> Option<FieldValue> {
    Some(FieldValue::SfVec3f(Vec3::new(x, y, z)))
}

fn color(r: f32, g: f32, b: f32) -> Option<FieldValue> {
    Some(FieldValue::SfColor(Vec3::new(r, g, b)))
}

fn float(v: f32) -> Option<FieldValue> {
    Some(FieldValue::SfFloat(v))
}

fn boolean(v: bool) -> Option<FieldValue> {
    Some(FieldValue::SfBool(v))
}

// -------------------- grouping --------------------

fn grouping_base(ty: &mut NodeType) {
    event_in(ty, "addChildren", MfNode);
    event_in(ty, "removeChildren", MfNode);
    exposed(ty, "children", MfNode, None);
    field(ty, "bboxCenter", SfVec3f, None);
    field(ty, "bboxSize", SfVec3f, vec3(-1.0, -1.0, -1.0));
}

fn group() -> NodeType {
    let mut ty = NodeType::new("Group", NodeKind::Grouping);
    grouping_base(&mut ty);
    ty
}

fn transform() -> NodeType {
    let mut ty = NodeType::new("Transform", NodeKind::Grouping);
    grouping_base(&mut ty);
    exposed(&mut ty, "center", SfVec3f, None);
    exposed(&mut ty, "rotation", SfRotation, None);
    exposed(&mut ty, "scale", SfVec3f, vec3(1.0, 1.0, 1.0));
    exposed(&mut ty, "scaleOrientation", SfRotation, None);
    exposed(&mut ty, "translation", SfVec3f, None);
    ty
}

fn switch() -> NodeType {
    let mut ty = NodeType::new("Switch", NodeKind::Grouping);
    exposed(&mut ty, "choice", MfNode, None);
    exposed(
        &mut ty,
        "whichChoice",
        SfInt32,
        Some(FieldValue::SfInt32(-1)),
    );
    ty
}

// -------------------- shape and attributes --------------------

fn shape() -> NodeType {
    let mut ty = NodeType::new("Shape", NodeKind::Shape);
    exposed(&mut ty, "appearance", SfNode, None);
    exposed(&mut ty, "geometry", SfNode, None);
    ty
}

fn appearance() -> NodeType {
    let mut ty = NodeType::new("Appearance", NodeKind::Attribute);
    exposed(&mut ty, "material", SfNode, None);
    exposed(&mut ty, "texture", SfNode, None);
    exposed(&mut ty, "textureTransform", SfNode, None);
    ty
}

fn material() -> NodeType {
    let mut ty = NodeType::new("Material", NodeKind::Attribute);
    exposed(&mut ty, "ambientIntensity", SfFloat, float(0.2));
    exposed(&mut ty, "diffuseColor", SfColor, color(0.8, 0.8, 0.8));
    exposed(&mut ty, "emissiveColor", SfColor, None);
    exposed(&mut ty, "shininess", SfFloat, float(0.2));
    exposed(&mut ty, "specularColor", SfColor, None);
    exposed(&mut ty, "transparency", SfFloat, None);
    ty
}

fn coordinate() -> NodeType {
    let mut ty = NodeType::new("Coordinate", NodeKind::Attribute);
    exposed(&mut ty, "point", MfVec3f, None);
    ty
}

fn color_node() -> NodeType {
    let mut ty = NodeType::new("Color", NodeKind::Attribute);
    exposed(&mut ty, "color", MfColor, None);
    ty
}

fn normal() -> NodeType {
    let mut ty = NodeType::new("Normal", NodeKind::Attribute);
    exposed(&mut ty, "vector", MfVec3f, None);
    ty
}

// -------------------- geometry --------------------

fn box_geometry() -> NodeType {
    let mut ty = NodeType::new("Box", NodeKind::Geometry(GeometryKind::Box));
    field(&mut ty, "size", SfVec3f, vec3(2.0, 2.0, 2.0));
    ty
}

fn sphere() -> NodeType {
    let mut ty = NodeType::new("Sphere", NodeKind::Geometry(GeometryKind::Sphere));
    field(&mut ty, "radius", SfFloat, float(1.0));
    ty
}

fn cone() -> NodeType {
    let mut ty = NodeType::new("Cone", NodeKind::Geometry(GeometryKind::Cone));
    field(&mut ty, "bottomRadius", SfFloat, float(1.0));
    field(&mut ty, "height", SfFloat, float(2.0));
    field(&mut ty, "side", SfBool, boolean(true));
    field(&mut ty, "bottom", SfBool, boolean(true));
    ty
}

fn cylinder() -> NodeType {
    let mut ty = NodeType::new("Cylinder", NodeKind::Geometry(GeometryKind::Cylinder));
    field(&mut ty, "bottom", SfBool, boolean(true));
    field(&mut ty, "height", SfFloat, float(2.0));
    field(&mut ty, "radius", SfFloat, float(1.0));
    field(&mut ty, "side", SfBool, boolean(true));
    field(&mut ty, "top", SfBool, boolean(true));
    ty
}

// -------------------- lights --------------------

fn light_base(ty: &mut NodeType) {
    exposed(ty, "ambientIntensity", SfFloat, None);
    exposed(ty, "color", SfColor, color(1.0, 1.0, 1.0));
    exposed(ty, "intensity", SfFloat, float(1.0));
    exposed(ty, "on", SfBool, boolean(true));
}

fn directional_light() -> NodeType {
    let mut ty = NodeType::new("DirectionalLight", NodeKind::Light);
    light_base(&mut ty);
    exposed(&mut ty, "direction", SfVec3f, vec3(0.0, 0.0, -1.0));
    ty
}

fn point_light() -> NodeType {
    let mut ty = NodeType::new("PointLight", NodeKind::Light);
    light_base(&mut ty);
    exposed(&mut ty, "attenuation", SfVec3f, vec3(1.0, 0.0, 0.0));
    exposed(&mut ty, "location", SfVec3f, None);
    exposed(&mut ty, "radius", SfFloat, float(100.0));
    ty
}

fn spot_light() -> NodeType {
    let mut ty = NodeType::new("SpotLight", NodeKind::Light);
    light_base(&mut ty);
    exposed(&mut ty, "attenuation", SfVec3f, vec3(1.0, 0.0, 0.0));
    exposed(&mut ty, "beamWidth", SfFloat, float(1.570796));
    exposed(&mut ty, "cutOffAngle", SfFloat, float(0.785398));
    exposed(&mut ty, "direction", SfVec3f, vec3(0.0, 0.0, -1.0));
    exposed(&mut ty, "location", SfVec3f, None);
    exposed(&mut ty, "radius", SfFloat, float(100.0));
    ty
}

// -------------------- bindables --------------------

fn bindable_base(ty: &mut NodeType) {
    event_in(ty, "set_bind", SfBool);
    event_out(ty, "isBound", SfBool);
}

fn viewpoint() -> NodeType {
    let mut ty = NodeType::new("Viewpoint", NodeKind::Bindable(BindableKind::Viewpoint));
    bindable_base(&mut ty);
    exposed(&mut ty, "fieldOfView", SfFloat, float(0.785398));
    exposed(&mut ty, "jump", SfBool, boolean(true));
    exposed(&mut ty, "orientation", SfRotation, None);
    exposed(&mut ty, "position", SfVec3f, vec3(0.0, 0.0, 10.0));
    field(&mut ty, "description", SfString, None);
    event_out(&mut ty, "bindTime", SfTime);
    ty
}

fn background() -> NodeType {
    let mut ty = NodeType::new("Background", NodeKind::Bindable(BindableKind::Background));
    bindable_base(&mut ty);
    exposed(&mut ty, "groundAngle", MfFloat, None);
    exposed(&mut ty, "groundColor", MfColor, None);
    for url in [
        "backUrl",
        "bottomUrl",
        "frontUrl",
        "leftUrl",
        "rightUrl",
        "topUrl",
    ] {
        exposed(&mut ty, url, MfString, None);
    }
    exposed(&mut ty, "skyAngle", MfFloat, None);
    exposed(
        &mut ty,
        "skyColor",
        MfColor,
        Some(FieldValue::mf_color(&[Vec3::ZERO])),
    );
    ty
}

fn fog() -> NodeType {
    let mut ty = NodeType::new("Fog", NodeKind::Bindable(BindableKind::Fog));
    bindable_base(&mut ty);
    exposed(&mut ty, "color", SfColor, color(1.0, 1.0, 1.0));
    exposed(
        &mut ty,
        "fogType",
        SfString,
        Some(FieldValue::SfString("LINEAR".to_string())),
    );
    exposed(&mut ty, "visibilityRange", SfFloat, None);
    ty
}

fn navigation_info() -> NodeType {
    let mut ty = NodeType::new(
        "NavigationInfo",
        NodeKind::Bindable(BindableKind::NavigationInfo),
    );
    bindable_base(&mut ty);
    exposed(
        &mut ty,
        "avatarSize",
        MfFloat,
        Some(FieldValue::mf_float(&[0.25, 1.6, 0.75])),
    );
    exposed(&mut ty, "headlight", SfBool, boolean(true));
    exposed(&mut ty, "speed", SfFloat, float(1.0));
    exposed(
        &mut ty,
        "type",
        MfString,
        Some(FieldValue::mf_string(&[
            "WALK".to_string(),
            "ANY".to_string(),
        ])),
    );
    exposed(&mut ty, "visibilityLimit", SfFloat, None);
    ty
}

// -------------------- interpolators --------------------

fn interpolator(
    name: &str,
    which: InterpolatorKind,
    key_value: FieldKind,
    out: FieldKind,
) -> NodeType {
    let mut ty = NodeType::new(name, NodeKind::Interpolator(which));
    event_in(&mut ty, "set_fraction", SfFloat);
    exposed(&mut ty, "key", MfFloat, None);
    exposed(&mut ty, "keyValue", key_value, None);
    event_out(&mut ty, "value_changed", out);
    ty
}

// -------------------- misc --------------------

fn world_info() -> NodeType {
    let mut ty = NodeType::new("WorldInfo", NodeKind::Info);
    field(&mut ty, "info", MfString, None);
    field(&mut ty, "title", SfString, None);
    ty
}

/// Install every base-profile descriptor into `registry`.
pub fn install(registry: &mut TypeRegistry) {
    use InterpolatorKind as I;

    let types = [
        group(),
        transform(),
        switch(),
        shape(),
        appearance(),
        material(),
        coordinate(),
        color_node(),
        normal(),
        box_geometry(),
        sphere(),
        cone(),
        cylinder(),
        directional_light(),
        point_light(),
        spot_light(),
        viewpoint(),
        background(),
        fog(),
        navigation_info(),
        interpolator("ScalarInterpolator", I::Scalar, MfFloat, SfFloat),
        interpolator("ColorInterpolator", I::Color, MfColor, SfColor),
        interpolator("PositionInterpolator", I::Position, MfVec3f, SfVec3f),
        interpolator("OrientationInterpolator", I::Orientation, MfRotation, SfRotation),
        interpolator("CoordinateInterpolator", I::Coordinate, MfVec3f, MfVec3f),
        world_info(),
    ];
    for ty in types {
        registry.register(ty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_declares_the_grouping_interfaces() {
        let mut reg = TypeRegistry::new();
        install(&mut reg);
        let ty = reg.get("Transform").unwrap();
        assert_eq!(ty.event_in_kind("addChildren"), Some(MfNode));
        assert_eq!(ty.field_kind("children"), Some(MfNode));
        assert_eq!(ty.field_kind("translation"), Some(SfVec3f));
        assert_eq!(
            ty.field_default("scale"),
            Some(FieldValue::SfVec3f(Vec3::ONE))
        );
    }

    #[test]
    fn bindables_share_the_bind_protocol() {
        let mut reg = TypeRegistry::new();
        install(&mut reg);
        for name in ["Viewpoint", "Background", "Fog", "NavigationInfo"] {
            let ty = reg.get(name).unwrap();
            assert_eq!(ty.event_in_kind("set_bind"), Some(SfBool), "{name}");
            assert_eq!(ty.event_out_kind("isBound"), Some(SfBool), "{name}");
            assert!(matches!(ty.kind(), NodeKind::Bindable(_)), "{name}");
        }
    }

    #[test]
    fn interpolators_expose_the_common_surface() {
        let mut reg = TypeRegistry::new();
        install(&mut reg);
        let ty = reg.get("OrientationInterpolator").unwrap();
        assert_eq!(ty.event_in_kind("set_fraction"), Some(SfFloat));
        assert_eq!(ty.field_kind("key"), Some(MfFloat));
        assert_eq!(ty.field_kind("keyValue"), Some(MfRotation));
        assert_eq!(ty.event_out_kind("value_changed"), Some(SfRotation));
        assert!(!ty.kind().field_affects_geometry("key"));
    }

    #[test]
    fn material_defaults_match_the_declared_values() {
        let mut reg = TypeRegistry::new();
        install(&mut reg);
        let ty = reg.get("Material").unwrap();
        assert_eq!(
            ty.field_default("diffuseColor"),
            Some(FieldValue::SfColor(Vec3::splat(0.8)))
        );
        assert_eq!(ty.field_default("transparency"), Some(FieldValue::SfFloat(0.0)));
    }
}
