use crate::animatable::AnimatableValue;
use crate::error::FieldError;
use crate::parser::ParseContext;
use crate::shape::{ShapeData, ShapeItem};
use glam::{Mat3, Vec2, Vec3, Vec4};
use lottie_data::model::{self as data, TextDocument};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::ops::Deref;

/// Layer type as given by the `ty` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    Precomp,
    Solid,
    Image,
    Null,
    Shape,
    Text,
    Unknown,
}

impl LayerType {
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => LayerType::Precomp,
            Some(1) => LayerType::Solid,
            Some(2) => LayerType::Image,
            Some(3) => LayerType::Null,
            Some(4) => LayerType::Shape,
            Some(5) => LayerType::Text,
            _ => LayerType::Unknown,
        }
    }
}

/// Type-specific payload of a layer.
#[derive(Debug, Clone)]
pub enum LayerKind {
    Shape {
        shapes: Vec<ShapeItem>,
    },
    Image {
        ref_id: String,
    },
    Solid {
        color: Vec4,
        width: f32,
        height: f32,
    },
    Null,
    Text {
        document: AnimatableValue<TextDocument>,
    },
    PrecompReference {
        ref_id: String,
        width: f32,
        height: f32,
    },
    /// Kept so children can still resolve it as a parent.
    Unknown {
        type_code: Option<i64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    pub fn from_code(bm: Option<u8>) -> Self {
        match bm.unwrap_or(0) {
            0 => BlendMode::Normal,
            1 => BlendMode::Multiply,
            2 => BlendMode::Screen,
            3 => BlendMode::Overlay,
            4 => BlendMode::Darken,
            5 => BlendMode::Lighten,
            6 => BlendMode::ColorDodge,
            7 => BlendMode::ColorBurn,
            8 => BlendMode::HardLight,
            9 => BlendMode::SoftLight,
            10 => BlendMode::Difference,
            11 => BlendMode::Exclusion,
            12 => BlendMode::Hue,
            13 => BlendMode::Saturation,
            14 => BlendMode::Color,
            15 => BlendMode::Luminosity,
            _ => BlendMode::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskMode {
    None,
    Add,
    Subtract,
    Intersect,
    Lighten,
    Darken,
    Difference,
}

#[derive(Debug, Clone)]
pub struct Mask {
    pub name: String,
    pub mode: MaskMode,
    pub inverted: bool,
    pub path: AnimatableValue<ShapeData>,
    pub opacity: AnimatableValue<f32>,
}

impl Mask {
    fn from_data(raw: &data::MaskProperties, ctx: &ParseContext) -> Result<Self, FieldError> {
        let scale = ctx.scale;
        let mode = match raw.mode.as_deref() {
            Some("a") => MaskMode::Add,
            Some("s") => MaskMode::Subtract,
            Some("i") => MaskMode::Intersect,
            Some("l") => MaskMode::Lighten,
            Some("d") => MaskMode::Darken,
            Some("f") => MaskMode::Difference,
            _ => MaskMode::None,
        };
        Ok(Mask {
            name: raw.nm.clone().unwrap_or_default(),
            mode,
            inverted: raw.inv,
            path: AnimatableValue::from_property(&raw.pt, ShapeData::default(), |b| {
                ShapeData::from_data(b, scale)
            })?,
            opacity: AnimatableValue::from_property(&raw.o, 100.0, |v| *v)?,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Position {
    Unified(AnimatableValue<Vec3>),
    Split {
        x: AnimatableValue<f32>,
        y: AnimatableValue<f32>,
        z: Option<AnimatableValue<f32>>,
    },
}

/// Animated 2D transform of a layer or shape group.
///
/// Angles are in degrees and scale is in percent, as authored.
#[derive(Debug, Clone)]
pub struct Transform {
    pub anchor: AnimatableValue<Vec3>,
    pub position: Position,
    pub scale: AnimatableValue<Vec3>,
    pub rotation: AnimatableValue<f32>,
    pub opacity: AnimatableValue<f32>,
    pub skew: AnimatableValue<f32>,
    pub skew_axis: AnimatableValue<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            anchor: AnimatableValue::fixed(Vec3::ZERO),
            position: Position::Unified(AnimatableValue::fixed(Vec3::ZERO)),
            scale: AnimatableValue::fixed(Vec3::splat(100.0)),
            rotation: AnimatableValue::fixed(0.0),
            opacity: AnimatableValue::fixed(100.0),
            skew: AnimatableValue::fixed(0.0),
            skew_axis: AnimatableValue::fixed(0.0),
        }
    }
}

impl Transform {
    pub(crate) fn from_data(ks: &data::Transform, ctx: &ParseContext) -> Result<Self, FieldError> {
        let scale = ctx.scale;
        let scaled = move |v: &data::Vec3DefaultZero| Vec3::from(v.0) * scale;
        let degrees = |v: &f32| *v;

        let position = match &ks.p {
            data::PositionProperty::Unified(p) => Position::Unified(
                AnimatableValue::from_property(p, Vec3::ZERO, scaled)?
                    .scale_spatial_tangents(scale),
            ),
            data::PositionProperty::Split { x, y, z } => Position::Split {
                x: AnimatableValue::from_property(x, 0.0, |v| v * scale)?,
                y: AnimatableValue::from_property(y, 0.0, |v| v * scale)?,
                z: z.as_ref()
                    .map(|z| AnimatableValue::from_property(z, 0.0, |v| v * scale))
                    .transpose()?,
            },
        };

        Ok(Transform {
            anchor: AnimatableValue::from_property(&ks.a, Vec3::ZERO, scaled)?
                .scale_spatial_tangents(scale),
            position,
            scale: AnimatableValue::from_property(&ks.s, Vec3::splat(100.0), |v| Vec3::from(v.0))?,
            rotation: AnimatableValue::from_property(&ks.rz, 0.0, degrees)?,
            opacity: AnimatableValue::from_property(&ks.o, 100.0, degrees)?,
            skew: AnimatableValue::from_property(&ks.sk, 0.0, degrees)?,
            skew_axis: AnimatableValue::from_property(&ks.sa, 0.0, degrees)?,
        })
    }

    pub fn position_at(&self, frame: f32) -> Vec3 {
        match &self.position {
            Position::Unified(p) => p.value_at(frame),
            Position::Split { x, y, z } => Vec3::new(
                x.value_at(frame),
                y.value_at(frame),
                z.as_ref().map_or(0.0, |z| z.value_at(frame)),
            ),
        }
    }

    /// Opacity in `0..=1`.
    pub fn opacity_at(&self, frame: f32) -> f32 {
        (self.opacity.value_at(frame) / 100.0).clamp(0.0, 1.0)
    }

    /// Local-to-parent matrix: translate, rotate, skew, scale, then anchor offset.
    pub fn matrix_at(&self, frame: f32) -> Mat3 {
        let anchor = self.anchor.value_at(frame).truncate();
        let pos = self.position_at(frame).truncate();
        let scale = self.scale.value_at(frame).truncate() / 100.0;
        let rotation = self.rotation.value_at(frame).to_radians();
        let skew = self.skew.value_at(frame).to_radians();
        let skew_axis = self.skew_axis.value_at(frame).to_radians();

        let mat_t = Mat3::from_translation(pos);
        // Lottie rotates clockwise; glam is counter-clockwise for positive angles.
        let mat_r = Mat3::from_rotation_z(-rotation);
        let mat_skew = skew_matrix(skew, skew_axis);
        let mat_s = Mat3::from_scale(scale);
        let mat_a = Mat3::from_translation(-anchor);

        mat_t * mat_r * mat_skew * mat_s * mat_a
    }
}

fn skew_matrix(skew: f32, skew_axis: f32) -> Mat3 {
    if skew == 0.0 {
        return Mat3::IDENTITY;
    }
    let shear_x = Mat3::from_cols(
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(skew.tan(), 1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
    );
    if skew_axis.abs() < 0.01 {
        return shear_x;
    }
    // Arbitrary axis: rotate onto X, shear, rotate back.
    Mat3::from_rotation_z(skew_axis) * shear_x * Mat3::from_rotation_z(-skew_axis)
}

/// One element of a layer list.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Source `ind`; `-1` when absent.
    pub id: i64,
    pub name: String,
    pub kind: LayerKind,
    pub parent_id: Option<i64>,
    pub in_frame: f32,
    pub out_frame: f32,
    pub start_time: f32,
    pub time_stretch: f32,
    pub blend_mode: BlendMode,
    pub hidden: bool,
    pub transform: Transform,
    pub masks: Vec<Mask>,
    pub time_remap: Option<AnimatableValue<f32>>,
}

impl Layer {
    pub fn layer_type(&self) -> LayerType {
        match &self.kind {
            LayerKind::Shape { .. } => LayerType::Shape,
            LayerKind::Image { .. } => LayerType::Image,
            LayerKind::Solid { .. } => LayerType::Solid,
            LayerKind::Null => LayerType::Null,
            LayerKind::Text { .. } => LayerType::Text,
            LayerKind::PrecompReference { .. } => LayerType::Precomp,
            LayerKind::Unknown { .. } => LayerType::Unknown,
        }
    }

    /// Whether the layer is shown at composition `frame`.
    ///
    /// `in_frame` is inclusive and `out_frame` exclusive.
    pub fn is_visible_at(&self, frame: f32) -> bool {
        !self.hidden && frame >= self.in_frame && frame < self.out_frame
    }

    /// Maps a composition frame into the layer's own timeline.
    pub fn local_frame(&self, frame: f32) -> f32 {
        let stretch = if self.time_stretch == 0.0 {
            1.0
        } else {
            self.time_stretch
        };
        (frame - self.start_time) / stretch
    }

    pub(crate) fn from_data(raw: &data::Layer, ctx: &ParseContext) -> Result<Self, FieldError> {
        let scale = ctx.scale;
        let ref_id = || {
            raw.ref_id
                .clone()
                .ok_or_else(|| FieldError::new("missing field `refId`"))
        };

        let kind = match LayerType::from_code(raw.ty) {
            LayerType::Precomp => LayerKind::PrecompReference {
                ref_id: ref_id()?,
                width: raw.w.unwrap_or(0.0) * scale,
                height: raw.h.unwrap_or(0.0) * scale,
            },
            LayerType::Solid => LayerKind::Solid {
                color: match &raw.color {
                    Some(hex) => parse_hex_color(hex)?,
                    None => Vec4::new(0.0, 0.0, 0.0, 1.0),
                },
                width: raw.sw.unwrap_or(0.0) * scale,
                height: raw.sh.unwrap_or(0.0) * scale,
            },
            LayerType::Image => LayerKind::Image { ref_id: ref_id()? },
            LayerType::Null => LayerKind::Null,
            LayerType::Shape => LayerKind::Shape {
                shapes: ShapeItem::list_from_data(raw.shapes.as_deref().unwrap_or(&[]), ctx)?,
            },
            LayerType::Text => LayerKind::Text {
                document: match &raw.t {
                    Some(text) => AnimatableValue::from_property(
                        &text.d,
                        TextDocument::default(),
                        |d: &TextDocument| d.clone(),
                    )?,
                    None => AnimatableValue::fixed(TextDocument::default()),
                },
            },
            LayerType::Unknown => LayerKind::Unknown { type_code: raw.ty },
        };

        let masks = raw
            .masks_properties
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|m| Mask::from_data(m, ctx))
            .collect::<Result<Vec<_>, _>>()?;

        let time_remap = raw
            .tm
            .as_ref()
            .map(|tm| AnimatableValue::from_property(tm, 0.0, |v| *v))
            .transpose()?;

        Ok(Layer {
            id: raw.ind.unwrap_or(-1),
            name: raw.nm.clone().unwrap_or_default(),
            kind,
            parent_id: raw.parent,
            in_frame: raw.ip,
            out_frame: raw.op,
            start_time: raw.st,
            time_stretch: raw.sr,
            blend_mode: BlendMode::from_code(raw.bm),
            hidden: raw.hd.unwrap_or(false),
            transform: Transform::from_data(&raw.ks, ctx)?,
            masks,
            time_remap,
        })
    }
}

/// `#rrggbb` or `#rrggbbaa` into RGBA in `0..=1`.
fn parse_hex_color(hex: &str) -> Result<Vec4, FieldError> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    let invalid = || FieldError(format!("invalid solid color `{hex}`"));
    if !matches!(digits.len(), 6 | 8) || !digits.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map(|c| c as f32 / 255.0)
            .map_err(|_| invalid())
    };
    let alpha = if digits.len() == 8 { channel(6)? } else { 1.0 };
    Ok(Vec4::new(channel(0)?, channel(2)?, channel(4)?, alpha))
}

/// Ordered layers of one composition or precomposition, indexed by id.
///
/// Layers are stored in document order. Parents are found through the id
/// index on demand, so a child may precede its parent in the list.
#[derive(Debug, Clone, Default)]
pub struct LayerList {
    layers: Vec<Layer>,
    index: HashMap<i64, usize>,
}

impl LayerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `layer`; returns `false` when its id is already taken.
    ///
    /// The layer is stored either way but the index keeps pointing at the
    /// first layer with that id. Layers without an id (negative) are not indexed.
    pub fn push(&mut self, layer: Layer) -> bool {
        let position = self.layers.len();
        let fresh = if layer.id < 0 {
            true
        } else {
            match self.index.entry(layer.id) {
                Entry::Vacant(slot) => {
                    slot.insert(position);
                    true
                }
                Entry::Occupied(_) => false,
            }
        };
        self.layers.push(layer);
        fresh
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn by_id(&self, id: i64) -> Option<&Layer> {
        self.index.get(&id).map(|&idx| &self.layers[idx])
    }

    /// Parent of `layer` in this list. A dangling or self-referencing parent id means no parent.
    pub fn parent_of(&self, layer: &Layer) -> Option<&Layer> {
        layer
            .parent_id
            .filter(|&parent| parent != layer.id)
            .and_then(|parent| self.by_id(parent))
    }

    /// Walks the parent chain from `layer` outwards, stopping at the first repeated id.
    pub fn ancestors<'a>(&'a self, layer: &'a Layer) -> Ancestors<'a> {
        Ancestors {
            list: self,
            current: layer,
            visited: HashSet::from([layer.id]),
        }
    }

    /// Layer-to-composition matrix at `frame`, including every ancestor's transform.
    pub fn world_matrix_at(&self, layer: &Layer, frame: f32) -> Mat3 {
        self.ancestors(layer)
            .fold(layer.transform.matrix_at(frame), |matrix, parent| {
                parent.transform.matrix_at(frame) * matrix
            })
    }

    /// Maps `point` in `layer` space to composition space.
    pub fn to_composition_space(&self, layer: &Layer, point: Vec2, frame: f32) -> Vec2 {
        self.world_matrix_at(layer, frame).transform_point2(point)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }
}

impl Deref for LayerList {
    type Target = [Layer];

    fn deref(&self) -> &[Layer] {
        &self.layers
    }
}

impl<'a> IntoIterator for &'a LayerList {
    type Item = &'a Layer;
    type IntoIter = std::slice::Iter<'a, Layer>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

pub struct Ancestors<'a> {
    list: &'a LayerList,
    current: &'a Layer,
    visited: HashSet<i64>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Layer;

    fn next(&mut self) -> Option<&'a Layer> {
        let parent = self.list.parent_of(self.current)?;
        if !self.visited.insert(parent.id) {
            return None;
        }
        self.current = parent;
        Some(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer(value: serde_json::Value) -> Layer {
        let raw: data::Layer = serde_json::from_value(value).unwrap();
        Layer::from_data(&raw, &ParseContext { scale: 1.0 }).unwrap()
    }

    fn list(layers: Vec<serde_json::Value>) -> LayerList {
        let mut list = LayerList::new();
        for l in layers {
            list.push(layer(l));
        }
        list
    }

    #[test]
    fn test_kind_selected_by_type_code() {
        let solid = layer(json!({ "ty": 1, "ind": 1, "sc": "#ff0000", "sw": 20, "sh": 10 }));
        assert_eq!(solid.layer_type(), LayerType::Solid);
        let LayerKind::Solid { color, width, .. } = solid.kind else {
            panic!("expected solid");
        };
        assert_eq!(color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(width, 20.0);

        assert_eq!(layer(json!({ "ty": 3 })).layer_type(), LayerType::Null);
        assert_eq!(layer(json!({ "ty": 4, "shapes": [] })).layer_type(), LayerType::Shape);
        assert_eq!(layer(json!({ "ty": 0, "refId": "comp_0" })).layer_type(), LayerType::Precomp);
    }

    #[test]
    fn test_unknown_type_is_kept() {
        let l = layer(json!({ "ty": 13, "ind": 7, "nm": "Camera" }));
        assert!(matches!(l.kind, LayerKind::Unknown { type_code: Some(13) }));
        assert_eq!(l.id, 7);

        let missing = layer(json!({ "nm": "No type" }));
        assert!(matches!(missing.kind, LayerKind::Unknown { type_code: None }));
        assert_eq!(missing.id, -1);
    }

    #[test]
    fn test_image_layer_requires_ref_id() {
        let raw: data::Layer = serde_json::from_value(json!({ "ty": 2 })).unwrap();
        assert!(Layer::from_data(&raw, &ParseContext { scale: 1.0 }).is_err());
    }

    #[test]
    fn test_bad_solid_color_is_rejected() {
        let raw: data::Layer = serde_json::from_value(json!({ "ty": 1, "sc": "red" })).unwrap();
        assert!(Layer::from_data(&raw, &ParseContext { scale: 1.0 }).is_err());
    }

    #[test]
    fn test_position_and_anchor_are_scaled() {
        let raw: data::Layer = serde_json::from_value(json!({
            "ty": 3,
            "ks": { "p": { "k": [10, 20] }, "a": { "k": [1, 2] } }
        }))
        .unwrap();
        let l = Layer::from_data(&raw, &ParseContext { scale: 2.0 }).unwrap();
        assert_eq!(l.transform.position_at(0.0), Vec3::new(20.0, 40.0, 0.0));
        assert_eq!(l.transform.anchor.value_at(0.0), Vec3::new(2.0, 4.0, 0.0));
    }

    #[test]
    fn test_anchor_handles_are_scaled() {
        let raw: data::Layer = serde_json::from_value(json!({
            "ty": 3,
            "ks": { "a": { "a": 1, "k": [
                { "t": 0, "s": [0, 0], "to": [2, 0], "ti": [2, 0] },
                { "t": 10, "s": [10, 10] }
            ] } }
        }))
        .unwrap();
        let l = Layer::from_data(&raw, &ParseContext { scale: 2.0 }).unwrap();
        let tangents = l.transform.anchor.keyframes()[0].spatial.unwrap();
        assert_eq!(tangents.out_tangent, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(tangents.in_tangent, Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_matrix_translates_and_scales() {
        let l = layer(json!({
            "ty": 3,
            "ks": { "p": { "k": [100, 50] }, "s": { "k": [200, 200] } }
        }));
        let p = l.transform.matrix_at(0.0).transform_point2(Vec2::new(1.0, 1.0));
        assert!((p - Vec2::new(102.0, 52.0)).length() < 1e-4);
    }

    #[test]
    fn test_parent_resolution_is_lazy() {
        // Child listed before its parent.
        let layers = list(vec![
            json!({ "ty": 3, "ind": 2, "parent": 1 }),
            json!({ "ty": 3, "ind": 1 }),
        ]);
        let child = &layers[0];
        assert_eq!(layers.parent_of(child).map(|p| p.id), Some(1));
    }

    #[test]
    fn test_dangling_parent_is_no_parent() {
        let layers = list(vec![json!({ "ty": 3, "ind": 1, "parent": 99 })]);
        assert!(layers.parent_of(&layers[0]).is_none());
        assert_eq!(layers.ancestors(&layers[0]).count(), 0);
    }

    #[test]
    fn test_ancestor_cycle_terminates() {
        let layers = list(vec![
            json!({ "ty": 3, "ind": 1, "parent": 2 }),
            json!({ "ty": 3, "ind": 2, "parent": 1 }),
        ]);
        let chain: Vec<i64> = layers.ancestors(&layers[0]).map(|l| l.id).collect();
        assert_eq!(chain, vec![2]);
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let mut layers = LayerList::new();
        assert!(layers.push(layer(json!({ "ty": 3, "ind": 1, "nm": "first" }))));
        assert!(!layers.push(layer(json!({ "ty": 3, "ind": 1, "nm": "second" }))));
        assert_eq!(layers.len(), 2);
        assert_eq!(layers.by_id(1).map(|l| l.name.as_str()), Some("first"));
    }

    #[test]
    fn test_world_matrix_includes_parent() {
        let layers = list(vec![
            json!({ "ty": 3, "ind": 1, "ks": { "p": { "k": [10, 0] } } }),
            json!({ "ty": 3, "ind": 2, "parent": 1, "ks": { "p": { "k": [0, 5] } } }),
        ]);
        let p = layers.to_composition_space(&layers[1], Vec2::ZERO, 0.0);
        assert!((p - Vec2::new(10.0, 5.0)).length() < 1e-4);
    }

    #[test]
    fn test_visibility_window() {
        let l = layer(json!({ "ty": 3, "ip": 10, "op": 20 }));
        assert!(!l.is_visible_at(9.0));
        assert!(l.is_visible_at(10.0));
        assert!(!l.is_visible_at(20.0));
    }

    #[test]
    fn test_local_frame_applies_start_and_stretch() {
        let l = layer(json!({ "ty": 3, "st": 10, "sr": 2 }));
        assert_eq!(l.local_frame(30.0), 10.0);
    }
}
