use serde::{de::DeserializeOwned, de::SeqAccess, Deserialize, Deserializer, Serialize};
use std::fmt;

/// A single layer object as it appears in a `layers` array.
///
/// Every field is optional on the wire; the discriminator `ty` selects which
/// of the type-specific fields are meaningful.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Layer {
    // Common
    #[serde(default)]
    pub ty: Option<i64>, // 0=precomp, 1=solid, 2=image, 3=null, 4=shape, 5=text
    #[serde(default)]
    pub ind: Option<i64>,
    #[serde(default)]
    pub parent: Option<i64>,
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub ip: f32,
    #[serde(default)]
    pub op: f32,
    #[serde(default)]
    pub st: f32, // Start time, defaults to 0
    #[serde(default = "default_one")]
    pub sr: f32, // Time stretch (1.0 = normal, >1 = slower, <1 = faster)
    #[serde(default)]
    pub ks: Transform,
    #[serde(default)]
    pub tm: Option<Property<f32>>, // Time remap (precomp layers)
    #[serde(default)]
    pub hd: Option<bool>, // Hidden - if true, layer should not be rendered
    #[serde(default)]
    pub bm: Option<u8>, // Blend mode: 0=Normal, 1=Multiply, 2=Screen, etc.

    #[serde(default, rename = "masksProperties")]
    pub masks_properties: Option<Vec<MaskProperties>>,

    // Type specific (flattened manually as optional fields)
    #[serde(default, rename = "refId")]
    pub ref_id: Option<String>, // PreComp, Image
    #[serde(default)]
    pub w: Option<f32>, // PreComp
    #[serde(default)]
    pub h: Option<f32>, // PreComp
    #[serde(default, rename = "sc")]
    pub color: Option<String>, // Solid color
    #[serde(default)]
    pub sw: Option<f32>, // Solid width
    #[serde(default)]
    pub sh: Option<f32>, // Solid height
    #[serde(default)]
    pub shapes: Option<Vec<Shape>>, // Shape Layer
    #[serde(default)]
    pub t: Option<TextData>, // Text Layer
}

fn default_one() -> f32 {
    1.0
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MaskProperties {
    #[serde(default)]
    pub inv: bool,
    #[serde(default)]
    pub mode: Option<String>,
    pub pt: Property<BezierPath>,
    #[serde(default)]
    pub o: Property<f32>,
    #[serde(default)]
    pub nm: Option<String>,
}

// Shapes

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "ty")]
pub enum Shape {
    #[serde(rename = "gr")]
    Group(GroupShape),
    #[serde(rename = "rc")]
    Rect(RectShape),
    #[serde(rename = "el")]
    Ellipse(EllipseShape),
    #[serde(rename = "fl")]
    Fill(FillShape),
    #[serde(rename = "st")]
    Stroke(StrokeShape),
    #[serde(rename = "tr")]
    Transform(TransformShape),
    #[serde(rename = "sh")]
    Path(PathShape),
    #[serde(rename = "tm")]
    Trim(TrimShape),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GroupShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: Option<bool>,
    #[serde(default)]
    pub it: Vec<Shape>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RectShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub s: Property<Vec2>,
    pub p: Property<Vec2>,
    #[serde(default)]
    pub r: Property<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EllipseShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub s: Property<Vec2>,
    pub p: Property<Vec2>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FillShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub c: Property<Vec<f32>>,
    pub o: Property<f32>,
    #[serde(default)]
    pub r: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StrokeShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub c: Property<Vec<f32>>,
    pub w: Property<f32>,
    pub o: Property<f32>,
    #[serde(default)]
    pub lc: u8,
    #[serde(default)]
    pub lj: u8,
    #[serde(default)]
    pub ml: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PathShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: Option<bool>,
    pub ks: Property<BezierPath>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrimShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub s: Property<f32>,
    pub e: Property<f32>,
    pub o: Property<f32>,
    #[serde(default)]
    pub m: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransformShape {
    #[serde(flatten)]
    pub t: Transform,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Transform {
    #[serde(default)]
    pub a: Property<Vec3DefaultZero>, // Anchor: Vec3, default z=0
    #[serde(default)]
    pub p: PositionProperty, // Position: Vec3, default z=0
    #[serde(default)]
    pub s: Property<Vec3Scale>, // Scale: Vec3, default z=100
    #[serde(default, alias = "r")]
    pub rz: Property<f32>, // Rotation Z
    #[serde(default)]
    pub sk: Property<f32>, // Skew amount in degrees
    #[serde(default)]
    pub sa: Property<f32>, // Skew axis in degrees (0 = X axis, 90 = Y axis)
    #[serde(default)]
    pub o: Property<f32>, // Opacity
}

// Split must be tried first: `Property` ignores unknown keys, so a split
// object would otherwise match `Unified` with a missing `k`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum PositionProperty {
    Split {
        x: Property<f32>,
        y: Property<f32>,
        #[serde(default)]
        z: Option<Property<f32>>,
    },
    Unified(Property<Vec3DefaultZero>),
}

impl Default for PositionProperty {
    fn default() -> Self {
        PositionProperty::Unified(Property::default())
    }
}

/// An animatable property: either a static value or a keyframe list under `k`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Property<T> {
    #[serde(default)]
    pub a: u8,
    #[serde(default)]
    #[serde(bound(deserialize = "T: DeserializeOwned"))]
    pub k: Value<T>,
    #[serde(default)]
    pub ix: Option<u32>,
}

impl<T> Default for Property<T> {
    fn default() -> Self {
        Property {
            a: 0,
            k: Value::Default,
            ix: None,
        }
    }
}

impl<T> Property<T> {
    pub fn fixed(value: T) -> Self {
        Property {
            a: 0,
            k: Value::Static(value),
            ix: None,
        }
    }

    pub fn animated(keyframes: Vec<Keyframe<T>>) -> Self {
        Property {
            a: 1,
            k: Value::Animated(keyframes),
            ix: None,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub enum Value<T> {
    Default,
    Static(T),
    Animated(Vec<Keyframe<T>>),
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Value<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;

        if v.is_null() {
            return Ok(Value::Default);
        }

        // A keyframe list is an array of objects; try it first so a keyframe
        // error is reported instead of a confusing static-value error.
        let looks_animated = v.as_array().is_some_and(|arr| {
            !arr.is_empty() && arr.iter().all(|kf| kf.is_object() && kf.get("t").is_some())
        });
        if looks_animated {
            return serde_json::from_value::<Vec<Keyframe<T>>>(v)
                .map(Value::Animated)
                .map_err(serde::de::Error::custom);
        }

        if let Ok(val) = serde_json::from_value::<T>(v.clone()) {
            return Ok(Value::Static(val));
        }

        match serde_json::from_value::<Vec<T>>(v) {
            Ok(vec) => vec
                .into_iter()
                .next()
                .map(Value::Static)
                .ok_or_else(|| serde::de::Error::custom("empty property value")),
            Err(e) => Err(serde::de::Error::custom(format!(
                "property value is neither a static value nor a keyframe list: {e}"
            ))),
        }
    }
}

impl<T> Default for Value<T> {
    fn default() -> Self {
        Value::Default
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Keyframe<T> {
    pub t: f32,
    #[serde(default, deserialize_with = "deserialize_keyframe_value")]
    pub s: Option<T>,
    #[serde(default, deserialize_with = "deserialize_keyframe_value")]
    pub e: Option<T>,
    #[serde(default)]
    pub i: Option<BezierTangent>,
    #[serde(default)]
    pub o: Option<BezierTangent>,
    #[serde(default)]
    pub to: Option<Vec<f32>>,
    #[serde(default)]
    pub ti: Option<Vec<f32>>,
    #[serde(default)]
    pub h: Option<u8>,
}

impl<T> Keyframe<T> {
    /// A linear keyframe at `t` starting at `s`.
    pub fn at(t: f32, s: T) -> Self {
        Keyframe {
            t,
            s: Some(s),
            e: None,
            i: None,
            o: None,
            to: None,
            ti: None,
            h: None,
        }
    }
}

fn deserialize_keyframe_value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    if v.is_null() {
        return Ok(None);
    }

    if let Ok(val) = serde_json::from_value(v.clone()) {
        return Ok(Some(val));
    }

    match serde_json::from_value::<Vec<T>>(v) {
        Ok(vec) => Ok(vec.into_iter().next()),
        Err(e) => Err(serde::de::Error::custom(format!(
            "invalid keyframe value: {e}"
        ))),
    }
}

pub type Vec2 = [f32; 2];
pub type Vec3 = [f32; 3];

/// Bezier tangent control points for keyframe easing
/// Matches the JSON format: {"x": [0.48], "y": [1]} or {"x": 0.48, "y": 1}
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BezierTangent {
    #[serde(deserialize_with = "one_or_many")]
    pub x: Vec<f32>,
    #[serde(deserialize_with = "one_or_many")]
    pub y: Vec<f32>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(f32),
        Many(Vec<f32>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(v) => vec![v],
        OneOrMany::Many(v) => v,
    })
}

// Wrapper for Vec3 with Z defaulting to 0.0
#[derive(Debug, Clone, Serialize)]
pub struct Vec3DefaultZero(pub Vec3);

impl Default for Vec3DefaultZero {
    fn default() -> Self {
        Vec3DefaultZero([0.0, 0.0, 0.0])
    }
}

impl<'de> Deserialize<'de> for Vec3DefaultZero {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_seq(Vec3Visitor { default_z: 0.0 })
            .map(Vec3DefaultZero)
    }
}

// Wrapper for Vec3 with Z defaulting to 100.0 (for Scale)
#[derive(Debug, Clone, Serialize)]
pub struct Vec3Scale(pub Vec3);

impl Default for Vec3Scale {
    fn default() -> Self {
        Vec3Scale([100.0, 100.0, 100.0])
    }
}

impl<'de> Deserialize<'de> for Vec3Scale {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_seq(Vec3Visitor { default_z: 100.0 })
            .map(Vec3Scale)
    }
}

struct Vec3Visitor {
    default_z: f32,
}

impl<'de> serde::de::Visitor<'de> for Vec3Visitor {
    type Value = Vec3;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence of 2 or 3 floats")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let x = seq.next_element()?.unwrap_or(0.0);
        let y = seq.next_element()?.unwrap_or(0.0);
        let z = seq.next_element()?.unwrap_or(self.default_z);
        while seq.next_element::<f32>()?.is_some() {}
        Ok([x, y, z])
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BezierPath {
    #[serde(default)]
    pub c: bool,
    #[serde(default)]
    pub i: Vec<Vec2>,
    #[serde(default)]
    pub o: Vec<Vec2>,
    #[serde(default)]
    pub v: Vec<Vec2>,
}

// Fonts and glyphs

/// The `fonts` object: `{ "list": [...] }`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FontList {
    #[serde(default)]
    pub list: Vec<Font>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Font {
    #[serde(rename = "fName")]
    pub name: String,
    #[serde(default, rename = "fFamily")]
    pub family: String,
    #[serde(default, rename = "fStyle")]
    pub style: String,
    #[serde(default)]
    pub ascent: Option<f32>,
    #[serde(default, rename = "fPath")]
    pub path: Option<String>,
    #[serde(default)]
    pub origin: Option<u8>,
}

/// One entry of the `chars` array: a glyph outline for a character in a font.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FontCharacter {
    pub ch: String,
    #[serde(default, rename = "fFamily")]
    pub family: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub size: f32,
    #[serde(default)]
    pub w: f32,
    #[serde(default)]
    pub data: Option<CharData>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CharData {
    #[serde(default)]
    pub shapes: Vec<Shape>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Marker {
    #[serde(default)]
    pub cm: Option<String>,
    #[serde(default)]
    pub tm: Option<f32>,
    #[serde(default)]
    pub dr: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TextData {
    pub d: Property<TextDocument>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct TextDocument {
    #[serde(default)]
    pub t: String,
    #[serde(default)]
    pub f: String,
    #[serde(default)]
    pub s: f32,
    #[serde(default)]
    pub j: u8,
    #[serde(default)]
    pub tr: f32,
    #[serde(default)]
    pub lh: f32,
    #[serde(default)]
    pub ls: Option<f32>,
    #[serde(default)]
    pub fc: Vec<f32>,
    #[serde(default)]
    pub sc: Option<Vec<f32>>,
    #[serde(default)]
    pub sw: Option<f32>,
    #[serde(default)]
    pub of: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_scalar_accepts_bare_and_wrapped() {
        let bare: Property<f32> = serde_json::from_value(json!({ "a": 0, "k": 50 })).unwrap();
        let wrapped: Property<f32> = serde_json::from_value(json!({ "a": 0, "k": [50] })).unwrap();
        assert!(matches!(bare.k, Value::Static(v) if v == 50.0));
        assert!(matches!(wrapped.k, Value::Static(v) if v == 50.0));
    }

    #[test]
    fn test_animated_scalar_with_wrapped_values() {
        let prop: Property<f32> = serde_json::from_value(json!({
            "a": 1,
            "k": [
                { "t": 0, "s": [0], "o": { "x": [0.33], "y": [0] }, "i": { "x": 0.67, "y": 1 } },
                { "t": 10, "s": [100] }
            ]
        }))
        .unwrap();

        let Value::Animated(kfs) = prop.k else {
            panic!("expected keyframes");
        };
        assert_eq!(kfs.len(), 2);
        assert_eq!(kfs[0].s, Some(0.0));
        assert_eq!(kfs[1].s, Some(100.0));
        assert_eq!(kfs[0].i.as_ref().unwrap().x, vec![0.67]);
    }

    #[test]
    fn test_keyframe_without_time_is_rejected() {
        let result: Result<Property<f32>, _> =
            serde_json::from_value(json!({ "a": 1, "k": [{ "s": [0] }] }));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_property_value_is_rejected() {
        let result: Result<Property<f32>, _> = serde_json::from_value(json!({ "k": "fast" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_vec3_defaults() {
        let a: Vec3DefaultZero = serde_json::from_value(json!([1, 2])).unwrap();
        let s: Vec3Scale = serde_json::from_value(json!([50, 60])).unwrap();
        assert_eq!(a.0, [1.0, 2.0, 0.0]);
        assert_eq!(s.0, [50.0, 60.0, 100.0]);
    }

    #[test]
    fn test_unknown_shape_type_is_tolerated() {
        let shapes: Vec<Shape> = serde_json::from_value(json!([
            { "ty": "zz", "nm": "ZigZag" },
            { "ty": "el", "s": { "k": [10, 10] }, "p": { "k": [0, 0] } }
        ]))
        .unwrap();
        assert!(matches!(shapes[0], Shape::Unknown));
        assert!(matches!(shapes[1], Shape::Ellipse(_)));
    }

    #[test]
    fn test_split_position() {
        let t: Transform = serde_json::from_value(json!({
            "p": { "s": true, "x": { "k": 10 }, "y": { "k": 20 } }
        }))
        .unwrap();
        assert!(matches!(t.p, PositionProperty::Split { .. }));
    }
}
