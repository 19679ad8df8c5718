use crate::animatable::{AnimatableValue, Interpolatable};
use crate::error::FieldError;
use crate::layer::Transform;
use crate::parser::ParseContext;
use glam::{Vec2, Vec4};
use kurbo::{BezPath, Point};
use lottie_data::model::{self as data, BezierPath};

/// One cubic path: vertices plus in/out handles relative to each vertex.
///
/// Handle lists always have the same length as `vertices`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeData {
    pub closed: bool,
    pub vertices: Vec<Vec2>,
    pub in_tangents: Vec<Vec2>,
    pub out_tangents: Vec<Vec2>,
}

impl ShapeData {
    pub fn from_data(path: &BezierPath, scale: f32) -> Self {
        let point = |list: &[data::Vec2], idx: usize| {
            list.get(idx)
                .map(|p| Vec2::new(p[0], p[1]) * scale)
                .unwrap_or(Vec2::ZERO)
        };
        let count = path.v.len();
        ShapeData {
            closed: path.c,
            vertices: (0..count).map(|i| point(&path.v, i)).collect(),
            in_tangents: (0..count).map(|i| point(&path.i, i)).collect(),
            out_tangents: (0..count).map(|i| point(&path.o, i)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn to_bez_path(&self) -> BezPath {
        let mut bp = BezPath::new();
        if self.vertices.is_empty() {
            return bp;
        }
        let start = self.vertices[0];
        bp.move_to(to_point(start));
        for i in 0..self.vertices.len() {
            let next_idx = (i + 1) % self.vertices.len();
            if next_idx == 0 && !self.closed {
                break;
            }
            let p0 = self.vertices[i];
            let p1 = self.vertices[next_idx];
            let cp1 = p0 + self.out_tangents[i];
            let cp2 = p1 + self.in_tangents[next_idx];
            bp.curve_to(to_point(cp1), to_point(cp2), to_point(p1));
        }
        if self.closed {
            bp.close_path();
        }
        bp
    }
}

fn to_point(v: Vec2) -> Point {
    Point::new(v.x as f64, v.y as f64)
}

impl Interpolatable for ShapeData {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        let mix = |a: &[Vec2], b: &[Vec2]| -> Vec<Vec2> {
            a.iter().zip(b).map(|(a, b)| Vec2::lerp(*a, *b, t)).collect()
        };
        ShapeData {
            closed: self.closed || other.closed,
            vertices: mix(&self.vertices, &other.vertices),
            in_tangents: mix(&self.in_tangents, &other.in_tangents),
            out_tangents: mix(&self.out_tangents, &other.out_tangents),
        }
    }

    fn check_compatible(&self, other: &Self) -> Result<(), FieldError> {
        if self.len() != other.len() {
            return Err(FieldError(format!(
                "shape keyframes have mismatched vertex counts ({} and {})",
                self.len(),
                other.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimMode {
    Simultaneous,
    Individual,
}

/// A node of a shape layer's content tree.
#[derive(Debug, Clone)]
pub enum ShapeItem {
    Group {
        name: String,
        hidden: bool,
        items: Vec<ShapeItem>,
    },
    Path {
        name: String,
        hidden: bool,
        path: AnimatableValue<ShapeData>,
    },
    Rect {
        name: String,
        size: AnimatableValue<Vec2>,
        position: AnimatableValue<Vec2>,
        roundness: AnimatableValue<f32>,
    },
    Ellipse {
        name: String,
        size: AnimatableValue<Vec2>,
        position: AnimatableValue<Vec2>,
    },
    Fill {
        name: String,
        color: AnimatableValue<Vec4>,
        opacity: AnimatableValue<f32>,
        rule: FillRule,
    },
    Stroke {
        name: String,
        color: AnimatableValue<Vec4>,
        opacity: AnimatableValue<f32>,
        width: AnimatableValue<f32>,
        line_cap: u8,
        line_join: u8,
        miter_limit: Option<f32>,
    },
    Transform(Transform),
    Trim {
        name: String,
        start: AnimatableValue<f32>,
        end: AnimatableValue<f32>,
        offset: AnimatableValue<f32>,
        mode: TrimMode,
    },
    /// A shape type this model does not evaluate (modifiers, gradients, ...).
    Unknown,
}

impl ShapeItem {
    pub fn name(&self) -> &str {
        match self {
            ShapeItem::Group { name, .. }
            | ShapeItem::Path { name, .. }
            | ShapeItem::Rect { name, .. }
            | ShapeItem::Ellipse { name, .. }
            | ShapeItem::Fill { name, .. }
            | ShapeItem::Stroke { name, .. }
            | ShapeItem::Trim { name, .. } => name,
            ShapeItem::Transform(_) | ShapeItem::Unknown => "",
        }
    }

    pub(crate) fn list_from_data(
        shapes: &[data::Shape],
        ctx: &ParseContext,
    ) -> Result<Vec<ShapeItem>, FieldError> {
        shapes.iter().map(|s| ShapeItem::from_data(s, ctx)).collect()
    }

    pub(crate) fn from_data(shape: &data::Shape, ctx: &ParseContext) -> Result<Self, FieldError> {
        let scale = ctx.scale;
        let scaled_vec2 = move |v: &data::Vec2| Vec2::new(v[0], v[1]) * scale;
        let name = |nm: &Option<String>| nm.clone().unwrap_or_default();

        Ok(match shape {
            data::Shape::Group(g) => ShapeItem::Group {
                name: name(&g.nm),
                hidden: g.hd.unwrap_or(false),
                items: Self::list_from_data(&g.it, ctx)?,
            },
            data::Shape::Path(p) => ShapeItem::Path {
                name: name(&p.nm),
                hidden: p.hd.unwrap_or(false),
                path: AnimatableValue::from_property(&p.ks, ShapeData::default(), |b| {
                    ShapeData::from_data(b, scale)
                })?,
            },
            data::Shape::Rect(r) => ShapeItem::Rect {
                name: name(&r.nm),
                size: AnimatableValue::from_property(&r.s, Vec2::ZERO, scaled_vec2)?,
                position: AnimatableValue::from_property(&r.p, Vec2::ZERO, scaled_vec2)?
                    .scale_spatial_tangents(scale),
                roundness: AnimatableValue::from_property(&r.r, 0.0, |v| v * scale)?,
            },
            data::Shape::Ellipse(e) => ShapeItem::Ellipse {
                name: name(&e.nm),
                size: AnimatableValue::from_property(&e.s, Vec2::ZERO, scaled_vec2)?,
                position: AnimatableValue::from_property(&e.p, Vec2::ZERO, scaled_vec2)?
                    .scale_spatial_tangents(scale),
            },
            data::Shape::Fill(f) => ShapeItem::Fill {
                name: name(&f.nm),
                color: AnimatableValue::from_property(&f.c, Vec4::ONE, |c| color_from_slice(c))?,
                opacity: AnimatableValue::from_property(&f.o, 100.0, |v| *v)?,
                rule: match f.r {
                    Some(2) => FillRule::EvenOdd,
                    _ => FillRule::NonZero,
                },
            },
            data::Shape::Stroke(s) => ShapeItem::Stroke {
                name: name(&s.nm),
                color: AnimatableValue::from_property(&s.c, Vec4::ONE, |c| color_from_slice(c))?,
                opacity: AnimatableValue::from_property(&s.o, 100.0, |v| *v)?,
                width: AnimatableValue::from_property(&s.w, 0.0, |v| v * scale)?,
                line_cap: s.lc,
                line_join: s.lj,
                miter_limit: s.ml,
            },
            data::Shape::Transform(t) => ShapeItem::Transform(Transform::from_data(&t.t, ctx)?),
            data::Shape::Trim(t) => ShapeItem::Trim {
                name: name(&t.nm),
                start: AnimatableValue::from_property(&t.s, 0.0, |v| *v)?,
                end: AnimatableValue::from_property(&t.e, 100.0, |v| *v)?,
                offset: AnimatableValue::from_property(&t.o, 0.0, |v| *v)?,
                mode: if t.m == 2 {
                    TrimMode::Individual
                } else {
                    TrimMode::Simultaneous
                },
            },
            data::Shape::Unknown => ShapeItem::Unknown,
        })
    }
}

/// RGB or RGBA channels in 0..1; alpha defaults to opaque.
pub(crate) fn color_from_slice(c: &[f32]) -> Vec4 {
    Vec4::new(
        c.first().copied().unwrap_or(0.0),
        c.get(1).copied().unwrap_or(0.0),
        c.get(2).copied().unwrap_or(0.0),
        c.get(3).copied().unwrap_or(1.0),
    )
}
