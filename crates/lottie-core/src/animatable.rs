use crate::error::FieldError;
use glam::{Vec2, Vec3, Vec4};
use lottie_data::model::{self as data, BezierTangent, Property, TextDocument, Value};

pub trait Interpolatable: Sized + Clone {
    fn lerp(&self, other: &Self, t: f32) -> Self;

    fn lerp_spatial(&self, other: &Self, t: f32, _tangents: &SpatialTangents) -> Self {
        self.lerp(other, t)
    }

    /// Whether `self` can be interpolated into `other` at all.
    fn check_compatible(&self, _other: &Self) -> Result<(), FieldError> {
        Ok(())
    }
}

// Discrete: the start document is shown for the whole span.
impl Interpolatable for TextDocument {
    fn lerp(&self, _other: &Self, _t: f32) -> Self {
        self.clone()
    }
}

impl Interpolatable for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolatable for Vec2 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec2::lerp(*self, *other, t)
    }

    fn lerp_spatial(&self, other: &Self, t: f32, tangents: &SpatialTangents) -> Self {
        let p1 = *self + tangents.out_tangent.truncate();
        let p2 = *other + tangents.in_tangent.truncate();
        cubic_point(*self, p1, p2, *other, t)
    }
}

impl Interpolatable for Vec3 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec3::lerp(*self, *other, t)
    }

    fn lerp_spatial(&self, other: &Self, t: f32, tangents: &SpatialTangents) -> Self {
        let p1 = *self + tangents.out_tangent;
        let p2 = *other + tangents.in_tangent;
        cubic_point(*self, p1, p2, *other, t)
    }
}

// Colors are RGBA in 0..1 and interpolate per channel.
impl Interpolatable for Vec4 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec4::lerp(*self, *other, t)
    }
}

fn cubic_point<P>(p0: P, p1: P, p2: P, p3: P, t: f32) -> P
where
    P: std::ops::Mul<f32, Output = P> + std::ops::Add<Output = P>,
{
    let one_minus_t = 1.0 - t;
    let one_minus_t_sq = one_minus_t * one_minus_t;
    let one_minus_t_cub = one_minus_t_sq * one_minus_t;

    let t_sq = t * t;
    let t_cub = t_sq * t;

    p0 * one_minus_t_cub + p1 * (3.0 * one_minus_t_sq * t) + p2 * (3.0 * one_minus_t * t_sq)
        + p3 * t_cub
}

// Cubic Bezier Easing
pub fn solve_cubic_bezier(p1: Vec2, p2: Vec2, x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let sample_x = |t: f32| {
        let one_minus_t = 1.0 - t;
        3.0 * one_minus_t * one_minus_t * t * p1.x + 3.0 * one_minus_t * t * t * p2.x + t * t * t
    };

    // Newton-Raphson
    let mut t = x;
    let mut converged = false;
    for _ in 0..8 {
        let one_minus_t = 1.0 - t;
        let err = sample_x(t) - x;
        if err.abs() < 1e-5 {
            converged = true;
            break;
        }

        let dx_dt = 3.0 * one_minus_t * one_minus_t * p1.x
            + 6.0 * one_minus_t * t * (p2.x - p1.x)
            + 3.0 * t * t * (1.0 - p2.x);

        if dx_dt.abs() < 1e-6 {
            break;
        }
        t = (t - err / dx_dt).clamp(0.0, 1.0);
    }

    // Flat tangents stall Newton; bisection always converges since x(t) is monotonic.
    if !converged {
        let (mut lo, mut hi) = (0.0f32, 1.0f32);
        t = x;
        for _ in 0..32 {
            let err = sample_x(t) - x;
            if err.abs() < 1e-5 {
                break;
            }
            if err > 0.0 {
                hi = t;
            } else {
                lo = t;
            }
            t = (lo + hi) * 0.5;
        }
    }

    let one_minus_t = 1.0 - t;
    3.0 * one_minus_t * one_minus_t * t * p1.y + 3.0 * one_minus_t * t * t * p2.y + t * t * t
}

/// Timing curve of one keyframe span: the out-tangent of the start value and
/// the in-tangent of the end value, both in normalized (time, progress) space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Easing {
    pub out_tangent: Vec2,
    pub in_tangent: Vec2,
}

impl Default for Easing {
    fn default() -> Self {
        Easing::LINEAR
    }
}

impl Easing {
    pub const LINEAR: Easing = Easing {
        out_tangent: Vec2::ZERO,
        in_tangent: Vec2::ONE,
    };

    pub fn new(out_tangent: Vec2, in_tangent: Vec2) -> Self {
        // x must stay inside the unit interval for the curve to be a function of time
        Easing {
            out_tangent: Vec2::new(out_tangent.x.clamp(0.0, 1.0), out_tangent.y),
            in_tangent: Vec2::new(in_tangent.x.clamp(0.0, 1.0), in_tangent.y),
        }
    }

    fn from_data(out_tangent: Option<&BezierTangent>, in_tangent: Option<&BezierTangent>) -> Self {
        match (out_tangent, in_tangent) {
            (Some(o), Some(i)) => Easing::new(first_point(o, 0.0), first_point(i, 1.0)),
            (Some(o), None) => Easing::new(first_point(o, 0.0), Vec2::ONE),
            (None, Some(i)) => Easing::new(Vec2::ZERO, first_point(i, 1.0)),
            (None, None) => Easing::LINEAR,
        }
    }

    pub fn is_linear(&self) -> bool {
        self.out_tangent.x == self.out_tangent.y && self.in_tangent.x == self.in_tangent.y
    }

    /// Maps linear progress in `0..=1` to eased progress.
    pub fn ease(&self, progress: f32) -> f32 {
        if self.is_linear() {
            return progress.clamp(0.0, 1.0);
        }
        solve_cubic_bezier(self.out_tangent, self.in_tangent, progress)
    }
}

fn first_point(tangent: &BezierTangent, fallback: f32) -> Vec2 {
    Vec2::new(
        tangent.x.first().copied().unwrap_or(fallback),
        tangent.y.first().copied().unwrap_or(fallback),
    )
}

/// Spatial Bezier handles of a position-like span (`to` / `ti`), relative to
/// the start and end values respectively.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialTangents {
    pub out_tangent: Vec3,
    pub in_tangent: Vec3,
}

impl SpatialTangents {
    fn from_data(to: Option<&Vec<f32>>, ti: Option<&Vec<f32>>) -> Option<Self> {
        let read = |v: Option<&Vec<f32>>| {
            v.map(|c| {
                Vec3::new(
                    c.first().copied().unwrap_or(0.0),
                    c.get(1).copied().unwrap_or(0.0),
                    c.get(2).copied().unwrap_or(0.0),
                )
            })
            .unwrap_or(Vec3::ZERO)
        };
        let tangents = SpatialTangents {
            out_tangent: read(to),
            in_tangent: read(ti),
        };
        // Zero handles describe a straight segment; plain lerp is exact for it.
        if tangents.out_tangent == Vec3::ZERO && tangents.in_tangent == Vec3::ZERO {
            None
        } else {
            Some(tangents)
        }
    }
}

/// One timed sample of a property plus how to get to the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe<V> {
    pub start_value: V,
    /// Value reached at `end_frame`; `None` on the final keyframe.
    pub end_value: Option<V>,
    pub start_frame: f32,
    pub end_frame: Option<f32>,
    pub easing: Easing,
    pub hold: bool,
    pub spatial: Option<SpatialTangents>,
    /// Set on the single keyframe of a property that never changes.
    pub is_static: bool,
}

impl<V: Interpolatable> Keyframe<V> {
    pub fn fixed(value: V) -> Self {
        Keyframe {
            start_value: value,
            end_value: None,
            start_frame: 0.0,
            end_frame: None,
            easing: Easing::LINEAR,
            hold: false,
            spatial: None,
            is_static: true,
        }
    }

    /// A linear span from `start_value` at `start_frame` to `end_value` at `end_frame`.
    pub fn span(start_frame: f32, start_value: V, end_frame: f32, end_value: V) -> Self {
        Keyframe {
            start_value,
            end_value: Some(end_value),
            start_frame,
            end_frame: Some(end_frame),
            easing: Easing::LINEAR,
            hold: false,
            spatial: None,
            is_static: false,
        }
    }

    /// A final keyframe: holds `value` from `frame` onwards.
    pub fn last(frame: f32, value: V) -> Self {
        Keyframe {
            start_value: value,
            end_value: None,
            start_frame: frame,
            end_frame: None,
            easing: Easing::LINEAR,
            hold: false,
            spatial: None,
            is_static: false,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_hold(mut self) -> Self {
        self.hold = true;
        self
    }

    /// Eased progress through this span at `frame`, in `0..=1`.
    pub fn progress(&self, frame: f32) -> f32 {
        let Some(end_frame) = self.end_frame else {
            return 0.0;
        };
        if self.hold {
            return 0.0;
        }
        let duration = end_frame - self.start_frame;
        if duration <= 0.0 {
            return 0.0;
        }
        let linear = ((frame - self.start_frame) / duration).clamp(0.0, 1.0);
        self.easing.ease(linear)
    }

    pub fn value_at(&self, frame: f32) -> V {
        let (Some(end_frame), Some(end_value)) = (self.end_frame, &self.end_value) else {
            return self.start_value.clone();
        };
        if frame >= end_frame && end_frame > self.start_frame {
            return end_value.clone();
        }

        let local_t = self.progress(frame);
        if local_t <= 0.0 {
            return self.start_value.clone();
        }

        match &self.spatial {
            Some(tangents) => self.start_value.lerp_spatial(end_value, local_t, tangents),
            None => self.start_value.lerp(end_value, local_t),
        }
    }
}

/// The full time-varying definition of one property.
///
/// Evaluation only reads, so a shared value can be sampled from any number of
/// threads at once.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatableValue<V> {
    keyframes: Vec<Keyframe<V>>,
}

impl<V: Interpolatable> AnimatableValue<V> {
    pub fn fixed(value: V) -> Self {
        AnimatableValue {
            keyframes: vec![Keyframe::fixed(value)],
        }
    }

    /// Validates ordering, emptiness and value compatibility of `keyframes`.
    pub fn new(keyframes: Vec<Keyframe<V>>) -> Result<Self, FieldError> {
        if keyframes.is_empty() {
            return Err(FieldError::new("keyframe list is empty"));
        }
        if keyframes.len() > 1 && keyframes.iter().any(|kf| kf.is_static) {
            return Err(FieldError::new(
                "a static keyframe must be the only keyframe of its property",
            ));
        }
        for pair in keyframes.windows(2) {
            if pair[1].start_frame < pair[0].start_frame {
                return Err(FieldError(format!(
                    "keyframe at frame {} comes after frame {}",
                    pair[1].start_frame, pair[0].start_frame
                )));
            }
        }
        for kf in &keyframes {
            if let Some(end) = &kf.end_value {
                kf.start_value.check_compatible(end)?;
            }
        }
        Ok(AnimatableValue { keyframes })
    }

    /// Builds the value from its wire form.
    ///
    /// A missing property becomes a static `default`. Each animated keyframe ends
    /// where the next one starts, with `e` as its end value when present and the
    /// next keyframe's `s` otherwise. A trailing keyframe with only a time (older
    /// exports) closes the previous span and is then dropped.
    pub fn from_property<T>(
        prop: &Property<T>,
        default: V,
        convert: impl Fn(&T) -> V,
    ) -> Result<Self, FieldError> {
        match &prop.k {
            Value::Default => Ok(Self::fixed(default)),
            Value::Static(v) => Ok(Self::fixed(convert(v))),
            Value::Animated(raw) => Self::new(Self::keyframes_from_data(raw, &convert)?),
        }
    }

    fn keyframes_from_data<T>(
        raw: &[data::Keyframe<T>],
        convert: &impl Fn(&T) -> V,
    ) -> Result<Vec<Keyframe<V>>, FieldError> {
        let mut keyframes = Vec::with_capacity(raw.len());
        let mut carried: Option<V> = None;

        for (idx, kf) in raw.iter().enumerate() {
            let next = raw.get(idx + 1);

            let start_value = match (&kf.s, carried.take()) {
                (Some(s), _) => convert(s),
                (None, _) if next.is_none() && !keyframes.is_empty() => {
                    // idx >= 1 here: an earlier keyframe was kept
                    let prev = &raw[idx - 1];
                    if kf.t < prev.t {
                        return Err(FieldError(format!(
                            "keyframe at frame {} comes after frame {}",
                            kf.t, prev.t
                        )));
                    }
                    break;
                }
                (None, Some(previous_end)) => previous_end,
                (None, None) => {
                    return Err(FieldError(format!(
                        "keyframe at frame {} has no value",
                        kf.t
                    )))
                }
            };

            let (end_frame, end_value) = match next {
                Some(next) => {
                    let end_value = kf
                        .e
                        .as_ref()
                        .or(next.s.as_ref())
                        .map(convert)
                        .unwrap_or_else(|| start_value.clone());
                    (Some(next.t), Some(end_value))
                }
                None => (None, None),
            };
            carried = end_value.clone();

            keyframes.push(Keyframe {
                start_value,
                end_value,
                start_frame: kf.t,
                end_frame,
                easing: Easing::from_data(kf.o.as_ref(), kf.i.as_ref()),
                hold: kf.h == Some(1),
                spatial: SpatialTangents::from_data(kf.to.as_ref(), kf.ti.as_ref()),
                is_static: false,
            });
        }

        Ok(keyframes)
    }

    /// Multiplies spatial handles by `factor`, matching values that were scaled on conversion.
    pub fn scale_spatial_tangents(mut self, factor: f32) -> Self {
        for kf in &mut self.keyframes {
            if let Some(tangents) = &mut kf.spatial {
                tangents.out_tangent *= factor;
                tangents.in_tangent *= factor;
            }
        }
        self
    }

    pub fn keyframes(&self) -> &[Keyframe<V>] {
        &self.keyframes
    }

    pub fn is_static(&self) -> bool {
        self.keyframes.len() == 1 && self.keyframes[0].is_static
    }

    pub fn first_frame(&self) -> f32 {
        self.keyframes[0].start_frame
    }

    /// Frame after which the value no longer changes.
    pub fn last_frame(&self) -> f32 {
        let last = &self.keyframes[self.keyframes.len() - 1];
        last.end_frame.unwrap_or(last.start_frame)
    }

    pub fn value_at(&self, frame: f32) -> V {
        let first = &self.keyframes[0];
        if first.is_static || frame.is_nan() || frame <= first.start_frame {
            return first.start_value.clone();
        }

        // Binary search: first keyframe starting after `frame`; the span is the one before it.
        // idx >= 1 because frame > first.start_frame.
        let idx = self.keyframes.partition_point(|kf| kf.start_frame <= frame);
        self.keyframes[idx - 1].value_at(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lottie_data::model::{BezierTangent, Keyframe as RawKeyframe};

    fn scalar(keyframes: Vec<RawKeyframe<f32>>) -> AnimatableValue<f32> {
        AnimatableValue::from_property(&Property::animated(keyframes), 0.0, |v| *v).unwrap()
    }

    #[test]
    fn test_value_at_binary_search() {
        // Setup a property with keyframes at 0, 10, 20
        let value = scalar(vec![
            RawKeyframe::at(0.0, 0.0),
            RawKeyframe::at(10.0, 10.0),
            RawKeyframe::at(20.0, 30.0),
        ]);

        // 1. Exact match start
        assert_eq!(value.value_at(0.0), 0.0);
        // 2. Exact match middle
        assert_eq!(value.value_at(10.0), 10.0);
        // 3. Exact match end
        assert_eq!(value.value_at(20.0), 30.0);
        // 4. Before first
        assert_eq!(value.value_at(-5.0), 0.0);
        // 5. After last
        assert_eq!(value.value_at(25.0), 30.0);
        // 6. Mid-segment
        assert_eq!(value.value_at(5.0), 5.0);
        // 7. Mid-segment 2
        assert_eq!(value.value_at(15.0), 20.0);
    }

    #[test]
    fn test_single_static_keyframe_is_constant() {
        let value = AnimatableValue::fixed(42.0f32);
        assert!(value.is_static());
        for frame in [-1.0e6, -1.0, 0.0, 12.5, 1.0e9] {
            assert_eq!(value.value_at(frame), 42.0);
        }
    }

    #[test]
    fn test_single_animated_keyframe_is_constant() {
        let value = scalar(vec![RawKeyframe::at(30.0, 7.0)]);
        assert!(!value.is_static());
        assert_eq!(value.value_at(0.0), 7.0);
        assert_eq!(value.value_at(30.0), 7.0);
        assert_eq!(value.value_at(300.0), 7.0);
    }

    #[test]
    fn test_hold_keyframe() {
        let mut kf1 = RawKeyframe::at(0.0, 0.0);
        kf1.h = Some(1);
        let value = scalar(vec![kf1, RawKeyframe::at(10.0, 100.0)]);

        // At frame 5, we should still be at 0.0 (holding from kf1)
        assert_eq!(value.value_at(5.0), 0.0);
        assert_eq!(value.value_at(9.99), 0.0);
        assert_eq!(value.value_at(10.0), 100.0);
    }

    #[test]
    fn test_bezier_easing() {
        let mut kf1 = RawKeyframe::at(0.0, 0.0);
        kf1.o = Some(BezierTangent {
            x: vec![0.42],
            y: vec![0.0],
        });
        kf1.i = Some(BezierTangent {
            x: vec![0.58],
            y: vec![1.0],
        });
        let value = scalar(vec![kf1, RawKeyframe::at(10.0, 100.0)]);

        // ease-in-out is symmetric: slow at the edges, exact half way through
        let early = value.value_at(2.0);
        assert!(early > 0.0 && early < 20.0, "ease-in should lag linear, got {early}");
        assert!((value.value_at(5.0) - 50.0).abs() < 0.1);
        let late = value.value_at(8.0);
        assert!(late > 80.0 && late < 100.0, "ease-out should lead linear, got {late}");
    }

    #[test]
    fn test_solve_cubic_bezier_endpoints() {
        let p1 = Vec2::new(0.9, 0.0);
        let p2 = Vec2::new(0.1, 1.0);
        assert_eq!(solve_cubic_bezier(p1, p2, 0.0), 0.0);
        assert_eq!(solve_cubic_bezier(p1, p2, 1.0), 1.0);
        let mid = solve_cubic_bezier(p1, p2, 0.5);
        assert!((mid - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_explicit_end_value_overrides_next_start() {
        let mut kf1 = RawKeyframe::at(0.0, 0.0);
        kf1.e = Some(50.0);
        let value = scalar(vec![kf1, RawKeyframe::at(10.0, 100.0)]);
        assert_eq!(value.value_at(5.0), 25.0);
    }

    #[test]
    fn test_trailing_time_only_keyframe_closes_span() {
        let mut kf1 = RawKeyframe::at(0.0, 0.0);
        kf1.e = Some(10.0);
        let trailing = RawKeyframe {
            s: None,
            ..RawKeyframe::at(20.0, 0.0)
        };
        let value = scalar(vec![kf1, trailing]);

        assert_eq!(value.keyframes().len(), 1);
        assert_eq!(value.value_at(10.0), 5.0);
        assert_eq!(value.value_at(20.0), 10.0);
        assert_eq!(value.value_at(40.0), 10.0);
        assert_eq!(value.last_frame(), 20.0);
    }

    #[test]
    fn test_boundaries_match_start_values() {
        let frames = [0.0, 4.0, 9.0, 30.0];
        let values = [3.0, -2.0, 8.0, 1.0];
        let value = scalar(
            frames
                .iter()
                .zip(values)
                .map(|(t, v)| RawKeyframe::at(*t, v))
                .collect(),
        );
        for (kf, expected) in value.keyframes().iter().zip(values) {
            assert_eq!(value.value_at(kf.start_frame), expected);
        }
    }

    #[test]
    fn test_out_of_order_keyframes_rejected() {
        let prop = Property::animated(vec![RawKeyframe::at(10.0, 0.0), RawKeyframe::at(5.0, 1.0)]);
        assert!(AnimatableValue::from_property(&prop, 0.0, |v: &f32| *v).is_err());
    }

    #[test]
    fn test_empty_keyframe_list_rejected() {
        let prop: Property<f32> = Property::animated(vec![]);
        assert!(AnimatableValue::from_property(&prop, 0.0, |v| *v).is_err());
    }

    #[test]
    fn test_missing_property_uses_default() {
        let prop: Property<f32> = Property::default();
        let value = AnimatableValue::from_property(&prop, 100.0, |v| *v).unwrap();
        assert!(value.is_static());
        assert_eq!(value.value_at(3.0), 100.0);
    }

    #[test]
    fn test_vec_and_color_interpolation() {
        let prop = Property::animated(vec![
            RawKeyframe::at(0.0, vec![0.0, 0.0, 0.0, 1.0]),
            RawKeyframe::at(10.0, vec![1.0, 0.5, 0.0, 1.0]),
        ]);
        let color =
            AnimatableValue::from_property(&prop, Vec4::ONE, |c| Vec4::from_slice(c)).unwrap();
        assert_eq!(color.value_at(5.0), Vec4::new(0.5, 0.25, 0.0, 1.0));
    }

    #[test]
    fn test_spatial_tangents_bend_position() {
        let mut kf1 = RawKeyframe::at(0.0, [0.0, 0.0]);
        kf1.to = Some(vec![0.0, 40.0]);
        kf1.ti = Some(vec![0.0, 40.0]);
        let prop = Property::animated(vec![kf1, RawKeyframe::at(10.0, [100.0, 0.0])]);
        let position =
            AnimatableValue::from_property(&prop, Vec2::ZERO, |v| Vec2::from_array(*v)).unwrap();

        let mid = position.value_at(5.0);
        assert!((mid.x - 50.0).abs() < 1e-3);
        assert!((mid.y - 30.0).abs() < 1e-3, "curve should bulge, got {mid}");
        assert_eq!(position.value_at(10.0), Vec2::new(100.0, 0.0));
    }

    #[test]
    fn test_nan_frame_clamps_to_first_value() {
        let value = scalar(vec![RawKeyframe::at(0.0, 0.0), RawKeyframe::at(10.0, 100.0)]);
        assert_eq!(value.value_at(f32::NAN), 0.0);
    }

    #[test]
    fn test_text_document_steps() {
        let a = TextDocument {
            t: "Hello".into(),
            ..Default::default()
        };
        let b = TextDocument {
            t: "World".into(),
            ..Default::default()
        };
        let prop = Property::animated(vec![RawKeyframe::at(0.0, a), RawKeyframe::at(10.0, b)]);
        let text =
            AnimatableValue::from_property(&prop, TextDocument::default(), |d: &TextDocument| {
                d.clone()
            })
            .unwrap();
        assert_eq!(text.value_at(9.5).t, "Hello");
        assert_eq!(text.value_at(10.0).t, "World");
    }
}
