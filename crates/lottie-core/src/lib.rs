//! Evaluated Lottie model and its streaming parser.
//!
//! [`parse`] turns a Bodymovin JSON document into a [`Composition`]: layers
//! with their animated properties, precompositions, image and font assets and
//! glyph outlines. Every animated property is an [`AnimatableValue`] that can be
//! sampled at any frame through `&self`.

pub mod animatable;
pub mod composition;
pub mod error;
pub mod layer;
pub mod parser;
pub mod performance;
pub mod shape;
pub mod warnings;

pub use animatable::{AnimatableValue, Easing, Interpolatable, Keyframe, SpatialTangents};
pub use composition::{
    Composition, Font, FontCharacter, FontCharacterKey, ImageAsset, Marker, Version,
};
pub use error::{ErrorKind, ParseError};
pub use layer::{
    BlendMode, Layer, LayerKind, LayerList, LayerType, Mask, MaskMode, Position, Transform,
};
pub use parser::{parse, parse_slice};
pub use performance::{PerformanceTracker, RenderTime};
pub use shape::{ShapeData, ShapeItem};
pub use warnings::Warnings;

/// Raw wire model, re-exported for callers that build properties by hand.
pub use lottie_data as data;
