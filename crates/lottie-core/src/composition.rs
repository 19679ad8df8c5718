use crate::error::FieldError;
use crate::layer::{Layer, LayerList};
use crate::performance::PerformanceTracker;
use crate::shape::ShapeItem;
use crate::warnings::Warnings;
use base64::prelude::*;
use kurbo::Rect;
use std::collections::HashMap;
use std::fmt;

/// Bodymovin exporter version, `major.minor.patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
        }
    }

    /// Parses `major.minor.patch`; components past the third are ignored.
    pub fn parse(text: &str) -> Result<Self, FieldError> {
        let invalid = || FieldError(format!("invalid version string `{text}`"));
        let mut parts = text.split('.');
        let mut next = || -> Result<u32, FieldError> {
            parts
                .next()
                .and_then(|p| p.trim().parse().ok())
                .ok_or_else(invalid)
        };
        Ok(Version {
            major: next()?,
            minor: next()?,
            patch: next()?,
        })
    }

    pub fn is_at_least(&self, major: u32, minor: u32, patch: u32) -> bool {
        *self >= Version::new(major, minor, patch)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Raster image referenced by image layers through `refId`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub id: String,
    /// Source `p`: a file name, or a `data:` URI when embedded.
    pub file_name: String,
    /// Source `u`.
    pub dir_name: String,
    pub width: f32,
    pub height: f32,
    pub embedded: bool,
}

impl ImageAsset {
    /// Directory and file joined as the exporter wrote them.
    pub fn path(&self) -> String {
        format!("{}{}", self.dir_name, self.file_name)
    }

    /// Decoded bytes of a `data:...;base64,` image; `None` for external files.
    pub fn embedded_bytes(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        if !self.file_name.starts_with("data:") {
            return None;
        }
        let (header, payload) = self.file_name.split_once(',')?;
        if !header.ends_with(";base64") {
            return None;
        }
        Some(BASE64_STANDARD.decode(payload))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub name: String,
    pub family: String,
    pub style: String,
    pub ascent: f32,
    pub path: Option<String>,
}

/// Lookup key of a glyph: the character plus the font it was drawn with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontCharacterKey {
    pub character: String,
    pub family: String,
    pub style: String,
}

#[derive(Debug, Clone)]
pub struct FontCharacter {
    pub character: String,
    pub family: String,
    pub style: String,
    pub size: f32,
    pub width: f32,
    pub shapes: Vec<ShapeItem>,
}

impl FontCharacter {
    pub fn key(&self) -> FontCharacterKey {
        FontCharacterKey {
            character: self.character.clone(),
            family: self.family.clone(),
            style: self.style.clone(),
        }
    }
}

/// Named time range authored in the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub name: String,
    pub start_frame: f32,
    pub duration_frames: f32,
}

impl Marker {
    pub fn end_frame(&self) -> f32 {
        self.start_frame + self.duration_frames
    }
}

/// Top-level fields read before `layers`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Header {
    pub bounds: Rect,
    pub start_frame: f32,
    pub end_frame: f32,
    pub frame_rate: f32,
    pub version: Version,
}

/// A fully parsed animation.
///
/// Everything except the warning set and the performance tracker is fixed once
/// parsing returns, so a composition can be shared across threads behind an
/// `Arc` and sampled without locking.
#[derive(Debug)]
pub struct Composition {
    header: Header,
    dp_scale: f32,
    layers: LayerList,
    precomps: HashMap<String, LayerList>,
    images: HashMap<String, ImageAsset>,
    fonts: HashMap<String, Font>,
    characters: HashMap<FontCharacterKey, FontCharacter>,
    markers: Vec<Marker>,
    warnings: Warnings,
    performance: PerformanceTracker,
}

/// Tables collected by the parser alongside the layer list.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub precomps: HashMap<String, LayerList>,
    pub images: HashMap<String, ImageAsset>,
    pub fonts: HashMap<String, Font>,
    pub characters: HashMap<FontCharacterKey, FontCharacter>,
    pub markers: Vec<Marker>,
}

impl Composition {
    pub(crate) fn assemble(
        header: Header,
        dp_scale: f32,
        layers: LayerList,
        tables: Tables,
        warnings: Warnings,
    ) -> Self {
        Composition {
            header,
            dp_scale,
            layers,
            precomps: tables.precomps,
            images: tables.images,
            fonts: tables.fonts,
            characters: tables.characters,
            markers: tables.markers,
            warnings,
            performance: PerformanceTracker::new(),
        }
    }

    /// Canvas rectangle in device pixels.
    pub fn bounds(&self) -> Rect {
        self.header.bounds
    }

    pub fn start_frame(&self) -> f32 {
        self.header.start_frame
    }

    pub fn end_frame(&self) -> f32 {
        self.header.end_frame
    }

    pub fn frame_rate(&self) -> f32 {
        self.header.frame_rate
    }

    pub fn dp_scale(&self) -> f32 {
        self.dp_scale
    }

    pub fn version(&self) -> Version {
        self.header.version
    }

    pub fn layers(&self) -> &[Layer] {
        self.layers.layers()
    }

    pub fn layer_list(&self) -> &LayerList {
        &self.layers
    }

    /// Top-level layer with source `ind == id`.
    pub fn layer_by_id(&self, id: i64) -> Option<&Layer> {
        self.layers.by_id(id)
    }

    pub fn precomp_by_name(&self, name: &str) -> Option<&LayerList> {
        self.precomps.get(name)
    }

    pub fn precomps(&self) -> &HashMap<String, LayerList> {
        &self.precomps
    }

    pub fn images(&self) -> &HashMap<String, ImageAsset> {
        &self.images
    }

    pub fn image(&self, id: &str) -> Option<&ImageAsset> {
        self.images.get(id)
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }

    pub fn fonts(&self) -> &HashMap<String, Font> {
        &self.fonts
    }

    pub fn font(&self, name: &str) -> Option<&Font> {
        self.fonts.get(name)
    }

    pub fn characters(&self) -> &HashMap<FontCharacterKey, FontCharacter> {
        &self.characters
    }

    pub fn character(&self, character: &str, family: &str, style: &str) -> Option<&FontCharacter> {
        self.characters.get(&FontCharacterKey {
            character: character.to_string(),
            family: family.to_string(),
            style: style.to_string(),
        })
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn marker(&self, name: &str) -> Option<&Marker> {
        self.markers.iter().find(|m| m.name == name)
    }

    pub fn duration_frames(&self) -> f32 {
        self.header.end_frame - self.header.start_frame
    }

    pub fn duration_millis(&self) -> f32 {
        self.duration_frames() / self.header.frame_rate * 1000.0
    }

    /// Snapshot of the advisory warnings in first-insertion order.
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.snapshot()
    }

    /// Records an operational warning, e.g. from a renderer. Returns `false` for a repeat.
    pub fn add_warning(&self, message: impl Into<String>) -> bool {
        self.warnings.add(message)
    }

    pub fn set_performance_tracking_enabled(&self, enabled: bool) {
        self.performance.set_enabled(enabled);
    }

    pub fn performance_tracker(&self) -> &PerformanceTracker {
        &self.performance
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Composition v{} {}x{} frames {}..{} @ {}fps",
            self.header.version,
            self.header.bounds.width(),
            self.header.bounds.height(),
            self.header.start_frame,
            self.header.end_frame,
            self.header.frame_rate
        )?;
        for layer in self.layers.iter() {
            writeln!(f, "\t{:?} {} ({})", layer.layer_type(), layer.name, layer.id)?;
        }
        Ok(())
    }
}
