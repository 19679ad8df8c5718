//! Streaming decoder for Bodymovin JSON.
//!
//! The document is read token by token through `serde_json`. The root object,
//! layer lists and asset lists each get their own visitor so layers are
//! converted and indexed as they arrive instead of after the whole tree is
//! buffered.

use crate::composition::{
    Composition, Font, FontCharacter, Header, ImageAsset, Marker, Tables, Version,
};
use crate::error::{FieldError, ParseError};
use crate::layer::{Layer, LayerList, LayerType};
use crate::shape::ShapeItem;
use crate::warnings::Warnings;
use kurbo::Rect;
use lottie_data::model as data;
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::io::{BufReader, Read};

/// Image layers allowed in one list before the shape-layer advisory is recorded.
pub const MAX_IMAGE_LAYERS: usize = 5;

pub const IMAGE_LAYER_ADVISORY: &str = "More than 5 image layers found. Animations should \
    primarily be built from shapes; convert Illustrator layers to shape layers.";

/// Oldest exporter version whose output is fully supported.
pub const MIN_SUPPORTED_VERSION: Version = Version::new(4, 5, 0);

/// Per-parse settings shared by every conversion step.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ParseContext {
    /// Device density factor applied to spatial values.
    pub scale: f32,
}

/// Parses a composition from `reader`, multiplying spatial values by `scale`.
///
/// The reader is consumed to the end; trailing non-whitespace is an error.
pub fn parse<R: Read>(reader: R, scale: f32) -> Result<Composition, ParseError> {
    let mut de = serde_json::Deserializer::from_reader(BufReader::new(reader));
    let composition = parse_document(&mut de, scale)?;
    de.end()?;
    Ok(composition)
}

/// [`parse`] over an in-memory document.
pub fn parse_slice(bytes: &[u8], scale: f32) -> Result<Composition, ParseError> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    let composition = parse_document(&mut de, scale)?;
    de.end()?;
    Ok(composition)
}

fn parse_document<'de, R>(
    de: &mut serde_json::Deserializer<R>,
    scale: f32,
) -> Result<Composition, ParseError>
where
    R: serde_json::de::Read<'de>,
{
    let ctx = ParseContext { scale };
    let composition = de.deserialize_map(RootVisitor { ctx })?;
    tracing::debug!(
        "Parsed composition v{} with {} layers, {} precomps, {} warnings",
        composition.version(),
        composition.layers().len(),
        composition.precomps().len(),
        composition.warnings().len()
    );
    Ok(composition)
}

/// Header fields as they are read, in any order relative to `layers`.
#[derive(Debug, Default)]
struct PendingHeader {
    width: Option<f32>,
    height: Option<f32>,
    start_frame: Option<f32>,
    end_frame: Option<f32>,
    frame_rate: Option<f32>,
    version: Option<Version>,
}

impl PendingHeader {
    fn freeze(self, ctx: &ParseContext, warnings: &Warnings) -> Result<Header, FieldError> {
        let required = |value: Option<f32>, field: &str| {
            value.ok_or_else(|| FieldError(format!("missing field `{field}`")))
        };
        let width = required(self.width, "w")?;
        let height = required(self.height, "h")?;
        let start_frame = required(self.start_frame, "ip")?;
        let end_frame = required(self.end_frame, "op")?;
        let frame_rate = required(self.frame_rate, "fr")?;
        if frame_rate <= 0.0 {
            return Err(FieldError(format!(
                "frame rate must be positive, got {frame_rate}"
            )));
        }

        let version = self.version.unwrap_or_default();
        if version < MIN_SUPPORTED_VERSION {
            warnings.add_first(format!(
                "Bodymovin {version} is older than {MIN_SUPPORTED_VERSION}; \
                 only exports from {MIN_SUPPORTED_VERSION} onwards are supported"
            ));
        }

        let scale = ctx.scale;
        Ok(Header {
            bounds: Rect::new(
                0.0,
                0.0,
                (width * scale).trunc() as f64,
                (height * scale).trunc() as f64,
            ),
            start_frame,
            end_frame,
            frame_rate,
            version,
        })
    }
}

struct RootVisitor {
    ctx: ParseContext,
}

impl<'de> Visitor<'de> for RootVisitor {
    type Value = Composition;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a Lottie animation object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Composition, A::Error>
    where
        A: MapAccess<'de>,
    {
        let ctx = self.ctx;
        let warnings = Warnings::new();
        let mut pending = PendingHeader::default();
        let mut layers: Option<LayerList> = None;
        let mut tables = Tables::default();

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "w" | "h" | "ip" | "op" | "fr" | "v" => {
                    read_header_field(&mut pending, &key, &mut map)?
                }
                "layers" => {
                    if layers.is_some() {
                        return Err(de::Error::duplicate_field("layers"));
                    }
                    layers = Some(map.next_value_seed(LayerListSeed {
                        ctx: &ctx,
                        warnings: &warnings,
                    })?);
                }
                "assets" => map.next_value_seed(AssetListSeed {
                    ctx: &ctx,
                    warnings: &warnings,
                    tables: &mut tables,
                })?,
                "fonts" => {
                    let fonts: data::FontList = map.next_value()?;
                    for font in fonts.list {
                        tables.fonts.insert(
                            font.name.clone(),
                            Font {
                                name: font.name,
                                family: font.family,
                                style: font.style,
                                ascent: font.ascent.unwrap_or(0.0),
                                path: font.path,
                            },
                        );
                    }
                }
                "chars" => map.next_value_seed(CharListSeed {
                    ctx: &ctx,
                    tables: &mut tables,
                })?,
                "markers" => {
                    let markers: Vec<data::Marker> = map.next_value()?;
                    tables.markers = markers
                        .into_iter()
                        .map(|m| Marker {
                            name: m.cm.unwrap_or_default(),
                            start_frame: m.tm.unwrap_or(0.0),
                            duration_frames: m.dr.unwrap_or(0.0),
                        })
                        .collect();
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        let Some(layers) = layers else {
            return Err(de::Error::missing_field("layers"));
        };
        let header = pending
            .freeze(&ctx, &warnings)
            .map_err(<A::Error as de::Error>::custom)?;
        Ok(Composition::assemble(
            header, ctx.scale, layers, tables, warnings,
        ))
    }
}

fn read_header_field<'de, A>(
    pending: &mut PendingHeader,
    key: &str,
    map: &mut A,
) -> Result<(), A::Error>
where
    A: MapAccess<'de>,
{
    match key {
        "w" => pending.width = Some(map.next_value()?),
        "h" => pending.height = Some(map.next_value()?),
        "ip" => pending.start_frame = Some(map.next_value()?),
        "op" => pending.end_frame = Some(map.next_value()?),
        "fr" => pending.frame_rate = Some(map.next_value()?),
        "v" => {
            let text: String = map.next_value()?;
            let version = Version::parse(&text).map_err(<A::Error as de::Error>::custom)?;
            pending.version = Some(version);
        }
        _ => {
            map.next_value::<IgnoredAny>()?;
        }
    }
    Ok(())
}

/// One `layers` array, top-level or inside a precomposition.
struct LayerListSeed<'a> {
    ctx: &'a ParseContext,
    warnings: &'a Warnings,
}

impl<'de> DeserializeSeed<'de> for LayerListSeed<'_> {
    type Value = LayerList;

    fn deserialize<D>(self, deserializer: D) -> Result<LayerList, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for LayerListSeed<'_> {
    type Value = LayerList;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of layers")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<LayerList, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut list = LayerList::new();
        let mut image_layers = 0;

        while let Some(raw) = seq.next_element::<data::Layer>()? {
            let layer =
                Layer::from_data(&raw, self.ctx).map_err(<A::Error as de::Error>::custom)?;
            if layer.layer_type() == LayerType::Image {
                image_layers += 1;
                if image_layers > MAX_IMAGE_LAYERS {
                    self.warnings.add(IMAGE_LAYER_ADVISORY);
                }
            }

            let (id, name) = (layer.id, layer.name.clone());
            if !list.push(layer) {
                self.warnings.add(format!(
                    "Layer id {id} is used more than once; `{name}` cannot be found by id"
                ));
            }
        }
        Ok(list)
    }
}

/// The `assets` array: precompositions and images mixed.
struct AssetListSeed<'a> {
    ctx: &'a ParseContext,
    warnings: &'a Warnings,
    tables: &'a mut Tables,
}

impl<'de> DeserializeSeed<'de> for AssetListSeed<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for AssetListSeed<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of assets")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        let tables = self.tables;
        while let Some(asset) = seq.next_element_seed(AssetSeed {
            ctx: self.ctx,
            warnings: self.warnings,
        })? {
            match asset {
                Asset::Precomp { id, layers } => {
                    if tables.precomps.contains_key(&id) {
                        self.warnings
                            .add(format!("Precomposition `{id}` is defined more than once"));
                    } else {
                        tables.precomps.insert(id, layers);
                    }
                }
                Asset::Image(image) => {
                    tables.images.insert(image.id.clone(), image);
                }
                Asset::Other => {}
            }
        }
        Ok(())
    }
}

/// Asset ids are usually strings but some exporters write numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum AssetId {
    Text(String),
    Number(i64),
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> String {
        match id {
            AssetId::Text(s) => s,
            AssetId::Number(n) => n.to_string(),
        }
    }
}

enum Asset {
    Precomp { id: String, layers: LayerList },
    Image(ImageAsset),
    Other,
}

struct AssetSeed<'a> {
    ctx: &'a ParseContext,
    warnings: &'a Warnings,
}

impl<'de> DeserializeSeed<'de> for AssetSeed<'_> {
    type Value = Asset;

    fn deserialize<D>(self, deserializer: D) -> Result<Asset, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for AssetSeed<'_> {
    type Value = Asset;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an asset object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Asset, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut id: Option<String> = None;
        let mut layers: Option<LayerList> = None;
        let mut file_name: Option<String> = None;
        let mut dir_name: Option<String> = None;
        let mut width: Option<f32> = None;
        let mut height: Option<f32> = None;
        let mut embedded = false;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "id" => id = Some(map.next_value::<AssetId>()?.into()),
                "layers" => {
                    layers = Some(map.next_value_seed(LayerListSeed {
                        ctx: self.ctx,
                        warnings: self.warnings,
                    })?)
                }
                "p" => file_name = Some(map.next_value()?),
                "u" => dir_name = Some(map.next_value()?),
                "w" => width = Some(map.next_value()?),
                "h" => height = Some(map.next_value()?),
                "e" => {
                    let flag: serde_json::Value = map.next_value()?;
                    embedded = flag.as_u64() == Some(1) || flag.as_bool() == Some(true);
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        let scale = self.ctx.scale;
        match (layers, file_name) {
            (Some(layers), _) => Ok(Asset::Precomp {
                id: id.ok_or_else(|| <A::Error as de::Error>::missing_field("id"))?,
                layers,
            }),
            (None, Some(file_name)) => Ok(Asset::Image(ImageAsset {
                id: id.ok_or_else(|| <A::Error as de::Error>::missing_field("id"))?,
                file_name,
                dir_name: dir_name.unwrap_or_default(),
                width: width.unwrap_or(0.0) * scale,
                height: height.unwrap_or(0.0) * scale,
                embedded,
            })),
            (None, None) => Ok(Asset::Other),
        }
    }
}

/// The `chars` array of glyph outlines.
struct CharListSeed<'a> {
    ctx: &'a ParseContext,
    tables: &'a mut Tables,
}

impl<'de> DeserializeSeed<'de> for CharListSeed<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for CharListSeed<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of font characters")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(raw) = seq.next_element::<data::FontCharacter>()? {
            let shapes = match &raw.data {
                Some(glyph) => {
                    ShapeItem::list_from_data(&glyph.shapes, self.ctx)
                        .map_err(<A::Error as de::Error>::custom)?
                }
                None => Vec::new(),
            };
            let character = FontCharacter {
                character: raw.ch,
                family: raw.family,
                style: raw.style,
                size: raw.size,
                width: raw.w,
                shapes,
            };
            self.tables.characters.insert(character.key(), character);
        }
        Ok(())
    }
}
