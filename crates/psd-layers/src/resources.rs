/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Image resources
//!
//! The resource section is a run of `8BIM` blocks keyed by a numeric id.
//! Ids we understand are decoded into the types below, every other block is
//! kept verbatim.
use log::{debug, warn};

use crate::bytestream::ByteCursor;
use crate::chunk::{
    read_block, read_pascal_string, read_signature, read_unicode_string, LengthWidth, Padding,
    Tagged
};
use crate::constants::{resource_ids, RESOURCE_SIGNATURES};
use crate::descriptor::{read_descriptor, Descriptor, DescriptorValue};
use crate::errors::PsdDecodeErrors;

/// Print resolution, stored as 16.16 fixed point
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ResolutionInfo {
    pub horizontal_dpi:  f64,
    /// 1 = pixels per inch, 2 = pixels per cm
    pub horizontal_unit: u16,
    pub width_unit:      u16,
    pub vertical_dpi:    f64,
    pub vertical_unit:   u16,
    pub height_unit:     u16
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GuideDirection {
    Vertical,
    Horizontal
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Guide {
    /// Position in 1/32 of a pixel
    pub location:  i32,
    pub direction: GuideDirection
}

impl Guide {
    pub fn pixels(&self) -> f64 {
        f64::from(self.location) / 32.0
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GridAndGuides {
    pub version:         u32,
    /// Grid cycle, 1/32 pixel units
    pub horizontal_grid: u32,
    pub vertical_grid:   u32,
    pub guides:          Vec<Guide>
}

impl GridAndGuides {
    pub fn vertical(&self) -> Vec<i32> {
        self.locations(GuideDirection::Vertical)
    }

    pub fn horizontal(&self) -> Vec<i32> {
        self.locations(GuideDirection::Horizontal)
    }

    fn locations(&self, direction: GuideDirection) -> Vec<i32> {
        self.guides
            .iter()
            .filter(|g| g.direction == direction)
            .map(|g| g.location)
            .collect()
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Thumbnail {
    /// 1 = JFIF, 0 = raw RGB
    pub format:          u32,
    pub width:           u32,
    pub height:          u32,
    pub width_bytes:     u32,
    pub total_size:      u32,
    pub compressed_size: u32,
    pub bits_per_pixel:  u16,
    pub planes:          u16,
    /// Resource 1033 stores BGR instead of RGB
    pub legacy:          bool,
    pub data:            Vec<u8>
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Slice {
    pub id:                   u32,
    pub group_id:             u32,
    pub origin:               u32,
    /// Only present for layer based slices
    pub associated_layer_id:  Option<u32>,
    pub name:                 String,
    pub slice_type:           u32,
    pub left:                 i32,
    pub top:                  i32,
    pub right:                i32,
    pub bottom:               i32,
    pub url:                  String,
    pub target:               String,
    pub message:              String,
    pub alt_tag:              String,
    pub cell_text_is_html:    bool,
    pub cell_text:            String,
    pub horizontal_alignment: u32,
    pub vertical_alignment:   u32,
    /// Alpha, red, green, blue
    pub color:                [u8; 4]
}

impl Slice {
    /// Background colour packed as `0xAARRGGBB`
    pub fn argb(&self) -> u32 {
        u32::from_be_bytes(self.color)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Slices {
    pub version:    u32,
    pub top:        i32,
    pub left:       i32,
    pub bottom:     i32,
    pub right:      i32,
    pub group_name: String,
    pub slices:     Vec<Slice>
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct LayerComp {
    pub id:                u32,
    pub name:              String,
    pub comment:           String,
    pub record_visibility: bool,
    pub record_position:   bool,
    pub record_appearance: bool
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct LayerComps {
    pub last_applied_id: Option<u32>,
    pub comps:           Vec<LayerComp>
}

/// Decoded payload of a resource we understand
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Resolution(ResolutionInfo),
    /// Index of the target layer
    LayerState(u16),
    /// Group id per layer
    LayerGroupInfo(Vec<u16>),
    GridAndGuides(GridAndGuides),
    Thumbnail(Thumbnail),
    IccProfile(Vec<u8>),
    IdSeed(u32),
    TransparencyIndex(u16),
    Slices(Slices),
    LayerComps(LayerComps),
    LayerSelectionIds(Vec<u32>)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageResource {
    pub id:    u16,
    pub name:  String,
    pub value: Tagged<Resource>
}

/// Every resource block in file order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageResources {
    resources: Vec<ImageResource>
}

impl ImageResources {
    pub fn iter(&self) -> impl Iterator<Item = &ImageResource> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// First resource with this id
    pub fn get(&self, id: u16) -> Option<&ImageResource> {
        self.resources.iter().find(|r| r.id == id)
    }

    fn parsed(&self, id: u16) -> Option<&Resource> {
        self.get(id).and_then(|r| r.value.parsed())
    }

    pub fn resolution(&self) -> Option<&ResolutionInfo> {
        match self.parsed(resource_ids::RESOLUTION_INFO)? {
            Resource::Resolution(r) => Some(r),
            _ => None
        }
    }

    pub fn guides(&self) -> Option<&GridAndGuides> {
        match self.parsed(resource_ids::GRID_AND_GUIDES)? {
            Resource::GridAndGuides(g) => Some(g),
            _ => None
        }
    }

    pub fn slices(&self) -> Option<&Slices> {
        match self.parsed(resource_ids::SLICES)? {
            Resource::Slices(s) => Some(s),
            _ => None
        }
    }

    pub fn layer_comps(&self) -> Option<&LayerComps> {
        match self.parsed(resource_ids::LAYER_COMPS)? {
            Resource::LayerComps(c) => Some(c),
            _ => None
        }
    }

    pub fn icc_profile(&self) -> Option<&[u8]> {
        match self.parsed(resource_ids::ICC_PROFILE)? {
            Resource::IccProfile(p) => Some(p),
            _ => None
        }
    }

    /// The newer thumbnail if present, otherwise the legacy one
    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        [resource_ids::THUMBNAIL, resource_ids::THUMBNAIL_LEGACY]
            .into_iter()
            .find_map(|id| match self.parsed(id)? {
                Resource::Thumbnail(t) => Some(t),
                _ => None
            })
    }
}

/// Parse the whole image resource section.
///
/// `section` covers exactly the section payload (its length already read).
pub fn parse_resources(mut section: ByteCursor) -> Result<ImageResources, PsdDecodeErrors> {
    let mut resources = vec![];

    while !section.is_eof() {
        let signature = read_signature(&mut section, RESOURCE_SIGNATURES)?;
        let id = section.read_u16()?;
        let name = read_pascal_string(&mut section, Padding::Even)?;
        let body = read_block(&mut section, LengthWidth::Four, Padding::Even)?;

        debug!("Resource {id} ({} bytes)", body.len());

        let value = decode_resource(id, signature, body);
        resources.push(ImageResource { id, name, value });
    }
    Ok(ImageResources { resources })
}

fn decode_resource(id: u16, signature: [u8; 4], body: ByteCursor) -> Tagged<Resource> {
    let mut stream = body.clone();

    let result = match id {
        resource_ids::RESOLUTION_INFO => parse_resolution(&mut stream).map(Resource::Resolution),
        resource_ids::LAYER_STATE => stream
            .read_u16()
            .map(Resource::LayerState)
            .map_err(PsdDecodeErrors::from),
        resource_ids::LAYER_GROUP_INFO => Ok(Resource::LayerGroupInfo(
            stream
                .read_remaining()
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect()
        )),
        resource_ids::GRID_AND_GUIDES => parse_guides(&mut stream).map(Resource::GridAndGuides),
        resource_ids::THUMBNAIL | resource_ids::THUMBNAIL_LEGACY => {
            parse_thumbnail(&mut stream, id == resource_ids::THUMBNAIL_LEGACY).map(Resource::Thumbnail)
        }
        resource_ids::ICC_PROFILE => Ok(Resource::IccProfile(stream.read_remaining().to_vec())),
        resource_ids::ID_SEED => stream
            .read_u32()
            .map(Resource::IdSeed)
            .map_err(PsdDecodeErrors::from),
        resource_ids::TRANSPARENCY_INDEX => stream
            .read_u16()
            .map(Resource::TransparencyIndex)
            .map_err(PsdDecodeErrors::from),
        resource_ids::SLICES => parse_slices(&mut stream).map(Resource::Slices),
        resource_ids::LAYER_COMPS => parse_layer_comps(&mut stream).map(Resource::LayerComps),
        resource_ids::LAYER_SELECTION_IDS => parse_selection_ids(&mut stream).map(Resource::LayerSelectionIds),
        _ => {
            return Tagged::Skipped {
                signature,
                data: body.clone().read_remaining().to_vec()
            }
        }
    };

    match result {
        Ok(resource) => Tagged::Parsed(resource),
        Err(e) => {
            // contained by the block length, the rest of the file is unaffected
            warn!("Could not decode resource {id}, keeping raw bytes: {e:?}");
            Tagged::Skipped {
                signature,
                data: body.clone().read_remaining().to_vec()
            }
        }
    }
}

fn read_fixed(stream: &mut ByteCursor) -> Result<f64, PsdDecodeErrors> {
    Ok(f64::from(stream.read_u32()?) / 65536.0)
}

fn parse_resolution(stream: &mut ByteCursor) -> Result<ResolutionInfo, PsdDecodeErrors> {
    Ok(ResolutionInfo {
        horizontal_dpi:  read_fixed(stream)?,
        horizontal_unit: stream.read_u16()?,
        width_unit:      stream.read_u16()?,
        vertical_dpi:    read_fixed(stream)?,
        vertical_unit:   stream.read_u16()?,
        height_unit:     stream.read_u16()?
    })
}

fn parse_guides(stream: &mut ByteCursor) -> Result<GridAndGuides, PsdDecodeErrors> {
    let version = stream.read_u32()?;
    let horizontal_grid = stream.read_u32()?;
    let vertical_grid = stream.read_u32()?;
    let count = stream.read_u32()? as usize;

    if !stream.has(count.saturating_mul(5)) {
        return Err(PsdDecodeErrors::TruncatedData(
            count.saturating_mul(5),
            stream.remaining()
        ));
    }
    let mut guides = Vec::with_capacity(count);
    for _ in 0..count {
        let location = stream.read_i32()?;
        let direction = match stream.read_u8()? {
            0 => GuideDirection::Vertical,
            _ => GuideDirection::Horizontal
        };
        guides.push(Guide { location, direction });
    }
    Ok(GridAndGuides {
        version,
        horizontal_grid,
        vertical_grid,
        guides
    })
}

fn parse_thumbnail(stream: &mut ByteCursor, legacy: bool) -> Result<Thumbnail, PsdDecodeErrors> {
    Ok(Thumbnail {
        format: stream.read_u32()?,
        width: stream.read_u32()?,
        height: stream.read_u32()?,
        width_bytes: stream.read_u32()?,
        total_size: stream.read_u32()?,
        compressed_size: stream.read_u32()?,
        bits_per_pixel: stream.read_u16()?,
        planes: stream.read_u16()?,
        legacy,
        data: stream.read_remaining().to_vec()
    })
}

fn parse_selection_ids(stream: &mut ByteCursor) -> Result<Vec<u32>, PsdDecodeErrors> {
    let count = usize::from(stream.read_u16()?);
    let bytes = stream.read_bytes(count * 4)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn parse_slices(stream: &mut ByteCursor) -> Result<Slices, PsdDecodeErrors> {
    let version = stream.read_u32()?;

    match version {
        6 => parse_slices_v6(stream),
        7 | 8 => {
            let _descriptor_version = stream.read_u32()?;
            let descriptor = read_descriptor(stream)?;
            Ok(slices_from_descriptor(version, &descriptor))
        }
        _ => Err(PsdDecodeErrors::Generic("Unknown slices resource version"))
    }
}

fn parse_slices_v6(stream: &mut ByteCursor) -> Result<Slices, PsdDecodeErrors> {
    let top = stream.read_i32()?;
    let left = stream.read_i32()?;
    let bottom = stream.read_i32()?;
    let right = stream.read_i32()?;
    let group_name = read_unicode_string(stream)?;
    let count = stream.read_u32()? as usize;

    let mut slices = Vec::with_capacity(count.min(stream.remaining() / 16));

    for _ in 0..count {
        let id = stream.read_u32()?;
        let group_id = stream.read_u32()?;
        let origin = stream.read_u32()?;
        let associated_layer_id = if origin == 1 {
            Some(stream.read_u32()?)
        } else {
            None
        };
        let name = read_unicode_string(stream)?;
        let slice_type = stream.read_u32()?;
        let left = stream.read_i32()?;
        let top = stream.read_i32()?;
        let right = stream.read_i32()?;
        let bottom = stream.read_i32()?;
        let url = read_unicode_string(stream)?;
        let target = read_unicode_string(stream)?;
        let message = read_unicode_string(stream)?;
        let alt_tag = read_unicode_string(stream)?;
        let cell_text_is_html = stream.read_u8()? != 0;
        let cell_text = read_unicode_string(stream)?;
        let horizontal_alignment = stream.read_u32()?;
        let vertical_alignment = stream.read_u32()?;
        let color = stream.read_fixed_bytes::<4>()?;

        slices.push(Slice {
            id,
            group_id,
            origin,
            associated_layer_id,
            name,
            slice_type,
            left,
            top,
            right,
            bottom,
            url,
            target,
            message,
            alt_tag,
            cell_text_is_html,
            cell_text,
            horizontal_alignment,
            vertical_alignment,
            color
        });
    }
    // an optional descriptor with the same data may follow, we have it all already
    Ok(Slices {
        version: 6,
        top,
        left,
        bottom,
        right,
        group_name,
        slices
    })
}

fn enum_value(descriptor: &Descriptor, key: &str) -> Option<String> {
    match descriptor.get(key)? {
        DescriptorValue::Enumerated { value, .. } => Some(value.clone()),
        _ => None
    }
}

/// `Top `, `Left`, `Btom`, `Rght` of a bounds object
fn bounds(descriptor: Option<&Descriptor>) -> (i32, i32, i32, i32) {
    let Some(b) = descriptor else {
        return (0, 0, 0, 0);
    };
    let get = |key| b.get_i32(key).unwrap_or(0);
    (get("Top "), get("Left"), get("Btom"), get("Rght"))
}

fn slices_from_descriptor(version: u32, descriptor: &Descriptor) -> Slices {
    let (top, left, bottom, right) = bounds(descriptor.get_descriptor("bounds"));
    let text = |d: &Descriptor, key| d.get_str(key).unwrap_or_default().to_string();

    let slices = descriptor
        .get_list("slices")
        .unwrap_or_default()
        .iter()
        .filter_map(DescriptorValue::as_descriptor)
        .map(|s| {
            let origin = match enum_value(s, "origin").as_deref() {
                Some("layerGenerated") => 1,
                Some("userGenerated") => 2,
                _ => 0
            };
            let slice_type = match enum_value(s, "Type").as_deref() {
                Some("Img ") => 1,
                _ => 0
            };
            let horizontal_alignment = match enum_value(s, "horzAlign").as_deref() {
                Some("left") => 1,
                Some("center") => 2,
                Some("right") => 3,
                _ => 0
            };
            let vertical_alignment = match enum_value(s, "vertAlign").as_deref() {
                Some("top") => 1,
                Some("center") => 2,
                Some("bottom") => 3,
                Some("baseline") => 4,
                _ => 0
            };
            let (s_top, s_left, s_bottom, s_right) = bounds(s.get_descriptor("bounds"));
            let color = s
                .get_descriptor("bgColor")
                .map(|c| {
                    let channel = |key| c.get_i32(key).unwrap_or(0).clamp(0, 255) as u8;
                    [channel("alpha"), channel("Rd  "), channel("Grn "), channel("Bl  ")]
                })
                .unwrap_or_default();

            Slice {
                id: s.get_i32("sliceID").unwrap_or(0) as u32,
                group_id: s.get_i32("groupID").unwrap_or(0) as u32,
                origin,
                associated_layer_id: s.get_i32("layerID").map(|x| x as u32),
                name: text(s, "Nm  "),
                slice_type,
                left: s_left,
                top: s_top,
                right: s_right,
                bottom: s_bottom,
                url: text(s, "url"),
                target: text(s, "null"),
                message: text(s, "Msge"),
                alt_tag: text(s, "altTag"),
                cell_text_is_html: s.get_bool("cellTextIsHTML").unwrap_or(false),
                cell_text: text(s, "cellText"),
                horizontal_alignment,
                vertical_alignment,
                color
            }
        })
        .collect();

    Slices {
        version,
        top,
        left,
        bottom,
        right,
        group_name: text(descriptor, "baseName"),
        slices
    }
}

fn parse_layer_comps(stream: &mut ByteCursor) -> Result<LayerComps, PsdDecodeErrors> {
    let _version = stream.read_u32()?;
    let descriptor = read_descriptor(stream)?;

    let comps = descriptor
        .get_list("list")
        .unwrap_or_default()
        .iter()
        .filter_map(DescriptorValue::as_descriptor)
        .map(|c| {
            let captured = c.get_i32("capturedInfo").unwrap_or(0);
            LayerComp {
                id:                c.get_i32("compID").unwrap_or(0) as u32,
                name:              c.get_str("Nm  ").unwrap_or_default().to_string(),
                comment:           c.get_str("comment").unwrap_or_default().to_string(),
                record_visibility: captured & 1 != 0,
                record_position:   captured & 2 != 0,
                record_appearance: captured & 4 != 0
            }
        })
        .collect();

    Ok(LayerComps {
        last_applied_id: descriptor.get_i32("lastAppliedComp").map(|x| x as u32),
        comps
    })
}
