/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Layer and mask information section
//!
//! Layout, all lengths big endian (8 bytes wide where noted for PSB):
//!
//! ```text
//! section length (4|8)
//!   layer info length (4|8)
//!     layer count (i16, negative = merged alpha is transparency)
//!     layer records, bottom most layer first
//!     channel image data, same order as the records
//!   global layer mask info (4 byte length)
//!   additional layer info blocks (Lr16, Lr32, ...)
//! ```
use log::{debug, trace, warn};

use crate::bytestream::ByteCursor;
use crate::channel::{decode_layer_channel, ChannelGeometry, ChannelSamples};
use crate::chunk::{
    read_block, read_length, read_pascal_string, read_signature, read_tagged_block,
    read_unicode_string, skip_block, take_padded, LengthWidth, Padding, Tagged, TaggedBlock
};
use crate::constants::{
    channel_ids, BlendMode, LayerType, MAX_CHANNELS, MAX_LAYER_COUNT, MIN_LAYER_RECORD_SIZE,
    PSB_LONG_KEYS, PSB_MAX_DIMENSION, BLEND_SIGNATURE, EXTRA_SIGNATURES, RESOURCE_SIGNATURE
};
use crate::descriptor::{read_descriptor, Descriptor, DescriptorValue};
use crate::errors::PsdDecodeErrors;
use crate::header::PsdHeader;

/// Rectangle with exclusive right and bottom edges
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct LayerRect {
    pub top:    i32,
    pub left:   i32,
    pub bottom: i32,
    pub right:  i32
}

impl LayerRect {
    fn read(stream: &mut ByteCursor) -> Result<LayerRect, PsdDecodeErrors> {
        Ok(LayerRect {
            top:    stream.read_i32()?,
            left:   stream.read_i32()?,
            bottom: stream.read_i32()?,
            right:  stream.read_i32()?
        })
    }

    pub fn width(&self) -> usize {
        (i64::from(self.right) - i64::from(self.left)).max(0) as usize
    }

    pub fn height(&self) -> usize {
        (i64::from(self.bottom) - i64::from(self.top)).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    fn validate(&self) -> Result<(), PsdDecodeErrors> {
        if self.bottom < self.top || self.right < self.left {
            return Err(PsdDecodeErrors::Generic("Layer rectangle has a negative width or height"));
        }
        if self.width() > PSB_MAX_DIMENSION || self.height() > PSB_MAX_DIMENSION {
            return Err(PsdDecodeErrors::LargeDimensions(
                PSB_MAX_DIMENSION,
                self.width().max(self.height())
            ));
        }
        Ok(())
    }
}

/// Channel id and the byte length of its data
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ChannelInfo {
    pub id:     i16,
    pub length: usize
}

/// Optional density and feather values of a mask
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct MaskParameters {
    pub user_density:   Option<u8>,
    pub user_feather:   Option<f64>,
    pub vector_density: Option<u8>,
    pub vector_feather: Option<f64>
}

/// Rectangle, flags and background of the second mask present when a
/// layer has both a pixel and a vector mask
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RealUserMask {
    pub flags:         u8,
    pub default_color: u8,
    pub rect:          LayerRect
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayerMask {
    pub rect:          LayerRect,
    /// Coverage outside `rect`, 0 or 255
    pub default_color: u8,
    pub flags:         u8,
    pub parameters:    Option<MaskParameters>,
    pub real:          Option<RealUserMask>
}

impl LayerMask {
    pub const fn is_position_relative(&self) -> bool {
        self.flags & 1 != 0
    }

    pub const fn is_disabled(&self) -> bool {
        self.flags & 2 != 0
    }

    pub const fn is_inverted(&self) -> bool {
        self.flags & 4 != 0
    }

    fn parse(mut stream: ByteCursor) -> Result<LayerMask, PsdDecodeErrors> {
        let length = stream.len();
        let rect = LayerRect::read(&mut stream)?;
        rect.validate()?;
        let default_color = stream.read_u8()?;
        let flags = stream.read_u8()?;

        let mut mask = LayerMask {
            rect,
            default_color,
            flags,
            parameters: None,
            real: None
        };
        if length == 20 {
            // two padding bytes
            return Ok(mask);
        }
        if length >= 36 {
            let flags = stream.read_u8()?;
            let default_color = stream.read_u8()?;
            let rect = LayerRect::read(&mut stream)?;
            mask.real = Some(RealUserMask {
                flags,
                default_color,
                rect
            });
        }
        if flags & 16 != 0 && stream.has(1) {
            let present = stream.read_u8()?;
            let mut parameters = MaskParameters::default();

            if present & 1 != 0 {
                parameters.user_density = Some(stream.read_u8()?);
            }
            if present & 2 != 0 {
                parameters.user_feather = Some(stream.read_f64()?);
            }
            if present & 4 != 0 {
                parameters.vector_density = Some(stream.read_u8()?);
            }
            if present & 8 != 0 {
                parameters.vector_feather = Some(stream.read_f64()?);
            }
            mask.parameters = Some(parameters);
        }
        Ok(mask)
    }
}

/// Comp specific state of a layer from its `cmls` metadata
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LayerCompState {
    pub id:       u32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub enabled:  bool
}

/// `lsct` / `lsdk` block
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SectionDivider {
    pub layer_type: LayerType,
    pub blend_mode: Option<BlendMode>,
    /// 0 = normal, 1 = scene group
    pub sub_type:   Option<u32>
}

/// Additional layer info blocks we decode
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalInfo {
    UnicodeName(String),
    LayerId(u32),
    SectionDivider(SectionDivider),
    FillOpacity(u8),
    CompStates(Vec<LayerCompState>)
}

/// Decoded planes of one channel
#[derive(Debug, Clone, PartialEq)]
pub struct LayerChannel {
    pub id:      i16,
    pub samples: ChannelSamples
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerRecord {
    pub rect:            LayerRect,
    pub channels:        Vec<ChannelInfo>,
    pub blend_mode:      BlendMode,
    pub opacity:         u8,
    pub clipping:        u8,
    pub flags:           u8,
    pub mask:            Option<LayerMask>,
    /// Blending ranges, kept undecoded
    pub blending_ranges: Vec<u8>,
    pub legacy_name:     String,
    pub unicode_name:    Option<String>,
    pub layer_id:        Option<u32>,
    pub layer_type:      LayerType,
    pub fill_opacity:    u8,
    pub comp_states:     Vec<LayerCompState>,
    pub additional_info: Vec<Tagged<AdditionalInfo>>,
    /// Number of enclosing groups
    pub depth:           usize,
    /// Index of the enclosing group's opening record
    pub parent:          Option<usize>,
    pub(crate) data:     Vec<LayerChannel>
}

impl LayerRecord {
    /// Unicode name when present, otherwise the legacy name
    pub fn name(&self) -> &str {
        self.unicode_name.as_deref().unwrap_or(&self.legacy_name)
    }

    pub const fn is_transparency_protected(&self) -> bool {
        self.flags & 1 != 0
    }

    pub const fn is_visible(&self) -> bool {
        self.flags & 2 == 0
    }

    pub const fn is_obsolete(&self) -> bool {
        self.flags & 4 != 0
    }

    /// Only meaningful when bit 3 says bit 4 carries information
    pub const fn is_pixel_data_irrelevant(&self) -> bool {
        self.flags & 8 != 0 && self.flags & 16 != 0
    }

    pub const fn is_clipped(&self) -> bool {
        self.clipping != 0
    }

    /// Decoded samples of the channel with this id
    pub fn channel(&self, id: i16) -> Option<&ChannelSamples> {
        self.data.iter().find(|c| c.id == id).map(|c| &c.samples)
    }

    pub fn decoded_channels(&self) -> &[LayerChannel] {
        &self.data
    }

    /// Rectangle a channel's samples cover
    pub fn channel_rect(&self, id: i16) -> LayerRect {
        match id {
            channel_ids::USER_MASK => self.mask.map(|m| m.rect).unwrap_or_default(),
            channel_ids::REAL_USER_MASK => self
                .mask
                .and_then(|m| m.real)
                .map(|r| r.rect)
                .unwrap_or_default(),
            _ => self.rect
        }
    }
}

/// Global layer mask info
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct GlobalLayerMask {
    pub overlay_color_space: u16,
    pub color_components:    [u16; 4],
    /// 0 = transparent, 100 = opaque
    pub opacity:             u16,
    /// 0 = color selected, 1 = color protected, 128 = per layer
    pub kind:                u8
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerSection {
    /// Records in file order, bottom most first
    pub layers:                  Vec<LayerRecord>,
    pub merged_has_transparency: bool,
    pub global_mask:             Option<GlobalLayerMask>,
    /// Document wide blocks after the global mask other than the layer
    /// info containers
    pub additional_info:         Vec<Tagged<()>>
}

/// Parse the layer and mask information section.
///
/// `section` covers exactly the section payload. Any failure is reported
/// as [`PsdDecodeErrors::LayerDirectoryCorrupt`].
pub fn parse_layer_section(section: ByteCursor, header: &PsdHeader) -> Result<LayerSection, PsdDecodeErrors> {
    parse_section_inner(section, header).map_err(|e| e.in_layer_directory(None))
}

fn parse_section_inner(mut section: ByteCursor, header: &PsdHeader) -> Result<LayerSection, PsdDecodeErrors> {
    let mut out = LayerSection::default();

    if section.is_eof() {
        return Ok(out);
    }
    let width = LengthWidth::for_version(header.version);

    let layer_info = read_block(&mut section, width, Padding::None)?;
    if !layer_info.is_empty() {
        parse_layer_info(layer_info, header, &mut out)?;
    }

    if section.has(4) {
        let global = read_block(&mut section, LengthWidth::Four, Padding::None)?;
        out.global_mask = parse_global_mask(global)?;
    }

    while section.has(12) {
        let block = match read_tagged_block(&mut section, EXTRA_SIGNATURES, width, PSB_LONG_KEYS, Padding::Quad) {
            Ok(block) => block,
            Err(e) => {
                warn!("Stopping at unreadable global layer info block: {e:?}");
                break;
            }
        };
        let key = block.key;
        match &key {
            b"Lr16" | b"Lr32" | b"Layr" if out.layers.is_empty() => {
                debug!("Layer info stored in {:?} block", String::from_utf8_lossy(&key));
                parse_layer_info(block.body, header, &mut out)?;
            }
            _ => out.additional_info.push(skip_block(block))
        }
    }
    debug!("Parsed {} layers", out.layers.len());

    Ok(out)
}

fn parse_global_mask(mut stream: ByteCursor) -> Result<Option<GlobalLayerMask>, PsdDecodeErrors> {
    if stream.len() < 13 {
        return Ok(None);
    }
    let overlay_color_space = stream.read_u16()?;
    let mut color_components = [0; 4];
    for component in &mut color_components {
        *component = stream.read_u16()?;
    }
    Ok(Some(GlobalLayerMask {
        overlay_color_space,
        color_components,
        opacity: stream.read_u16()?,
        kind: stream.read_u8()?
    }))
}

/// Layer count, records and channel data
fn parse_layer_info(
    mut stream: ByteCursor, header: &PsdHeader, out: &mut LayerSection
) -> Result<(), PsdDecodeErrors> {
    let raw_count = stream.read_i16()?;
    let count = usize::from(raw_count.unsigned_abs());

    out.merged_has_transparency = raw_count < 0;

    if count > MAX_LAYER_COUNT {
        return Err(PsdDecodeErrors::Generic("Layer count exceeds the supported maximum"));
    }
    if !stream.has(count * MIN_LAYER_RECORD_SIZE) {
        return Err(PsdDecodeErrors::TruncatedData(
            count * MIN_LAYER_RECORD_SIZE,
            stream.remaining()
        ));
    }
    trace!("Layer count: {count}");

    let mut layers = Vec::with_capacity(count);
    for index in 0..count {
        let record = parse_record(&mut stream, header).map_err(|e| e.in_layer_directory(Some(index)))?;
        layers.push(record);
    }

    for (index, layer) in layers.iter_mut().enumerate() {
        read_layer_channels(&mut stream, header, layer).map_err(|e| e.in_layer_directory(Some(index)))?;
    }
    assign_nesting(&mut layers);

    out.layers = layers;
    Ok(())
}

fn parse_record(stream: &mut ByteCursor, header: &PsdHeader) -> Result<LayerRecord, PsdDecodeErrors> {
    let width = LengthWidth::for_version(header.version);

    let rect = LayerRect::read(stream)?;
    rect.validate()?;

    let channel_count = stream.read_u16()?;
    if channel_count > MAX_CHANNELS {
        return Err(PsdDecodeErrors::UnsupportedChannelCount(channel_count));
    }
    let mut channels = Vec::with_capacity(usize::from(channel_count));
    for _ in 0..channel_count {
        let id = stream.read_i16()?;
        let length = read_length(stream, width)?;
        channels.push(ChannelInfo { id, length });
    }

    read_signature(stream, &[BLEND_SIGNATURE])?;
    let blend_mode = BlendMode::from_key(stream.read_fixed_bytes::<4>()?);
    let opacity = stream.read_u8()?;
    let clipping = stream.read_u8()?;
    let flags = stream.read_u8()?;
    let _filler = stream.read_u8()?;

    let mut extra = read_block(stream, LengthWidth::Four, Padding::None)?;

    let mask_block = read_block(&mut extra, LengthWidth::Four, Padding::None)?;
    let mask = if mask_block.is_empty() {
        None
    } else {
        Some(LayerMask::parse(mask_block)?)
    };
    let blending_ranges = read_block(&mut extra, LengthWidth::Four, Padding::None)?
        .read_remaining()
        .to_vec();
    let legacy_name = read_pascal_string(&mut extra, Padding::Quad)?;

    let mut record = LayerRecord {
        rect,
        channels,
        blend_mode,
        opacity,
        clipping,
        flags,
        mask,
        blending_ranges,
        legacy_name,
        unicode_name: None,
        layer_id: None,
        layer_type: LayerType::Any,
        fill_opacity: 255,
        comp_states: vec![],
        additional_info: vec![],
        depth: 0,
        parent: None,
        data: vec![]
    };

    while extra.has(12) {
        let block = match read_tagged_block(&mut extra, EXTRA_SIGNATURES, width, PSB_LONG_KEYS, Padding::None) {
            Ok(block) => block,
            Err(e) => {
                // the record itself is bounded by its extra data length
                warn!("Stopping at unreadable layer info block: {e:?}");
                break;
            }
        };
        // odd blocks may or may not be followed by a pad byte, signatures start with '8'
        if block.body.len() % 2 == 1 && matches!(extra.peek_fixed_bytes::<1>(), Ok([pad]) if pad != b'8') {
            extra.skip(1)?;
        }
        let info = decode_additional_info(block);

        if let Tagged::Parsed(value) = &info {
            match value {
                AdditionalInfo::UnicodeName(name) => record.unicode_name = Some(name.clone()),
                AdditionalInfo::LayerId(id) => record.layer_id = Some(*id),
                AdditionalInfo::SectionDivider(divider) => record.layer_type = divider.layer_type,
                AdditionalInfo::FillOpacity(value) => record.fill_opacity = *value,
                AdditionalInfo::CompStates(states) => record.comp_states = states.clone()
            }
        }
        record.additional_info.push(info);
    }

    trace!(
        "Layer {:?}: {:?}, channels {:?}",
        record.name(),
        record.rect,
        record.channels.iter().map(|c| c.id).collect::<Vec<_>>()
    );
    Ok(record)
}

fn decode_additional_info(block: TaggedBlock) -> Tagged<AdditionalInfo> {
    let mut body = block.body.clone();
    let key = block.key;

    let result = match &key {
        b"luni" => read_unicode_string(&mut body).map(AdditionalInfo::UnicodeName),
        b"lyid" => body
            .read_u32()
            .map(AdditionalInfo::LayerId)
            .map_err(PsdDecodeErrors::from),
        b"lsct" | b"lsdk" => parse_section_divider(&mut body).map(AdditionalInfo::SectionDivider),
        b"iOpa" => body
            .read_u8()
            .map(AdditionalInfo::FillOpacity)
            .map_err(PsdDecodeErrors::from),
        b"shmd" => parse_metadata(&mut body).map(AdditionalInfo::CompStates),
        _ => return skip_block(block)
    };
    match result {
        Ok(info) => Tagged::Parsed(info),
        Err(e) => {
            warn!(
                "Could not decode layer info block {:?}: {e:?}",
                String::from_utf8_lossy(&key)
            );
            skip_block(block)
        }
    }
}

fn parse_section_divider(stream: &mut ByteCursor) -> Result<SectionDivider, PsdDecodeErrors> {
    let kind = stream.read_u32()?;
    let layer_type = LayerType::from_int(kind).unwrap_or_else(|| {
        warn!("Unknown section divider type {kind}, treating as a regular layer");
        LayerType::Any
    });
    let mut divider = SectionDivider {
        layer_type,
        blend_mode: None,
        sub_type: None
    };
    if stream.has(8) {
        read_signature(stream, &[RESOURCE_SIGNATURE])?;
        divider.blend_mode = Some(BlendMode::from_key(stream.read_fixed_bytes::<4>()?));
    }
    if stream.has(4) {
        divider.sub_type = Some(stream.read_u32()?);
    }
    Ok(divider)
}

/// `shmd` metadata, only the `cmls` item is decoded
fn parse_metadata(stream: &mut ByteCursor) -> Result<Vec<LayerCompState>, PsdDecodeErrors> {
    let count = stream.read_u32()?;
    let mut states = vec![];

    for _ in 0..count {
        read_signature(stream, &[RESOURCE_SIGNATURE])?;
        let key = stream.read_fixed_bytes::<4>()?;
        let _copy_on_sheet = stream.read_fixed_bytes::<4>()?;
        let length = stream.read_u32()? as usize;
        let mut body = take_padded(stream, length, Padding::None)?;

        if &key == b"cmls" {
            let _version = body.read_u32()?;
            let descriptor = read_descriptor(&mut body)?;
            collect_comp_states(&descriptor, &mut states);
        }
    }
    Ok(states)
}

fn collect_comp_states(descriptor: &Descriptor, states: &mut Vec<LayerCompState>) {
    let settings = descriptor
        .get_list("layerSettings")
        .unwrap_or_default()
        .iter()
        .filter_map(DescriptorValue::as_descriptor);

    for setting in settings {
        let ids = setting
            .get_list("compList")
            .unwrap_or_default()
            .iter()
            .filter_map(DescriptorValue::as_i32);

        for id in ids {
            let id = id as u32;
            let position = match states.iter().position(|s| s.id == id) {
                Some(position) => position,
                None => {
                    states.push(LayerCompState {
                        id,
                        offset_x: 0,
                        offset_y: 0,
                        enabled: true
                    });
                    states.len() - 1
                }
            };
            let state = &mut states[position];

            if let Some(enabled) = setting.get_bool("enab") {
                state.enabled = enabled;
            }
            if let Some(offset) = setting.get_descriptor("Ofst") {
                state.offset_x = offset.get_f64("Hrzn").unwrap_or(0.0) as i32;
                state.offset_y = offset.get_f64("Vrtc").unwrap_or(0.0) as i32;
            }
        }
    }
}

fn read_layer_channels(
    stream: &mut ByteCursor, header: &PsdHeader, layer: &mut LayerRecord
) -> Result<(), PsdDecodeErrors> {
    let mut data = Vec::with_capacity(layer.channels.len());

    for info in &layer.channels {
        let bytes = stream.read_bytes(info.length)?;
        let rect = layer.channel_rect(info.id);
        let geometry = ChannelGeometry {
            width:   rect.width(),
            height:  rect.height(),
            depth:   header.depth,
            version: header.version
        };
        let samples = decode_layer_channel(bytes, geometry)?;
        data.push(LayerChannel {
            id: info.id,
            samples
        });
    }
    layer.data = data;
    Ok(())
}

/// Fill in `depth` and `parent`.
///
/// Records run bottom to top, so a group's divider comes before its
/// children and the folder record after them. Walking backwards the folder
/// is seen first.
fn assign_nesting(layers: &mut [LayerRecord]) {
    let mut open: Vec<usize> = vec![];

    for index in (0..layers.len()).rev() {
        layers[index].depth = open.len();
        layers[index].parent = open.last().copied();

        match layers[index].layer_type {
            LayerType::OpenFolder | LayerType::ClosedFolder => open.push(index),
            LayerType::BoundingSectionDivider => {
                if open.pop().is_none() {
                    warn!("Section divider {index} without an enclosing group");
                }
            }
            LayerType::Any => ()
        }
    }
    if !open.is_empty() {
        warn!("{} groups are never closed", open.len());
    }
}
