/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A small PSD/PSB writer for building test files in memory.
//!
//! Channel data is given as raw big endian planes at the document depth,
//! the writer encodes it with the requested compression.
use std::io::Write;

use flate2::write::ZlibEncoder;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Encoding {
    Raw,
    Rle,
    Zip,
    ZipPrediction
}

impl Encoding {
    const fn tag(self) -> u16 {
        match self {
            Encoding::Raw => 0,
            Encoding::Rle => 1,
            Encoding::Zip => 2,
            Encoding::ZipPrediction => 3
        }
    }
}

/// PackBits encode one row
pub fn pack_bits(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(row.len() + row.len() / 128 + 1);
    let mut i = 0;

    while i < row.len() {
        let mut run = 1;
        while i + run < row.len() && run < 128 && row[i + run] == row[i] {
            run += 1;
        }
        if run >= 2 {
            out.push((1 - run as i16) as i8 as u8);
            out.push(row[i]);
            i += run;
            continue;
        }
        let start = i;
        while i < row.len() && i - start < 128 {
            if i + 1 < row.len() && row[i] == row[i + 1] {
                break;
            }
            i += 1;
        }
        out.push((i - start - 1) as u8);
        out.extend_from_slice(&row[start..i]);
    }
    out
}

/// Horizontal delta encoding of one plane, rows of `row_bytes` bytes
/// holding samples of `sample_bytes` bytes each
pub fn delta_encode(plane: &[u8], row_bytes: usize, sample_bytes: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(plane.len());

    for row in plane.chunks_exact(row_bytes) {
        match sample_bytes {
            1 => {
                out.push(row[0]);
                out.extend(row.windows(2).map(|w| w[1].wrapping_sub(w[0])));
            }
            2 => {
                let samples: Vec<u16> = row
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                out.extend_from_slice(&samples[0].to_be_bytes());
                for w in samples.windows(2) {
                    out.extend_from_slice(&w[1].wrapping_sub(w[0]).to_be_bytes());
                }
            }
            4 => {
                // byte planes first, then a byte delta over the whole row
                let width = row.len() / 4;
                let mut planes = vec![0_u8; row.len()];
                for x in 0..width {
                    for byte in 0..4 {
                        planes[byte * width + x] = row[x * 4 + byte];
                    }
                }
                out.push(planes[0]);
                out.extend(planes.windows(2).map(|w| w[1].wrapping_sub(w[0])));
            }
            _ => panic!("unsupported sample size {sample_bytes}")
        }
    }
    out
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Encode planes that share one compression tag, the tag included.
///
/// A layer channel is the single plane case.
pub fn encode_planes(
    planes: &[Vec<u8>], row_bytes: usize, sample_bytes: usize, encoding: Encoding, psb: bool
) -> Vec<u8> {
    let mut out = encoding.tag().to_be_bytes().to_vec();

    match encoding {
        Encoding::Raw => {
            for plane in planes {
                out.extend_from_slice(plane);
            }
        }
        Encoding::Rle => {
            let mut rows = vec![];
            for plane in planes {
                if row_bytes == 0 {
                    continue;
                }
                for row in plane.chunks_exact(row_bytes) {
                    let packed = pack_bits(row);
                    if psb {
                        out.extend_from_slice(&(packed.len() as u32).to_be_bytes());
                    } else {
                        out.extend_from_slice(&(packed.len() as u16).to_be_bytes());
                    }
                    rows.push(packed);
                }
            }
            for row in rows {
                out.extend_from_slice(&row);
            }
        }
        Encoding::Zip | Encoding::ZipPrediction => {
            let mut raw = vec![];
            for plane in planes {
                if encoding == Encoding::ZipPrediction && row_bytes > 0 {
                    raw.extend_from_slice(&delta_encode(plane, row_bytes, sample_bytes));
                } else {
                    raw.extend_from_slice(plane);
                }
            }
            out.extend_from_slice(&zlib(&raw));
        }
    }
    out
}

/// Bytes per row and bytes per sample at `depth`
pub const fn row_layout(depth: u16, width: usize) -> (usize, usize) {
    match depth {
        1 => ((width + 7) / 8, 1),
        16 => (width * 2, 2),
        32 => (width * 4, 4),
        _ => (width, 1)
    }
}

/// Top, left, bottom, right
pub type Rect = [i32; 4];

const fn rect_width(rect: Rect) -> usize {
    (rect[3] - rect[1]) as usize
}

#[derive(Clone, Debug)]
pub struct MaskSpec {
    pub rect:          Rect,
    pub default_color: u8,
    pub flags:         u8
}

#[derive(Clone, Debug)]
pub struct LayerSpec {
    pub rect:         Rect,
    pub channels:     Vec<(i16, Vec<u8>)>,
    pub encoding:     Encoding,
    pub name:         String,
    pub unicode_name: Option<String>,
    pub layer_id:     Option<u32>,
    pub divider:      Option<u32>,
    pub blend:        [u8; 4],
    pub opacity:      u8,
    pub clipping:     u8,
    pub flags:        u8,
    pub mask:         Option<MaskSpec>,
    pub extra_blocks: Vec<([u8; 4], Vec<u8>)>,
    /// Extra zero bytes appended to the data of one channel, counted in
    /// its declared length
    pub trailing:     Option<(usize, usize)>
}

impl LayerSpec {
    pub fn new(name: &str, rect: Rect) -> LayerSpec {
        LayerSpec {
            rect,
            channels: vec![],
            encoding: Encoding::Raw,
            name: name.to_string(),
            unicode_name: None,
            layer_id: None,
            divider: None,
            blend: *b"norm",
            opacity: 255,
            clipping: 0,
            flags: 0,
            mask: None,
            extra_blocks: vec![],
            trailing: None
        }
    }

    /// A group divider record without pixels
    pub fn divider(name: &str, kind: u32) -> LayerSpec {
        let mut layer = LayerSpec::new(name, [0, 0, 0, 0]);
        layer.divider = Some(kind);
        for id in [-1, 0, 1, 2] {
            layer.channels.push((id, vec![]));
        }
        layer
    }

    pub fn channel(mut self, id: i16, data: Vec<u8>) -> LayerSpec {
        self.channels.push((id, data));
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> LayerSpec {
        self.encoding = encoding;
        self
    }

    pub fn id(mut self, id: u32) -> LayerSpec {
        self.layer_id = Some(id);
        self
    }

    pub fn unicode(mut self, name: &str) -> LayerSpec {
        self.unicode_name = Some(name.to_string());
        self
    }

    pub fn mask(mut self, mask: MaskSpec) -> LayerSpec {
        self.mask = Some(mask);
        self
    }

    pub fn flags(mut self, flags: u8) -> LayerSpec {
        self.flags = flags;
        self
    }

    pub fn block(mut self, key: &[u8; 4], data: Vec<u8>) -> LayerSpec {
        self.extra_blocks.push((*key, data));
        self
    }

    fn channel_rect(&self, id: i16) -> Rect {
        match (id, &self.mask) {
            (-2, Some(mask)) => mask.rect,
            (-2, None) => [0, 0, 0, 0],
            _ => self.rect
        }
    }

    fn encoded_channels(&self, depth: u16, psb: bool) -> Vec<Vec<u8>> {
        self.channels
            .iter()
            .enumerate()
            .map(|(index, (id, data))| {
                let (row_bytes, sample_bytes) = row_layout(depth, rect_width(self.channel_rect(*id)));
                let mut encoded = encode_planes(&[data.clone()], row_bytes, sample_bytes, self.encoding, psb);

                if let Some((channel, extra)) = self.trailing {
                    if channel == index {
                        encoded.extend(std::iter::repeat(0).take(extra));
                    }
                }
                encoded
            })
            .collect()
    }

    fn record(&self, encoded: &[Vec<u8>], psb: bool) -> Vec<u8> {
        let mut out = vec![];
        for value in self.rect {
            out.extend_from_slice(&value.to_be_bytes());
        }
        out.extend_from_slice(&(self.channels.len() as u16).to_be_bytes());

        for ((id, _), data) in self.channels.iter().zip(encoded) {
            out.extend_from_slice(&id.to_be_bytes());
            write_length(&mut out, data.len(), psb);
        }
        out.extend_from_slice(b"8BIM");
        out.extend_from_slice(&self.blend);
        out.extend_from_slice(&[self.opacity, self.clipping, self.flags, 0]);

        let mut extra = vec![];
        match &self.mask {
            Some(mask) => {
                extra.extend_from_slice(&20_u32.to_be_bytes());
                for value in mask.rect {
                    extra.extend_from_slice(&value.to_be_bytes());
                }
                extra.extend_from_slice(&[mask.default_color, mask.flags, 0, 0]);
            }
            None => extra.extend_from_slice(&0_u32.to_be_bytes())
        }
        // blending ranges
        extra.extend_from_slice(&0_u32.to_be_bytes());

        extra.push(self.name.len() as u8);
        extra.extend_from_slice(self.name.as_bytes());
        while extra.len() % 4 != 0 {
            extra.push(0);
        }

        if let Some(name) = &self.unicode_name {
            let units: Vec<u16> = name.encode_utf16().collect();
            let mut body = (units.len() as u32).to_be_bytes().to_vec();
            for unit in units {
                body.extend_from_slice(&unit.to_be_bytes());
            }
            write_block(&mut extra, b"luni", &body);
        }
        if let Some(id) = self.layer_id {
            write_block(&mut extra, b"lyid", &id.to_be_bytes());
        }
        if let Some(kind) = self.divider {
            write_block(&mut extra, b"lsct", &kind.to_be_bytes());
        }
        for (key, body) in &self.extra_blocks {
            write_block(&mut extra, key, body);
        }

        out.extend_from_slice(&(extra.len() as u32).to_be_bytes());
        out.extend_from_slice(&extra);
        out
    }
}

fn write_length(out: &mut Vec<u8>, length: usize, psb: bool) {
    if psb {
        out.extend_from_slice(&(length as u64).to_be_bytes());
    } else {
        out.extend_from_slice(&(length as u32).to_be_bytes());
    }
}

/// `8BIM` tagged block padded to an even length
fn write_block(out: &mut Vec<u8>, key: &[u8; 4], body: &[u8]) {
    out.extend_from_slice(b"8BIM");
    out.extend_from_slice(key);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 != 0 {
        out.push(0);
    }
}

#[derive(Clone, Debug)]
pub struct PsdBuilder {
    pub version:                 u16,
    pub width:                   u32,
    pub height:                  u32,
    pub channels:                u16,
    pub depth:                   u16,
    pub color_mode:              u16,
    pub color_mode_data:         Vec<u8>,
    pub resources:               Vec<(u16, Vec<u8>)>,
    pub layers:                  Vec<LayerSpec>,
    pub merged_has_transparency: bool,
    pub composite:               Option<(Encoding, Vec<Vec<u8>>)>
}

impl PsdBuilder {
    pub fn new(width: u32, height: u32, channels: u16, depth: u16, color_mode: u16) -> PsdBuilder {
        PsdBuilder {
            version: 1,
            width,
            height,
            channels,
            depth,
            color_mode,
            color_mode_data: vec![],
            resources: vec![],
            layers: vec![],
            merged_has_transparency: false,
            composite: None
        }
    }

    /// 8 bit RGB with three channels
    pub fn rgb(width: u32, height: u32) -> PsdBuilder {
        PsdBuilder::new(width, height, 3, 8, 3)
    }

    pub fn psb(mut self) -> PsdBuilder {
        self.version = 2;
        self
    }

    pub fn resource(mut self, id: u16, data: Vec<u8>) -> PsdBuilder {
        self.resources.push((id, data));
        self
    }

    pub fn layer(mut self, layer: LayerSpec) -> PsdBuilder {
        self.layers.push(layer);
        self
    }

    pub fn merged_transparency(mut self) -> PsdBuilder {
        self.merged_has_transparency = true;
        self
    }

    pub fn composite(mut self, encoding: Encoding, planes: Vec<Vec<u8>>) -> PsdBuilder {
        self.composite = Some((encoding, planes));
        self
    }

    fn is_psb(&self) -> bool {
        self.version == 2
    }

    pub fn build(&self) -> Vec<u8> {
        let psb = self.is_psb();
        let mut out = vec![];

        out.extend_from_slice(b"8BPS");
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&[0; 6]);
        out.extend_from_slice(&self.channels.to_be_bytes());
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&self.width.to_be_bytes());
        out.extend_from_slice(&self.depth.to_be_bytes());
        out.extend_from_slice(&self.color_mode.to_be_bytes());

        out.extend_from_slice(&(self.color_mode_data.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.color_mode_data);

        let mut resources = vec![];
        for (id, data) in &self.resources {
            resources.extend_from_slice(b"8BIM");
            resources.extend_from_slice(&id.to_be_bytes());
            // empty name, padded to two bytes
            resources.extend_from_slice(&[0, 0]);
            resources.extend_from_slice(&(data.len() as u32).to_be_bytes());
            resources.extend_from_slice(data);
            if data.len() % 2 != 0 {
                resources.push(0);
            }
        }
        out.extend_from_slice(&(resources.len() as u32).to_be_bytes());
        out.extend_from_slice(&resources);

        let section = self.layer_section();
        write_length(&mut out, section.len(), psb);
        out.extend_from_slice(&section);

        if let Some((encoding, planes)) = &self.composite {
            let (row_bytes, sample_bytes) = row_layout(self.depth, self.width as usize);
            out.extend_from_slice(&encode_planes(planes, row_bytes, sample_bytes, *encoding, psb));
        }
        out
    }

    fn layer_section(&self) -> Vec<u8> {
        let psb = self.is_psb();

        if self.layers.is_empty() && !self.merged_has_transparency {
            return vec![];
        }
        let count = self.layers.len() as i16;
        let count = if self.merged_has_transparency { -count } else { count };

        let encoded: Vec<Vec<Vec<u8>>> = self
            .layers
            .iter()
            .map(|l| l.encoded_channels(self.depth, psb))
            .collect();

        let mut info = count.to_be_bytes().to_vec();
        for (layer, channels) in self.layers.iter().zip(&encoded) {
            info.extend_from_slice(&layer.record(channels, psb));
        }
        for channel in encoded.iter().flatten() {
            info.extend_from_slice(channel);
        }
        if info.len() % 2 != 0 {
            info.push(0);
        }

        let mut section = vec![];
        write_length(&mut section, info.len(), psb);
        section.extend_from_slice(&info);
        // global layer mask
        section.extend_from_slice(&0_u32.to_be_bytes());
        section
    }
}

/// Values of a Photoshop action descriptor
#[derive(Clone, Debug)]
pub enum Item {
    Long(i32),
    Double(f64),
    Bool(bool),
    Text(String),
    Enum(String, String),
    Object(Vec<(String, Item)>),
    List(Vec<Item>)
}

fn write_key(out: &mut Vec<u8>, key: &str) {
    // four character keys are written with a zero length
    let length = if key.len() == 4 { 0 } else { key.len() as u32 };
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(key.as_bytes());
}

fn write_unicode(out: &mut Vec<u8>, text: &str) {
    let units: Vec<u16> = text.encode_utf16().collect();
    out.extend_from_slice(&(units.len() as u32).to_be_bytes());
    for unit in units {
        out.extend_from_slice(&unit.to_be_bytes());
    }
}

fn write_item(out: &mut Vec<u8>, item: &Item) {
    match item {
        Item::Long(value) => {
            out.extend_from_slice(b"long");
            out.extend_from_slice(&value.to_be_bytes());
        }
        Item::Double(value) => {
            out.extend_from_slice(b"doub");
            out.extend_from_slice(&value.to_be_bytes());
        }
        Item::Bool(value) => {
            out.extend_from_slice(b"bool");
            out.push(u8::from(*value));
        }
        Item::Text(text) => {
            out.extend_from_slice(b"TEXT");
            write_unicode(out, text);
        }
        Item::Enum(type_id, value) => {
            out.extend_from_slice(b"enum");
            write_key(out, type_id);
            write_key(out, value);
        }
        Item::Object(items) => {
            out.extend_from_slice(b"Objc");
            write_descriptor(out, items);
        }
        Item::List(values) => {
            out.extend_from_slice(b"VlLs");
            out.extend_from_slice(&(values.len() as u32).to_be_bytes());
            for value in values {
                write_item(out, value);
            }
        }
    }
}

fn write_descriptor(out: &mut Vec<u8>, items: &[(String, Item)]) {
    write_unicode(out, "");
    write_key(out, "null");
    out.extend_from_slice(&(items.len() as u32).to_be_bytes());
    for (key, value) in items {
        write_key(out, key);
        write_item(out, value);
    }
}

/// A descriptor preceded by its `u32` version, the form resources and
/// layer metadata store them in
pub fn versioned_descriptor(items: Vec<(&str, Item)>) -> Vec<u8> {
    let items: Vec<(String, Item)> = items.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    let mut out = 16_u32.to_be_bytes().to_vec();
    write_descriptor(&mut out, &items);
    out
}

/// Shorthand for nested descriptor items
pub fn object(items: Vec<(&str, Item)>) -> Item {
    Item::Object(items.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

/// `shmd` layer metadata holding one `cmls` entry
pub fn comp_metadata(settings: Vec<Item>) -> Vec<u8> {
    let cmls = versioned_descriptor(vec![("layerSettings", Item::List(settings))]);

    let mut out = 1_u32.to_be_bytes().to_vec();
    out.extend_from_slice(b"8BIM");
    out.extend_from_slice(b"cmls");
    out.extend_from_slice(&[0, 0, 0, 0]);
    out.extend_from_slice(&(cmls.len() as u32).to_be_bytes());
    out.extend_from_slice(&cmls);
    out
}
