/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Channel decompression.
//!
//! A channel is a plane of `width * height` samples stored either raw,
//! PackBits compressed per scanline, deflated, or deflated after a
//! horizontal delta filter. The routines here turn those bytes back into
//! dense sample arrays at the file's bit depth.
use zune_inflate::{DeflateDecoder, DeflateOptions};

use crate::bytestream::ByteCursor;
use crate::constants::{Compression, PsdDepth, PsdVersion};
use crate::errors::PsdDecodeErrors;

/// Decoded samples of a single channel, one entry per pixel in row major
/// order
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSamples {
    /// One bit samples unpacked to one byte each, `1` means the bit was set
    Bits(Vec<u8>),
    Eight(Vec<u8>),
    Sixteen(Vec<u16>),
    ThirtyTwo(Vec<f32>)
}

impl ChannelSamples {
    pub fn empty(depth: PsdDepth) -> ChannelSamples {
        match depth {
            PsdDepth::One => Self::Bits(vec![]),
            PsdDepth::Eight => Self::Eight(vec![]),
            PsdDepth::Sixteen => Self::Sixteen(vec![]),
            PsdDepth::ThirtyTwo => Self::ThirtyTwo(vec![])
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Bits(v) | Self::Eight(v) => v.len(),
            Self::Sixteen(v) => v.len(),
            Self::ThirtyTwo(v) => v.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn depth(&self) -> PsdDepth {
        match self {
            Self::Bits(_) => PsdDepth::One,
            Self::Eight(_) => PsdDepth::Eight,
            Self::Sixteen(_) => PsdDepth::Sixteen,
            Self::ThirtyTwo(_) => PsdDepth::ThirtyTwo
        }
    }

    /// Like [`unit`](Self::unit) but float samples keep values outside
    /// `[0, 1]`
    #[inline]
    pub fn value(&self, index: usize) -> f32 {
        match self {
            Self::ThirtyTwo(v) => v[index],
            _ => self.unit(index)
        }
    }

    /// Sample `index` as a fraction of full scale
    ///
    /// Float samples are clamped to `[0, 1]`.
    #[inline]
    pub fn unit(&self, index: usize) -> f32 {
        match self {
            Self::Bits(v) => f32::from(v[index]),
            Self::Eight(v) => f32::from(v[index]) / 255.0,
            Self::Sixteen(v) => f32::from(v[index]) / 65535.0,
            Self::ThirtyTwo(v) => v[index].clamp(0.0, 1.0)
        }
    }
}

/// Size and depth of the plane being decoded
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ChannelGeometry {
    pub width:   usize,
    pub height:  usize,
    pub depth:   PsdDepth,
    pub version: PsdVersion
}

impl ChannelGeometry {
    pub const fn row_bytes(&self) -> usize {
        self.depth.row_bytes(self.width)
    }

    /// Bytes of one fully decompressed plane
    pub const fn plane_bytes(&self) -> usize {
        self.row_bytes() * self.height
    }

    pub const fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// A two byte PackBits run produces at most 128 bytes
const MAX_RLE_EXPANSION: usize = 64;
/// Upper bound of the deflate compression ratio
const MAX_DEFLATE_EXPANSION: usize = 1032;

fn corrupt(reason: String) -> PsdDecodeErrors {
    PsdDecodeErrors::CorruptChannelData(reason)
}

pub fn read_compression(stream: &mut ByteCursor) -> Result<Compression, PsdDecodeErrors> {
    let method = stream.read_u16()?;
    Compression::from_int(method).ok_or(PsdDecodeErrors::UnsupportedCompression(method))
}

/// Decode one layer channel.
///
/// `data` is exactly the channel's declared byte range, starting with the
/// two byte compression tag. Every byte of it must be accounted for.
pub fn decode_layer_channel(
    data: &[u8], geometry: ChannelGeometry
) -> Result<ChannelSamples, PsdDecodeErrors> {
    if data.is_empty() && geometry.pixel_count() == 0 {
        // some writers drop the compression tag of empty channels
        return Ok(ChannelSamples::empty(geometry.depth));
    }
    let mut stream = ByteCursor::new(data);
    let compression = read_compression(&mut stream)?;

    if geometry.pixel_count() == 0 {
        // empty layers carry a compression tag and no rows
        if !stream.is_eof() {
            return Err(corrupt(format!(
                "{} bytes after the compression tag of an empty channel",
                stream.remaining()
            )));
        }
        return Ok(ChannelSamples::empty(geometry.depth));
    }

    let planes = decode_planes(&mut stream, compression, geometry, 1)?;

    if !stream.is_eof() {
        return Err(corrupt(format!(
            "{} bytes left over after decoding {:?} channel",
            stream.remaining(),
            compression
        )));
    }
    Ok(planes.into_iter().next().unwrap_or(ChannelSamples::empty(geometry.depth)))
}

/// Decode `count` consecutive planes sharing one compression tag.
///
/// This is how the merged image is stored, a layer channel is the
/// single plane case. For RLE all row byte counts of all planes come first.
pub fn decode_planes(
    stream: &mut ByteCursor, compression: Compression, geometry: ChannelGeometry, count: usize
) -> Result<Vec<ChannelSamples>, PsdDecodeErrors> {
    let plane_bytes = geometry.plane_bytes();
    let mut planes = Vec::with_capacity(count);

    match compression {
        Compression::Raw => {
            for _ in 0..count {
                let bytes = stream.read_bytes(plane_bytes)?;
                planes.push(samples_from_bytes(bytes, geometry));
            }
        }
        Compression::Rle => {
            let counts = read_rle_counts(stream, geometry.height * count, geometry.version)?;
            let total: usize = counts.iter().fold(0_usize, |a, b| a.saturating_add(*b));

            if !stream.has(total) {
                return Err(PsdDecodeErrors::TruncatedData(total, stream.remaining()));
            }
            if plane_bytes.saturating_mul(count) > total.saturating_mul(MAX_RLE_EXPANSION) {
                return Err(corrupt(format!(
                    "{total} bytes of RLE data cannot expand to {} bytes",
                    plane_bytes.saturating_mul(count)
                )));
            }
            let mut scratch = vec![0_u8; plane_bytes];

            for plane_counts in counts.chunks(geometry.height.max(1)) {
                unpack_rows(stream, plane_counts, geometry.row_bytes(), &mut scratch)?;
                planes.push(samples_from_bytes(&scratch, geometry));
            }
        }
        Compression::Zip | Compression::ZipPrediction => {
            let compressed = stream.read_remaining();
            let expected = plane_bytes * count;
            let mut bytes = inflate(compressed, expected)?;

            for plane in bytes.chunks_exact_mut(plane_bytes.max(1)).take(count) {
                if compression == Compression::ZipPrediction {
                    undo_prediction(plane, geometry)?;
                }
                planes.push(samples_from_bytes(plane, geometry));
            }
        }
    }
    Ok(planes)
}

/// Row byte counts that precede RLE data, two bytes each in PSD files and
/// four in PSB files
pub fn read_rle_counts(
    stream: &mut ByteCursor, rows: usize, version: PsdVersion
) -> Result<Vec<usize>, PsdDecodeErrors> {
    let entry_size = if version.is_large() { 4 } else { 2 };

    if !stream.has(rows.saturating_mul(entry_size)) {
        return Err(PsdDecodeErrors::TruncatedData(
            rows.saturating_mul(entry_size),
            stream.remaining()
        ));
    }
    let mut counts = Vec::with_capacity(rows);
    for _ in 0..rows {
        let count = match version {
            PsdVersion::Psd => usize::from(stream.read_u16()?),
            PsdVersion::Psb => stream.read_u32()? as usize
        };
        counts.push(count);
    }
    Ok(counts)
}

/// Unpack consecutive PackBits rows into `out`, one `row_bytes` slice per
/// count
pub fn unpack_rows(
    stream: &mut ByteCursor, counts: &[usize], row_bytes: usize, out: &mut [u8]
) -> Result<(), PsdDecodeErrors> {
    if counts.len() * row_bytes != out.len() {
        return Err(corrupt(format!(
            "{} rows of {} bytes do not fill a {} byte plane",
            counts.len(),
            row_bytes,
            out.len()
        )));
    }
    for (row, (count, output)) in counts.iter().zip(out.chunks_exact_mut(row_bytes.max(1))).enumerate() {
        let input = stream.read_bytes(*count)?;
        unpack_bits(input, output).map_err(|e| match e {
            PsdDecodeErrors::CorruptChannelData(reason) => corrupt(format!("row {row}: {reason}")),
            other => other
        })?;
    }
    Ok(())
}

/// Decode one PackBits scanline.
///
/// The whole of `input` must be consumed and the whole of `output` filled,
/// anything else means the row lengths and data disagree.
pub fn unpack_bits(input: &[u8], output: &mut [u8]) -> Result<(), PsdDecodeErrors> {
    let mut in_pos = 0;
    let mut out_pos = 0;

    while in_pos < input.len() {
        let control = input[in_pos] as i8;
        in_pos += 1;

        match control {
            0..=127 => {
                // copy the next n + 1 bytes literally
                let length = control as usize + 1;

                if in_pos + length > input.len() {
                    return Err(corrupt(format!(
                        "literal run of {length} bytes with {} input bytes left",
                        input.len() - in_pos
                    )));
                }
                if out_pos + length > output.len() {
                    return Err(corrupt(format!(
                        "literal run of {length} bytes overruns the row by {}",
                        out_pos + length - output.len()
                    )));
                }
                output[out_pos..out_pos + length].copy_from_slice(&input[in_pos..in_pos + length]);
                in_pos += length;
                out_pos += length;
            }
            -128 => (),
            _ => {
                // replicate the next byte 1 - n times
                let length = (1 - i16::from(control)) as usize;

                let Some(&value) = input.get(in_pos) else {
                    return Err(corrupt("repeat run without a value byte".to_string()));
                };
                in_pos += 1;

                if out_pos + length > output.len() {
                    return Err(corrupt(format!(
                        "repeat run of {length} bytes overruns the row by {}",
                        out_pos + length - output.len()
                    )));
                }
                output[out_pos..out_pos + length].fill(value);
                out_pos += length;
            }
        }
    }
    if out_pos != output.len() {
        return Err(corrupt(format!(
            "row ended after {out_pos} of {} bytes",
            output.len()
        )));
    }
    Ok(())
}

/// Inflate a zlib stream that must produce exactly `expected` bytes
pub fn inflate(data: &[u8], expected: usize) -> Result<Vec<u8>, PsdDecodeErrors> {
    if expected > data.len().saturating_mul(MAX_DEFLATE_EXPANSION).saturating_add(1024) {
        return Err(corrupt(format!(
            "{} bytes of deflate data cannot expand to {expected} bytes",
            data.len()
        )));
    }
    let options = DeflateOptions::default()
        .set_size_hint(expected)
        .set_limit(expected.max(1));

    let mut decoder = DeflateDecoder::new_with_options(data, options);
    let bytes = decoder.decode_zlib()?;

    if bytes.len() != expected {
        return Err(corrupt(format!(
            "inflated {} bytes, expected {expected}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Reverse the horizontal delta filter applied before deflate.
///
/// 8 and 16 bit samples are running sums per row. 32 bit rows are stored as
/// four byte planes (all most significant bytes first) with a running sum
/// over the bytes of the whole row, they are summed and then re-interleaved
/// into big endian samples.
pub fn undo_prediction(plane: &mut [u8], geometry: ChannelGeometry) -> Result<(), PsdDecodeErrors> {
    let width = geometry.width;
    let row_bytes = geometry.row_bytes();

    if width == 0 || geometry.height == 0 {
        return Ok(());
    }
    match geometry.depth {
        PsdDepth::One => return Err(PsdDecodeErrors::UnsupportedCompression(3)),
        PsdDepth::Eight => {
            for row in plane.chunks_exact_mut(row_bytes) {
                for i in 1..row.len() {
                    row[i] = row[i].wrapping_add(row[i - 1]);
                }
            }
        }
        PsdDepth::Sixteen => {
            for row in plane.chunks_exact_mut(row_bytes) {
                let mut previous = u16::from_be_bytes([row[0], row[1]]);

                for sample in row.chunks_exact_mut(2).skip(1) {
                    let value = u16::from_be_bytes([sample[0], sample[1]]).wrapping_add(previous);
                    sample.copy_from_slice(&value.to_be_bytes());
                    previous = value;
                }
            }
        }
        PsdDepth::ThirtyTwo => {
            let mut scratch = vec![0_u8; row_bytes];

            for row in plane.chunks_exact_mut(row_bytes) {
                for i in 1..row.len() {
                    row[i] = row[i].wrapping_add(row[i - 1]);
                }
                for x in 0..width {
                    for byte in 0..4 {
                        scratch[x * 4 + byte] = row[byte * width + x];
                    }
                }
                row.copy_from_slice(&scratch);
            }
        }
    }
    Ok(())
}

/// Interpret a fully decompressed plane at the geometry's bit depth
pub fn samples_from_bytes(bytes: &[u8], geometry: ChannelGeometry) -> ChannelSamples {
    match geometry.depth {
        PsdDepth::One => {
            let mut out = Vec::with_capacity(geometry.pixel_count());
            for row in bytes.chunks_exact(geometry.row_bytes().max(1)).take(geometry.height) {
                out.extend((0..geometry.width).map(|x| (row[x >> 3] >> (7 - (x & 7))) & 1));
            }
            ChannelSamples::Bits(out)
        }
        PsdDepth::Eight => ChannelSamples::Eight(bytes.to_vec()),
        PsdDepth::Sixteen => ChannelSamples::Sixteen(
            bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect()
        ),
        PsdDepth::ThirtyTwo => ChannelSamples::ThirtyTwo(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        )
    }
}
