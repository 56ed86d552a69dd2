/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Length prefixed block reading.
//!
//! Almost everything after the header is a `length + payload` block,
//! sometimes with a signature in front. The helpers here hand out a cursor
//! over exactly the declared payload and move the outer cursor past the whole
//! (padded) block, so a sub parser that stops early or reads a block it does
//! not understand can never shift the outer stream.
use log::warn;

use crate::bytestream::ByteCursor;
use crate::constants::PsdVersion;
use crate::errors::PsdDecodeErrors;

/// Width of a length field
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LengthWidth {
    Four,
    Eight
}

impl LengthWidth {
    /// Sections that grow to 8 byte lengths in PSB files
    pub const fn for_version(version: PsdVersion) -> LengthWidth {
        match version {
            PsdVersion::Psd => Self::Four,
            PsdVersion::Psb => Self::Eight
        }
    }
}

/// Alignment a block length is rounded up to
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Padding {
    None,
    Even,
    Quad
}

impl Padding {
    pub const fn pad(self, length: usize) -> usize {
        match self {
            Padding::None => length,
            Padding::Even => length + (length & 1),
            Padding::Quad => (length + 3) & !3
        }
    }
}

/// Outcome of reading an optional block.
///
/// Known blocks are decoded, unknown ones are kept verbatim so nothing in
/// the file is lost.
#[derive(Debug, Clone, PartialEq)]
pub enum Tagged<T> {
    Parsed(T),
    Skipped { signature: [u8; 4], data: Vec<u8> }
}

impl<T> Tagged<T> {
    pub fn parsed(&self) -> Option<&T> {
        match self {
            Tagged::Parsed(value) => Some(value),
            Tagged::Skipped { .. } => None
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Tagged::Skipped { .. })
    }
}

/// A signature tagged block such as additional layer info
pub struct TaggedBlock<'a> {
    pub signature: [u8; 4],
    pub key:       [u8; 4],
    pub body:      ByteCursor<'a>
}

/// Read a four byte signature and confirm it is one of `expected`
pub fn read_signature(
    stream: &mut ByteCursor, expected: &[&'static [u8; 4]]
) -> Result<[u8; 4], PsdDecodeErrors> {
    let found = stream.read_fixed_bytes::<4>()?;

    if expected.iter().any(|sig| **sig == found) {
        return Ok(found);
    }
    Err(PsdDecodeErrors::UnexpectedSignature {
        expected: expected.first().map(|x| -> &'static [u8] { *x }).unwrap_or(b""),
        found
    })
}

pub fn read_length(stream: &mut ByteCursor, width: LengthWidth) -> Result<usize, PsdDecodeErrors> {
    let length = match width {
        LengthWidth::Four => u64::from(stream.read_u32()?),
        LengthWidth::Eight => stream.read_u64()?
    };
    usize::try_from(length).map_err(|_| PsdDecodeErrors::TruncatedData(usize::MAX, stream.remaining()))
}

/// Read a length field and return a cursor over exactly that payload.
///
/// The outer cursor is moved past the payload and its padding before the
/// payload is looked at.
pub fn read_block<'a>(
    stream: &mut ByteCursor<'a>, width: LengthWidth, padding: Padding
) -> Result<ByteCursor<'a>, PsdDecodeErrors> {
    let length = read_length(stream, width)?;
    take_padded(stream, length, padding)
}

/// Split off `length` bytes followed by padding up to the alignment.
pub fn take_padded<'a>(
    stream: &mut ByteCursor<'a>, length: usize, padding: Padding
) -> Result<ByteCursor<'a>, PsdDecodeErrors> {
    let body = stream.take(length)?;
    stream.skip(padding.pad(length) - length)?;
    Ok(body)
}

/// Read `signature + key + length + payload`.
///
/// `long_keys` lists keys whose length is 8 bytes wide when `width` is
/// [`LengthWidth::Eight`], every other key keeps a 4 byte length.
pub fn read_tagged_block<'a>(
    stream: &mut ByteCursor<'a>, signatures: &[&'static [u8; 4]], width: LengthWidth,
    long_keys: &[&[u8; 4]], padding: Padding
) -> Result<TaggedBlock<'a>, PsdDecodeErrors> {
    let signature = read_signature(stream, signatures)?;
    let key = stream.read_fixed_bytes::<4>()?;

    let key_width = if width == LengthWidth::Eight && long_keys.iter().any(|k| **k == key) {
        LengthWidth::Eight
    } else {
        LengthWidth::Four
    };
    let body = read_block(stream, key_width, padding)?;

    Ok(TaggedBlock {
        signature,
        key,
        body
    })
}

/// Keep an unknown block's bytes
pub fn skip_block<T>(block: TaggedBlock) -> Tagged<T> {
    let mut body = block.body;
    warn!(
        "Skipping unknown block {:?}, {} bytes",
        String::from_utf8_lossy(&block.key),
        body.len()
    );
    Tagged::Skipped {
        signature: block.key,
        data:      body.read_remaining().to_vec()
    }
}

/// Read a Pascal string whose total size, including the length byte, is
/// padded to a multiple of `padding`.
pub fn read_pascal_string(stream: &mut ByteCursor, padding: Padding) -> Result<String, PsdDecodeErrors> {
    let length = usize::from(stream.read_u8()?);
    let bytes = stream.read_bytes(length)?;
    stream.skip(padding.pad(length + 1) - (length + 1))?;
    Ok(decode_legacy_string(bytes))
}

/// Legacy strings are in the system code page, bytes that are not valid
/// UTF-8 map to the Latin-1 character with the same value.
pub fn decode_legacy_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|b| char::from(*b)).collect()
    }
}

/// Read a `u32` character count followed by UTF-16BE code units.
///
/// A trailing NUL is dropped.
pub fn read_unicode_string(stream: &mut ByteCursor) -> Result<String, PsdDecodeErrors> {
    let count = stream.read_u32()? as usize;
    let bytes = stream.read_bytes(count.checked_mul(2).ok_or(PsdDecodeErrors::TruncatedData(
        usize::MAX,
        stream.remaining()
    ))?)?;

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();

    let mut string = String::from_utf16_lossy(&units);
    while string.ends_with('\0') {
        string.pop();
    }
    Ok(string)
}
