/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::fmt::{Debug, Display, Formatter};

use zune_inflate::errors::InflateDecodeErrors;

use crate::bytestream::ByteIoError;

/// Errors that can occur while decoding or querying a PSD document
pub enum PsdDecodeErrors {
    /// The buffer ended before a declared or required length.
    ///
    /// # Arguments
    /// - 1st argument is the number of bytes requested
    /// - 2nd argument is the number of bytes that were left
    TruncatedData(usize, usize),
    /// A magic number or block marker did not match.
    UnexpectedSignature {
        expected: &'static [u8],
        found:    [u8; 4]
    },
    /// File version other than 1 (PSD) or 2 (PSB)
    UnsupportedVersion(u16),
    /// Colour mode code that is not one of the known modes
    UnsupportedColorMode(u16),
    /// Bit depth other than 1, 8, 16 or 32
    UnsupportedBitDepth(u16),
    /// Compression tag other than raw, RLE, ZIP or ZIP with prediction
    UnsupportedCompression(u16),
    /// Channel count outside the format range
    UnsupportedChannelCount(u16),
    /// Dimensions larger than the configured or format maximum
    ///
    /// # Arguments
    /// - 1st argument is the maximum allowed
    /// - 2nd argument is what the file declares
    LargeDimensions(usize, usize),
    ZeroDimensions,
    /// Decompression failed or an RLE stream lost synchronisation
    CorruptChannelData(String),
    /// Deflate stream failed to inflate
    InflateError(InflateDecodeErrors),
    /// Walking the layer and mask directory failed
    LayerDirectoryCorrupt {
        layer:  Option<usize>,
        source: Box<PsdDecodeErrors>
    },
    /// A seek or offset pointed outside the valid range
    ///
    /// # Arguments
    /// - 1st argument is the offending offset
    /// - 2nd argument is the length of the addressed range
    OutOfRange(usize, usize),
    /// The caller asked for something that does not exist, e.g. a layer
    /// index past the end
    InvalidArgument(String),
    Generic(&'static str)
}

impl PsdDecodeErrors {
    /// Whether this error stems from undecodable channel samples
    pub fn is_channel_corruption(&self) -> bool {
        match self {
            PsdDecodeErrors::CorruptChannelData(_) | PsdDecodeErrors::InflateError(_) => true,
            PsdDecodeErrors::LayerDirectoryCorrupt { source, .. } => source.is_channel_corruption(),
            _ => false
        }
    }

    /// Wrap an error raised while walking the layer directory.
    ///
    /// Errors that are already wrapped keep their original layer index.
    pub(crate) fn in_layer_directory(self, layer: Option<usize>) -> PsdDecodeErrors {
        match self {
            PsdDecodeErrors::LayerDirectoryCorrupt { .. } => self,
            other => PsdDecodeErrors::LayerDirectoryCorrupt {
                layer,
                source: Box::new(other)
            }
        }
    }
}

impl Debug for PsdDecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PsdDecodeErrors::TruncatedData(requested, remaining) => {
                writeln!(
                    f,
                    "Truncated data, requested {requested} bytes but only {remaining} remain"
                )
            }
            PsdDecodeErrors::UnexpectedSignature { expected, found } => {
                writeln!(
                    f,
                    "Expected signature {:?} but found {:?}",
                    String::from_utf8_lossy(expected),
                    String::from_utf8_lossy(found)
                )
            }
            PsdDecodeErrors::UnsupportedVersion(version) => {
                writeln!(
                    f,
                    "Unsupported file version {version}, known versions are 1 (PSD) and 2 (PSB)"
                )
            }
            PsdDecodeErrors::UnsupportedColorMode(mode) => {
                writeln!(f, "Unsupported color mode {mode}")
            }
            PsdDecodeErrors::UnsupportedBitDepth(depth) => {
                writeln!(
                    f,
                    "Unsupported bit depth {depth}, supported depths are 1, 8, 16 and 32"
                )
            }
            PsdDecodeErrors::UnsupportedCompression(method) => {
                writeln!(f, "Unknown compression method {method}")
            }
            PsdDecodeErrors::UnsupportedChannelCount(channels) => {
                writeln!(f, "Unsupported channel count {channels}, expected 1..=56")
            }
            PsdDecodeErrors::LargeDimensions(supported, found) => {
                writeln!(
                    f,
                    "Too large dimensions, supported {supported} but found {found}"
                )
            }
            PsdDecodeErrors::ZeroDimensions => {
                writeln!(f, "Zero found where not expected")
            }
            PsdDecodeErrors::CorruptChannelData(reason) => {
                writeln!(f, "Corrupt channel data: {reason}")
            }
            PsdDecodeErrors::InflateError(e) => {
                writeln!(f, "Corrupt channel data, inflate failed: {e:?}")
            }
            PsdDecodeErrors::LayerDirectoryCorrupt { layer, source } => match layer {
                Some(index) => writeln!(f, "Layer directory corrupt at layer {index}: {source:?}"),
                None => writeln!(f, "Layer directory corrupt: {source:?}")
            },
            PsdDecodeErrors::OutOfRange(offset, len) => {
                writeln!(f, "Offset {offset} is outside the valid range 0..={len}")
            }
            PsdDecodeErrors::InvalidArgument(reason) => {
                writeln!(f, "Invalid argument: {reason}")
            }
            PsdDecodeErrors::Generic(reason) => {
                writeln!(f, "{reason}")
            }
        }
    }
}

impl Display for PsdDecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:?}", self)
    }
}

impl std::error::Error for PsdDecodeErrors {}

impl From<&'static str> for PsdDecodeErrors {
    fn from(r: &'static str) -> Self {
        Self::Generic(r)
    }
}

impl From<ByteIoError> for PsdDecodeErrors {
    fn from(r: ByteIoError) -> Self {
        match r {
            ByteIoError::NotEnoughBytes(requested, remaining) => {
                Self::TruncatedData(requested, remaining)
            }
            ByteIoError::SeekOutOfRange(target, len) => Self::OutOfRange(target, len)
        }
    }
}

impl From<InflateDecodeErrors> for PsdDecodeErrors {
    fn from(r: InflateDecodeErrors) -> Self {
        Self::InflateError(r)
    }
}
