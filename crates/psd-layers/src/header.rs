/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use log::{trace, warn};
use zune_core::options::DecoderOptions;

use crate::bytestream::ByteCursor;
use crate::chunk::read_signature;
use crate::constants::{ColorMode, PsdDepth, PsdVersion, MAX_CHANNELS, PSD_SIGNATURE};
use crate::errors::PsdDecodeErrors;

/// The fixed 26 byte file header
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PsdHeader {
    pub version:    PsdVersion,
    /// Channels in the merged image, including alpha and spot channels
    pub channels:   u16,
    pub height:     usize,
    pub width:      usize,
    pub depth:      PsdDepth,
    pub color_mode: ColorMode
}

impl PsdHeader {
    pub const SIZE: usize = 26;

    /// Parse and validate the header
    ///
    /// Dimensions are checked against both the format maximum and the
    /// limits in `options`.
    pub fn parse(stream: &mut ByteCursor, options: &DecoderOptions) -> Result<PsdHeader, PsdDecodeErrors> {
        // Check identifier
        read_signature(stream, &[PSD_SIGNATURE])?;

        //  file version
        let version_int = stream.read_u16()?;
        let version =
            PsdVersion::from_int(version_int).ok_or(PsdDecodeErrors::UnsupportedVersion(version_int))?;

        // 6 reserved bytes, must be zero
        let reserved = stream.read_fixed_bytes::<6>()?;

        if reserved != [0; 6] {
            if options.get_strict_mode() {
                return Err(PsdDecodeErrors::Generic("Reserved header bytes are not zero"));
            }
            warn!("Reserved header bytes are not zero: {:?}", reserved);
        }

        let channels = stream.read_u16()?;

        if channels == 0 || channels > MAX_CHANNELS {
            return Err(PsdDecodeErrors::UnsupportedChannelCount(channels));
        }

        let height = stream.read_u32()? as usize;
        let width = stream.read_u32()? as usize;

        if width == 0 || height == 0 {
            return Err(PsdDecodeErrors::ZeroDimensions);
        }

        let max_width = version.max_dimension().min(options.get_max_width());
        let max_height = version.max_dimension().min(options.get_max_height());

        if width > max_width {
            return Err(PsdDecodeErrors::LargeDimensions(max_width, width));
        }
        if height > max_height {
            return Err(PsdDecodeErrors::LargeDimensions(max_height, height));
        }

        let depth_int = stream.read_u16()?;
        let depth = PsdDepth::from_int(depth_int).ok_or(PsdDecodeErrors::UnsupportedBitDepth(depth_int))?;

        let mode_int = stream.read_u16()?;
        let color_mode =
            ColorMode::from_int(mode_int).ok_or(PsdDecodeErrors::UnsupportedColorMode(mode_int))?;

        if depth == PsdDepth::One && color_mode != ColorMode::Bitmap {
            return Err(PsdDecodeErrors::UnsupportedBitDepth(depth_int));
        }

        trace!("Version: {:?}", version);
        trace!("Image width: {}", width);
        trace!("Image height: {}", height);
        trace!("Channels: {}", channels);
        trace!("Bit depth: {:?}", depth);
        trace!("Color mode: {:?}", color_mode);

        Ok(PsdHeader {
            version,
            channels,
            height,
            width,
            depth,
            color_mode
        })
    }

    pub const fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}
