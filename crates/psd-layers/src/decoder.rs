/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use log::trace;
use zune_core::bit_depth::BitDepth;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;

use crate::bytestream::ByteCursor;
use crate::chunk::{read_block, LengthWidth, Padding};
use crate::compose::output_depth;
use crate::constants::{ColorMode, PSB_MAX_DIMENSION};
use crate::document::Document;
use crate::errors::PsdDecodeErrors;
use crate::header::PsdHeader;
use crate::image_data::parse_image_data;
use crate::layers::parse_layer_section;
use crate::resources::parse_resources;

/// A Photoshop PSD/PSB reader.
///
/// The decoder borrows the input for the duration of decoding, the
/// returned [`Document`] owns everything it needs.
pub struct PsdDecoder<'a> {
    stream:  ByteCursor<'a>,
    options: DecoderOptions,
    header:  Option<PsdHeader>
}

impl<'a> PsdDecoder<'a> {
    /// Create a new decoder with dimension limits equal to the PSB maximum
    ///
    /// # Arguments
    /// - data: The whole file
    pub fn new(data: &'a [u8]) -> PsdDecoder<'a> {
        let options = DecoderOptions::default()
            .set_max_width(PSB_MAX_DIMENSION)
            .set_max_height(PSB_MAX_DIMENSION)
            .set_strict_mode(false);

        Self::new_with_options(data, options)
    }

    /// Creates a new decoder with options that influence decoding routines
    ///
    /// # Arguments
    /// - data: The whole file
    /// - options: Custom options for the decoder
    pub fn new_with_options(data: &'a [u8], options: DecoderOptions) -> PsdDecoder<'a> {
        PsdDecoder {
            stream: ByteCursor::new(data),
            options,
            header: None
        }
    }

    /// Decode the fixed header
    ///
    /// This confirms the file is a PSD or PSB file and extracts width,
    /// height, depth and colour mode.
    pub fn decode_headers(&mut self) -> Result<(), PsdDecodeErrors> {
        if self.header.is_some() {
            return Ok(());
        }
        self.header = Some(PsdHeader::parse(&mut self.stream, &self.options)?);
        Ok(())
    }

    /// The header, or `None` if it hasn't been decoded
    pub fn header(&self) -> Option<&PsdHeader> {
        self.header.as_ref()
    }

    /// Get image width and height respectively or None if the
    /// headers haven't been decoded
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.header.map(|h| (h.width, h.height))
    }

    /// Sample width of decoded pixel buffers, or None if the headers haven't
    /// been decoded
    pub fn bit_depth(&self) -> Option<BitDepth> {
        self.header.map(|h| output_depth(h.depth))
    }

    /// Colorspace of decoded pixel buffers, or None if the headers haven't
    /// been decoded
    pub fn colorspace(&self) -> Option<ColorSpace> {
        self.header.map(|_| ColorSpace::BGRA)
    }

    /// Decode the whole file.
    ///
    /// Either every section decodes or an error is returned, no partially
    /// filled document is ever handed out.
    pub fn decode(&mut self) -> Result<Document, PsdDecodeErrors> {
        self.decode_headers()?;

        let header = self.header.ok_or(PsdDecodeErrors::Generic("Header not decoded"))?;
        let stream = &mut self.stream;

        let mut color_mode_data = read_block(stream, LengthWidth::Four, Padding::None)?;
        trace!("Color mode data: {} bytes", color_mode_data.len());

        if header.color_mode == ColorMode::Indexed && color_mode_data.len() < 768 {
            return Err(PsdDecodeErrors::Generic("Indexed image without a full colour table"));
        }
        let color_mode_data = color_mode_data.read_remaining().to_vec();

        let resource_section = read_block(stream, LengthWidth::Four, Padding::None)?;
        trace!("Image resources: {} bytes", resource_section.len());
        let resources = parse_resources(resource_section)?;

        let layer_section = read_block(stream, LengthWidth::for_version(header.version), Padding::None)
            .map_err(|e| e.in_layer_directory(None))?;
        trace!("Layer and mask info: {} bytes", layer_section.len());
        let layers = parse_layer_section(layer_section, &header)?;

        let merged = parse_image_data(stream, &header)?;

        Ok(Document {
            header,
            color_mode_data,
            resources,
            layers,
            merged
        })
    }
}
