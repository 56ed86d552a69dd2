/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The merged image at the end of the file.
//!
//! One compression tag covers every channel. Channels are stored planar,
//! for RLE the row byte counts of all channels come before any data.
use log::trace;

use crate::bytestream::ByteCursor;
use crate::channel::{decode_planes, read_compression, ChannelGeometry, ChannelSamples};
use crate::constants::Compression;
use crate::errors::PsdDecodeErrors;
use crate::header::PsdHeader;

#[derive(Debug, Clone, PartialEq)]
pub struct MergedImage {
    pub compression: Compression,
    /// One plane per header channel, colour planes first
    pub planes:      Vec<ChannelSamples>
}

/// Decode the merged image, `None` when the file ends before it
pub fn parse_image_data(stream: &mut ByteCursor, header: &PsdHeader) -> Result<Option<MergedImage>, PsdDecodeErrors> {
    if stream.is_eof() {
        return Ok(None);
    }
    let compression = read_compression(stream)?;
    trace!("Merged image compression: {:?}", compression);

    let geometry = ChannelGeometry {
        width:   header.width,
        height:  header.height,
        depth:   header.depth,
        version: header.version
    };
    let planes = decode_planes(stream, compression, geometry, usize::from(header.channels))?;

    if !stream.is_eof() {
        trace!("{} trailing bytes after the merged image", stream.remaining());
    }
    Ok(Some(MergedImage { compression, planes }))
}
