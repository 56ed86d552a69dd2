/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A Photoshop PSD and PSB reader
//!
//! This crate decodes the structure of `.psd` and `.psb` files, the header,
//! image resources, the layer directory with per layer channel data and the
//! merged image, and turns any layer, layer mask or the merged image into
//! BGRA pixels.
//!
//! It does not render adjustment layers, effects, text or smart objects and
//! does not blend layers into a new composite, the merged image stored in
//! the file is what [`Document::composite_pixels`] returns.
//!
//! All colour modes are read, Bitmap, Grayscale, Indexed, RGB, CMYK,
//! Multichannel, Duotone and Lab at 1, 8, 16 and 32 bits per channel.
//!
//! # Example
//! - Reading a psd file
//! ```no_run
//! use psd_layers::errors::PsdDecodeErrors;
//!
//! fn main() -> Result<(), PsdDecodeErrors> {
//!     let data = std::fs::read("image.psd").unwrap();
//!     let document = psd_layers::load(&data)?;
//!
//!     for index in document.children(None)? {
//!         let pixels = document.layer_pixels(index, true)?;
//!         println!("{} is {:?}", document.layer_name(index)?, pixels.dimensions());
//!     }
//!     if document.has_composite() {
//!         let _merged = document.composite_pixels()?;
//!     }
//!     Ok(())
//! }
//! ```
#![forbid(unsafe_code)]
pub extern crate zune_core;

pub use compose::lab_to_rgb;
pub use constants::{BlendMode, ColorMode, Compression, LayerType, PsdDepth, PsdVersion};
pub use decoder::PsdDecoder;
pub use document::{Document, LayerInfo};
pub use errors::PsdDecodeErrors;
pub use pixels::{PixelBuffer, PixelSamples};

pub mod bytestream;
pub mod channel;
pub mod chunk;
mod compose;
pub mod constants;
pub mod decoder;
pub mod descriptor;
pub mod document;
pub mod errors;
pub mod header;
pub mod image_data;
pub mod layers;
pub mod pixels;
pub mod resources;

/// Decode a whole PSD or PSB file held in memory
///
/// Dimension limits follow the file version, 30 000 pixels for PSD files
/// and 300 000 for PSB files.
pub fn load(bytes: &[u8]) -> Result<Document, PsdDecodeErrors> {
    PsdDecoder::new(bytes).decode()
}
