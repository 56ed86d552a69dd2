/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use zune_core::bit_depth::BitDepth;
use zune_core::colorspace::ColorSpace;

/// Interleaved samples, the width the source depth widens to
#[derive(Debug, Clone, PartialEq)]
pub enum PixelSamples {
    /// 1 and 8 bit sources
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>)
}

impl PixelSamples {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::F32(v) => v.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn with_capacity(depth: BitDepth, capacity: usize) -> PixelSamples {
        match depth {
            BitDepth::Sixteen => Self::U16(Vec::with_capacity(capacity)),
            BitDepth::Float32 => Self::F32(Vec::with_capacity(capacity)),
            _ => Self::U8(Vec::with_capacity(capacity))
        }
    }

    /// Append a sample given as a fraction of full scale.
    ///
    /// Integer outputs are clamped and rounded, floats are stored as is.
    #[inline]
    pub(crate) fn push_unit(&mut self, value: f32) {
        match self {
            Self::U8(v) => v.push((value.clamp(0.0, 1.0) * 255.0).round() as u8),
            Self::U16(v) => v.push((value.clamp(0.0, 1.0) * 65535.0).round() as u16),
            Self::F32(v) => v.push(value)
        }
    }

    /// Sample `index` as a fraction of full scale
    pub fn unit(&self, index: usize) -> f32 {
        match self {
            Self::U8(v) => f32::from(v[index]) / 255.0,
            Self::U16(v) => f32::from(v[index]) / 65535.0,
            Self::F32(v) => v[index]
        }
    }
}

/// A decoded image in B, G, R, A order, row major.
///
/// Owns its samples, nothing in it points back at the file buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width:   usize,
    height:  usize,
    samples: PixelSamples
}

impl PixelBuffer {
    pub const COMPONENTS: usize = 4;

    pub(crate) fn new(width: usize, height: usize, samples: PixelSamples) -> PixelBuffer {
        debug_assert_eq!(samples.len(), width * height * Self::COMPONENTS);
        PixelBuffer {
            width,
            height,
            samples
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn bit_depth(&self) -> BitDepth {
        match self.samples {
            PixelSamples::U8(_) => BitDepth::Eight,
            PixelSamples::U16(_) => BitDepth::Sixteen,
            PixelSamples::F32(_) => BitDepth::Float32
        }
    }

    /// Always [`ColorSpace::BGRA`]
    pub fn colorspace(&self) -> ColorSpace {
        ColorSpace::BGRA
    }

    pub fn samples(&self) -> &PixelSamples {
        &self.samples
    }

    pub fn into_samples(self) -> PixelSamples {
        self.samples
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.samples {
            PixelSamples::U8(v) => Some(v),
            _ => None
        }
    }

    pub fn as_u16(&self) -> Option<&[u16]> {
        match &self.samples {
            PixelSamples::U16(v) => Some(v),
            _ => None
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.samples {
            PixelSamples::F32(v) => Some(v),
            _ => None
        }
    }

    /// B, G, R, A of one pixel as fractions of full scale
    pub fn pixel(&self, x: usize, y: usize) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let base = (y * self.width + x) * Self::COMPONENTS;
        Some([
            self.samples.unit(base),
            self.samples.unit(base + 1),
            self.samples.unit(base + 2),
            self.samples.unit(base + 3)
        ])
    }
}
