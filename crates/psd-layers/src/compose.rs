/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Turning decoded planes into BGRA pixel buffers.
//!
//! Nothing here is cached, every call recomputes from the channel samples
//! stored in the document.
use zune_core::bit_depth::BitDepth;

use crate::channel::ChannelSamples;
use crate::constants::{channel_ids, ColorMode, PsdDepth};
use crate::header::PsdHeader;
use crate::layers::{LayerMask, LayerRecord, LayerRect};
use crate::pixels::{PixelBuffer, PixelSamples};

/// Host sample width for a file depth, 1 bit widens to 8
pub const fn output_depth(depth: PsdDepth) -> BitDepth {
    match depth {
        PsdDepth::One | PsdDepth::Eight => BitDepth::Eight,
        PsdDepth::Sixteen => BitDepth::Sixteen,
        PsdDepth::ThirtyTwo => BitDepth::Float32
    }
}

/// Colour planes of one image plus what is needed to turn them into RGB
struct ColorPlanes<'a> {
    mode:    ColorMode,
    planes:  Vec<Option<&'a ChannelSamples>>,
    /// Indexed colour table, 256 reds then 256 greens then 256 blues
    palette: &'a [u8]
}

impl<'a> ColorPlanes<'a> {
    #[inline]
    fn value(&self, plane: usize, index: usize) -> f32 {
        match self.planes.get(plane).copied().flatten() {
            Some(samples) => samples.value(index),
            None => 0.0
        }
    }

    /// Red, green and blue of pixel `index`
    fn rgb(&self, index: usize) -> [f32; 3] {
        match self.mode {
            ColorMode::RGB => [self.value(0, index), self.value(1, index), self.value(2, index)],
            ColorMode::Grayscale | ColorMode::Duotone | ColorMode::Multichannel => {
                let grey = self.value(0, index);
                [grey; 3]
            }
            ColorMode::Bitmap => {
                // a set bit is black
                let grey = 1.0 - self.value(0, index);
                [grey; 3]
            }
            ColorMode::Indexed => {
                let entry = (self.value(0, index) * 255.0).round().clamp(0.0, 255.0) as usize;
                let component = |offset: usize| {
                    f32::from(self.palette.get(offset + entry).copied().unwrap_or(0)) / 255.0
                };
                [component(0), component(256), component(512)]
            }
            ColorMode::CMYK => {
                // stored inverted, 1.0 means no ink; a missing black plane means no black ink
                let black = match self.planes.get(3).copied().flatten() {
                    Some(samples) => samples.value(index),
                    None => 1.0
                };
                [
                    self.value(0, index) * black,
                    self.value(1, index) * black,
                    self.value(2, index) * black
                ]
            }
            ColorMode::Lab => lab_to_rgb(
                self.value(0, index) * 100.0,
                self.value(1, index) * 255.0 - 128.0,
                self.value(2, index) * 255.0 - 128.0
            )
        }
    }
}

/// CIE L*a*b* (D50) to gamma encoded sRGB, components in `[0, 1]`
pub fn lab_to_rgb(l: f32, a: f32, b: f32) -> [f32; 3] {
    const WHITE: [f32; 3] = [0.9642, 1.0, 0.8249];

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let inverse = |t: f32| {
        let cube = t * t * t;
        if cube > 0.008856 {
            cube
        } else {
            (t - 16.0 / 116.0) / 7.787
        }
    };
    let x = WHITE[0] * inverse(fx);
    let y = WHITE[1] * inverse(fy);
    let z = WHITE[2] * inverse(fz);

    // D50 XYZ to linear sRGB, Bradford adapted
    let linear = [
        3.133_856_1 * x - 1.616_866_7 * y - 0.490_614_6 * z,
        -0.978_768_4 * x + 1.916_141_5 * y + 0.033_454 * z,
        0.071_945_3 * x - 0.228_991_4 * y + 1.405_242_7 * z
    ];
    linear.map(|c| {
        let c = c.clamp(0.0, 1.0);
        if c <= 0.003_130_8 {
            12.92 * c
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        }
    })
}

/// Coverage lookup for a layer mask in document coordinates
struct MaskCoverage<'a> {
    rect:    LayerRect,
    default: f32,
    invert:  bool,
    samples: Option<&'a ChannelSamples>
}

impl<'a> MaskCoverage<'a> {
    fn new(mask: &LayerMask, samples: Option<&'a ChannelSamples>) -> MaskCoverage<'a> {
        MaskCoverage {
            rect: mask.rect,
            default: f32::from(mask.default_color) / 255.0,
            invert: mask.is_inverted(),
            samples
        }
    }

    fn at(&self, x: i32, y: i32) -> f32 {
        let coverage = match self.samples {
            Some(samples) if self.rect.contains(x, y) => {
                let column = (x - self.rect.left) as usize;
                let row = (y - self.rect.top) as usize;
                samples.unit(row * self.rect.width() + column)
            }
            _ => self.default
        };
        if self.invert {
            1.0 - coverage
        } else {
            coverage
        }
    }
}

fn interleave(
    width: usize, height: usize, depth: BitDepth, colors: &ColorPlanes, alpha: impl Fn(usize, usize) -> f32
) -> PixelBuffer {
    let mut samples = PixelSamples::with_capacity(depth, width * height * PixelBuffer::COMPONENTS);

    for y in 0..height {
        for x in 0..width {
            let index = y * width + x;
            let [r, g, b] = colors.rgb(index);
            samples.push_unit(b);
            samples.push_unit(g);
            samples.push_unit(r);
            samples.push_unit(alpha(x, y).clamp(0.0, 1.0));
        }
    }
    PixelBuffer::new(width, height, samples)
}

/// BGRA view of one layer.
///
/// Without an alpha channel the layer is opaque. With `masked` set an
/// enabled user mask scales alpha by its coverage. Group records and
/// empty layers give a 0x0 buffer.
pub fn compose_layer(layer: &LayerRecord, header: &PsdHeader, palette: &[u8], masked: bool) -> PixelBuffer {
    let depth = output_depth(header.depth);

    if layer.layer_type.is_group_marker() || layer.rect.is_empty() {
        return PixelBuffer::new(0, 0, PixelSamples::with_capacity(depth, 0));
    }
    let (width, height) = (layer.rect.width(), layer.rect.height());

    let colors = ColorPlanes {
        mode: header.color_mode,
        planes: (0..header.color_mode.color_channels() as i16)
            .map(|id| layer.channel(id))
            .collect(),
        palette
    };
    let alpha_plane = layer.channel(channel_ids::TRANSPARENCY);
    let mask = layer
        .mask
        .as_ref()
        .filter(|m| masked && !m.is_disabled())
        .map(|m| MaskCoverage::new(m, layer.channel(channel_ids::USER_MASK)));

    let alpha = |x: usize, y: usize| {
        let base = alpha_plane.map_or(1.0, |a| a.unit(y * width + x));
        match &mask {
            Some(mask) => {
                base * mask.at(layer.rect.left + x as i32, layer.rect.top + y as i32)
            }
            None => base
        }
    };
    interleave(width, height, depth, &colors, alpha)
}

/// BGRA view of the merged image.
///
/// The first plane after the colour planes is used as alpha only when the
/// document says the merged image carries transparency.
pub fn compose_merged(
    planes: &[ChannelSamples], header: &PsdHeader, palette: &[u8], merged_has_transparency: bool
) -> PixelBuffer {
    let color_count = header.color_mode.color_channels();

    let colors = ColorPlanes {
        mode: header.color_mode,
        planes: (0..color_count).map(|i| planes.get(i)).collect(),
        palette
    };
    let alpha_plane = if merged_has_transparency {
        planes.get(color_count)
    } else {
        None
    };
    let width = header.width;
    let alpha = |x: usize, y: usize| alpha_plane.map_or(1.0, |a| a.unit(y * width + x));

    interleave(header.width, header.height, output_depth(header.depth), &colors, alpha)
}

/// The user mask alone, grey is coverage and alpha is opaque.
///
/// `None` when the layer has no mask or its rectangle is empty.
pub fn compose_mask(layer: &LayerRecord, header: &PsdHeader) -> Option<PixelBuffer> {
    let mask = layer.mask.as_ref()?;

    if mask.rect.is_empty() {
        return None;
    }
    let (width, height) = (mask.rect.width(), mask.rect.height());
    let samples = layer.channel(channel_ids::USER_MASK);
    let default = f32::from(mask.default_color) / 255.0;

    let mut out = PixelSamples::with_capacity(output_depth(header.depth), width * height * 4);
    for index in 0..width * height {
        let coverage = samples.map_or(default, |s| s.unit(index));
        out.push_unit(coverage);
        out.push_unit(coverage);
        out.push_unit(coverage);
        out.push_unit(1.0);
    }
    Some(PixelBuffer::new(width, height, out))
}
