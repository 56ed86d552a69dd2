/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The decoded document and its query surface.
//!
//! A [`Document`] owns everything decoded from the file. All queries take
//! `&self`, the one mutation is [`Document::assign_auto_ids`].
use log::debug;
use zune_core::colorspace::ColorSpace;

use crate::compose::{compose_layer, compose_mask, compose_merged};
use crate::constants::{BlendMode, ColorMode, LayerType, PsdVersion};
use crate::errors::PsdDecodeErrors;
use crate::header::PsdHeader;
use crate::image_data::MergedImage;
use crate::layers::{GlobalLayerMask, LayerCompState, LayerRecord, LayerSection};
use crate::pixels::PixelBuffer;
use crate::resources::{
    GridAndGuides, ImageResource, ImageResources, LayerComps, ResolutionInfo, Slices
};

/// Flat summary of a layer record
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfo {
    pub top:                    i32,
    pub left:                   i32,
    pub bottom:                 i32,
    pub right:                  i32,
    pub width:                  usize,
    pub height:                 usize,
    pub opacity:                u8,
    pub fill_opacity:           u8,
    /// The record lists a mask channel
    pub has_mask:               bool,
    pub blend_mode:             BlendMode,
    pub layer_type:             LayerType,
    pub visible:                bool,
    pub clipping:               bool,
    pub layer_id:               Option<u32>,
    pub obsolete:               bool,
    pub transparency_protected: bool,
    pub pixel_data_irrelevant:  bool,
    /// Layer id of the enclosing group
    pub group_layer_id:         Option<u32>,
    pub name:                   String,
    pub comp_states:            Vec<LayerCompState>
}

#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) header:          PsdHeader,
    pub(crate) color_mode_data: Vec<u8>,
    pub(crate) resources:       ImageResources,
    pub(crate) layers:          LayerSection,
    pub(crate) merged:          Option<MergedImage>
}

impl Document {
    pub fn header(&self) -> &PsdHeader {
        &self.header
    }

    pub fn version(&self) -> PsdVersion {
        self.header.version
    }

    pub fn width(&self) -> usize {
        self.header.width
    }

    pub fn height(&self) -> usize {
        self.header.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.header.width, self.header.height)
    }

    pub fn channel_count(&self) -> usize {
        usize::from(self.header.channels)
    }

    /// Bits per channel in the file, 1, 8, 16 or 32
    pub fn bit_depth(&self) -> u16 {
        self.header.depth.bits()
    }

    pub fn color_mode(&self) -> ColorMode {
        self.header.color_mode
    }

    /// Closest zune colorspace of the merged channels
    pub fn colorspace(&self) -> ColorSpace {
        let channels = self.header.channels;

        match self.header.color_mode {
            ColorMode::RGB | ColorMode::Indexed if channels >= 4 => ColorSpace::RGBA,
            ColorMode::RGB | ColorMode::Indexed => ColorSpace::RGB,
            ColorMode::CMYK => ColorSpace::CMYK,
            ColorMode::Lab => ColorSpace::Unknown,
            _ if channels >= 2 => ColorSpace::LumaA,
            _ => ColorSpace::Luma
        }
    }

    /// Raw colour mode data, the palette of indexed images
    pub fn color_mode_data(&self) -> &[u8] {
        &self.color_mode_data
    }

    pub fn resources(&self) -> &ImageResources {
        &self.resources
    }

    pub fn resource(&self, id: u16) -> Option<&ImageResource> {
        self.resources.get(id)
    }

    /// Slices from resource 1050.
    ///
    /// `None` both when the resource is absent and when it is present but
    /// could not be decoded. The two are told apart by [`resource`](Self::resource),
    /// a broken block is kept there as [`Tagged::Skipped`](crate::chunk::Tagged::Skipped).
    /// The same holds for [`guides`](Self::guides), [`layer_comps`](Self::layer_comps)
    /// and [`resolution`](Self::resolution).
    pub fn slices(&self) -> Option<&Slices> {
        self.resources.slices()
    }

    /// Grid and guides from resource 1032, see [`slices`](Self::slices)
    /// for what `None` means
    pub fn guides(&self) -> Option<&GridAndGuides> {
        self.resources.guides()
    }

    /// Layer comps from resource 1065, see [`slices`](Self::slices)
    /// for what `None` means
    pub fn layer_comps(&self) -> Option<&LayerComps> {
        self.resources.layer_comps()
    }

    pub fn icc_profile(&self) -> Option<&[u8]> {
        self.resources.icc_profile()
    }

    pub fn resolution(&self) -> Option<&ResolutionInfo> {
        self.resources.resolution()
    }

    /// The layer count was negative in the file, meaning the first extra
    /// merged channel is transparency
    pub fn merged_has_transparency(&self) -> bool {
        self.layers.merged_has_transparency
    }

    pub fn global_mask(&self) -> Option<&GlobalLayerMask> {
        self.layers.global_mask.as_ref()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.layers.len()
    }

    /// Records in file order, bottom most first
    pub fn layers(&self) -> &[LayerRecord] {
        &self.layers.layers
    }

    pub fn layer(&self, index: usize) -> Result<&LayerRecord, PsdDecodeErrors> {
        self.layers.layers.get(index).ok_or_else(|| {
            PsdDecodeErrors::InvalidArgument(format!(
                "layer index {index} out of range, document has {} layers",
                self.layers.layers.len()
            ))
        })
    }

    pub fn layer_name(&self, index: usize) -> Result<&str, PsdDecodeErrors> {
        Ok(self.layer(index)?.name())
    }

    pub fn layer_type(&self, index: usize) -> Result<LayerType, PsdDecodeErrors> {
        Ok(self.layer(index)?.layer_type)
    }

    pub fn layer_info(&self, index: usize) -> Result<LayerInfo, PsdDecodeErrors> {
        let layer = self.layer(index)?;
        let group_layer_id = layer.parent.and_then(|p| self.layers.layers[p].layer_id);

        Ok(LayerInfo {
            top: layer.rect.top,
            left: layer.rect.left,
            bottom: layer.rect.bottom,
            right: layer.rect.right,
            width: layer.rect.width(),
            height: layer.rect.height(),
            opacity: layer.opacity,
            fill_opacity: layer.fill_opacity,
            has_mask: layer.channels.iter().any(|c| c.id <= -2),
            blend_mode: layer.blend_mode,
            layer_type: layer.layer_type,
            visible: layer.is_visible(),
            clipping: layer.is_clipped(),
            layer_id: layer.layer_id,
            obsolete: layer.is_obsolete(),
            transparency_protected: layer.is_transparency_protected(),
            pixel_data_irrelevant: layer.is_pixel_data_irrelevant(),
            group_layer_id,
            name: layer.name().to_string(),
            comp_states: layer.comp_states.clone()
        })
    }

    /// Index of the group record enclosing `index`
    pub fn layer_parent(&self, index: usize) -> Result<Option<usize>, PsdDecodeErrors> {
        Ok(self.layer(index)?.parent)
    }

    /// Indices whose enclosing group is `parent`, `None` for the top level.
    ///
    /// Returned in file order.
    pub fn children(&self, parent: Option<usize>) -> Result<Vec<usize>, PsdDecodeErrors> {
        if let Some(parent) = parent {
            self.layer(parent)?;
        }
        Ok(self
            .layers
            .layers
            .iter()
            .enumerate()
            .filter(|(_, l)| l.parent == parent)
            .map(|(i, _)| i)
            .collect())
    }

    /// BGRA pixels of one layer, with or without its mask applied
    pub fn layer_pixels(&self, index: usize, masked: bool) -> Result<PixelBuffer, PsdDecodeErrors> {
        let layer = self.layer(index)?;
        Ok(compose_layer(layer, &self.header, &self.color_mode_data, masked))
    }

    /// The layer mask alone, `None` when the layer has none or it is empty
    pub fn layer_mask_pixels(&self, index: usize) -> Result<Option<PixelBuffer>, PsdDecodeErrors> {
        let layer = self.layer(index)?;
        Ok(compose_mask(layer, &self.header))
    }

    pub fn has_composite(&self) -> bool {
        self.merged.is_some()
    }

    /// BGRA pixels of the merged image stored in the file
    pub fn composite_pixels(&self) -> Result<PixelBuffer, PsdDecodeErrors> {
        let merged = self.merged.as_ref().ok_or_else(|| {
            PsdDecodeErrors::InvalidArgument("document has no composite image data".to_string())
        })?;
        Ok(compose_merged(
            &merged.planes,
            &self.header,
            &self.color_mode_data,
            self.layers.merged_has_transparency
        ))
    }

    /// Give every layer without an id a new one.
    ///
    /// Ids start at `base_id`, or after the largest existing id when that
    /// is larger, so they never collide with ids already present. Returns
    /// how many layers were changed.
    pub fn assign_auto_ids(&mut self, base_id: u32) -> usize {
        let layers = &mut self.layers.layers;

        let mut next = layers
            .iter()
            .filter_map(|l| l.layer_id)
            .max()
            .map_or(base_id, |max| base_id.max(max.saturating_add(1)));

        let mut assigned = 0;
        for layer in layers.iter_mut().filter(|l| l.layer_id.is_none()) {
            layer.layer_id = Some(next);
            next = next.saturating_add(1);
            assigned += 1;
        }
        if assigned > 0 {
            debug!("Assigned {assigned} layer ids");
        }
        assigned
    }
}
