/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

#![allow(clippy::upper_case_acronyms)]

pub const PSD_SIGNATURE: &[u8; 4] = b"8BPS";
pub const RESOURCE_SIGNATURE: &[u8; 4] = b"8BIM";
pub const RESOURCE_SIGNATURES: &[&[u8; 4]] = &[b"8BIM", b"MeSa", b"AgHg", b"PHUT", b"DCSR"];
pub const BLEND_SIGNATURE: &[u8; 4] = b"8BIM";
pub const EXTRA_SIGNATURES: &[&[u8; 4]] = &[b"8BIM", b"8B64"];

pub const PSD_MAX_DIMENSION: usize = 30_000;
pub const PSB_MAX_DIMENSION: usize = 300_000;
pub const MAX_CHANNELS: u16 = 56;
/// Photoshop refuses documents with more layers than this
pub const MAX_LAYER_COUNT: usize = 8_000;
/// Bounds, channel count, blend signature, blend key, opacity, clipping,
/// flags, filler and the extra data length of a layer record with no
/// channels.
pub const MIN_LAYER_RECORD_SIZE: usize = 34;

/// Additional layer info keys whose length field is 8 bytes in PSB files
pub const PSB_LONG_KEYS: &[&[u8; 4]] = &[
    b"LMsk", b"Lr16", b"Lr32", b"Layr", b"Mt16", b"Mt32", b"Mtrn", b"Alph", b"FMsk", b"lnk2",
    b"FEid", b"FXid", b"PxSD"
];

/// File format flavour, decided by the header version
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PsdVersion {
    /// Version 1, regular Photoshop document
    Psd,
    /// Version 2, large document format
    Psb
}

impl PsdVersion {
    pub fn from_int(int: u16) -> Option<PsdVersion> {
        match int {
            1 => Some(Self::Psd),
            2 => Some(Self::Psb),
            _ => None
        }
    }

    pub const fn to_int(self) -> u16 {
        match self {
            Self::Psd => 1,
            Self::Psb => 2
        }
    }

    pub const fn max_dimension(self) -> usize {
        match self {
            Self::Psd => PSD_MAX_DIMENSION,
            Self::Psb => PSB_MAX_DIMENSION
        }
    }

    pub const fn is_large(self) -> bool {
        matches!(self, Self::Psb)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ColorMode {
    Bitmap = 0,
    Grayscale = 1,
    Indexed = 2,
    RGB = 3,
    CMYK = 4,
    Multichannel = 7,
    Duotone = 8,
    Lab = 9
}

impl ColorMode {
    pub fn from_int(int: u16) -> Option<ColorMode> {
        use crate::constants::ColorMode::{
            Bitmap, Duotone, Grayscale, Indexed, Lab, Multichannel, CMYK, RGB
        };

        match int {
            0 => Some(Bitmap),
            1 => Some(Grayscale),
            2 => Some(Indexed),
            3 => Some(RGB),
            4 => Some(CMYK),
            7 => Some(Multichannel),
            8 => Some(Duotone),
            9 => Some(Lab),
            _ => None
        }
    }

    pub const fn to_int(self) -> u16 {
        self as u16
    }

    /// Number of channels that carry colour, the rest are alpha/spot
    pub const fn color_channels(self) -> usize {
        match self {
            Self::Bitmap | Self::Grayscale | Self::Indexed | Self::Duotone => 1,
            Self::RGB | Self::Lab => 3,
            Self::CMYK => 4,
            Self::Multichannel => 1
        }
    }
}

/// Sample depth as stored in the file
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PsdDepth {
    One,
    Eight,
    Sixteen,
    ThirtyTwo
}

impl PsdDepth {
    pub fn from_int(int: u16) -> Option<PsdDepth> {
        match int {
            1 => Some(Self::One),
            8 => Some(Self::Eight),
            16 => Some(Self::Sixteen),
            32 => Some(Self::ThirtyTwo),
            _ => None
        }
    }

    pub const fn bits(self) -> u16 {
        match self {
            Self::One => 1,
            Self::Eight => 8,
            Self::Sixteen => 16,
            Self::ThirtyTwo => 32
        }
    }

    /// Bytes needed to store one scanline of `width` samples
    pub const fn row_bytes(self, width: usize) -> usize {
        match self {
            Self::One => (width + 7) / 8,
            Self::Eight => width,
            Self::Sixteen => width * 2,
            Self::ThirtyTwo => width * 4
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Compression {
    Raw = 0,
    Rle = 1,
    Zip = 2,
    ZipPrediction = 3
}

impl Compression {
    pub fn from_int(int: u16) -> Option<Compression> {
        match int {
            0 => Some(Self::Raw),
            1 => Some(Self::Rle),
            2 => Some(Self::Zip),
            3 => Some(Self::ZipPrediction),
            _ => None
        }
    }
}

/// Kind of entry in the flat layer list
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum LayerType {
    /// A regular pixel layer
    #[default]
    Any,
    /// Start of an expanded group
    OpenFolder,
    /// Start of a collapsed group
    ClosedFolder,
    /// Hidden marker that closes a group
    BoundingSectionDivider
}

impl LayerType {
    pub fn from_int(int: u32) -> Option<LayerType> {
        match int {
            0 => Some(Self::Any),
            1 => Some(Self::OpenFolder),
            2 => Some(Self::ClosedFolder),
            3 => Some(Self::BoundingSectionDivider),
            _ => None
        }
    }

    pub const fn is_folder(self) -> bool {
        matches!(self, Self::OpenFolder | Self::ClosedFolder)
    }

    /// Folders and dividers carry no pixels of their own
    pub const fn is_group_marker(self) -> bool {
        !matches!(self, Self::Any)
    }
}

/// Layer blend modes keyed by their four character code
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum BlendMode {
    PassThrough,
    #[default]
    Normal,
    Dissolve,
    Darken,
    Multiply,
    ColorBurn,
    LinearBurn,
    DarkerColor,
    Lighten,
    Screen,
    ColorDodge,
    LinearDodge,
    LighterColor,
    Overlay,
    SoftLight,
    HardLight,
    VividLight,
    LinearLight,
    PinLight,
    HardMix,
    Difference,
    Exclusion,
    Subtract,
    Divide,
    Hue,
    Saturation,
    Color,
    Luminosity,
    /// A key we do not know, kept verbatim
    Unknown([u8; 4])
}

impl BlendMode {
    pub fn from_key(key: [u8; 4]) -> BlendMode {
        match &key {
            b"pass" => Self::PassThrough,
            b"norm" => Self::Normal,
            b"diss" => Self::Dissolve,
            b"dark" => Self::Darken,
            b"mul " => Self::Multiply,
            b"idiv" => Self::ColorBurn,
            b"lbrn" => Self::LinearBurn,
            b"dkCl" => Self::DarkerColor,
            b"lite" => Self::Lighten,
            b"scrn" => Self::Screen,
            b"div " => Self::ColorDodge,
            b"lddg" => Self::LinearDodge,
            b"lgCl" => Self::LighterColor,
            b"over" => Self::Overlay,
            b"sLit" => Self::SoftLight,
            b"hLit" => Self::HardLight,
            b"vLit" => Self::VividLight,
            b"lLit" => Self::LinearLight,
            b"pLit" => Self::PinLight,
            b"hMix" => Self::HardMix,
            b"diff" => Self::Difference,
            b"smud" => Self::Exclusion,
            b"fsub" => Self::Subtract,
            b"fdiv" => Self::Divide,
            b"hue " => Self::Hue,
            b"sat " => Self::Saturation,
            b"colr" => Self::Color,
            b"lum " => Self::Luminosity,
            _ => Self::Unknown(key)
        }
    }

    pub fn to_key(self) -> [u8; 4] {
        let key = match self {
            Self::PassThrough => b"pass",
            Self::Normal => b"norm",
            Self::Dissolve => b"diss",
            Self::Darken => b"dark",
            Self::Multiply => b"mul ",
            Self::ColorBurn => b"idiv",
            Self::LinearBurn => b"lbrn",
            Self::DarkerColor => b"dkCl",
            Self::Lighten => b"lite",
            Self::Screen => b"scrn",
            Self::ColorDodge => b"div ",
            Self::LinearDodge => b"lddg",
            Self::LighterColor => b"lgCl",
            Self::Overlay => b"over",
            Self::SoftLight => b"sLit",
            Self::HardLight => b"hLit",
            Self::VividLight => b"vLit",
            Self::LinearLight => b"lLit",
            Self::PinLight => b"pLit",
            Self::HardMix => b"hMix",
            Self::Difference => b"diff",
            Self::Exclusion => b"smud",
            Self::Subtract => b"fsub",
            Self::Divide => b"fdiv",
            Self::Hue => b"hue ",
            Self::Saturation => b"sat ",
            Self::Color => b"colr",
            Self::Luminosity => b"lum ",
            Self::Unknown(key) => return key
        };
        *key
    }

    /// Lowercase name, unknown keys report as `"normal"`
    pub const fn name(self) -> &'static str {
        match self {
            Self::PassThrough => "pass_through",
            Self::Normal | Self::Unknown(_) => "normal",
            Self::Dissolve => "dissolve",
            Self::Darken => "darken",
            Self::Multiply => "multiply",
            Self::ColorBurn => "color_burn",
            Self::LinearBurn => "linear_burn",
            Self::DarkerColor => "darker_color",
            Self::Lighten => "lighten",
            Self::Screen => "screen",
            Self::ColorDodge => "color_dodge",
            Self::LinearDodge => "linear_dodge",
            Self::LighterColor => "lighter_color",
            Self::Overlay => "overlay",
            Self::SoftLight => "soft_light",
            Self::HardLight => "hard_light",
            Self::VividLight => "vivid_light",
            Self::LinearLight => "linear_light",
            Self::PinLight => "pin_light",
            Self::HardMix => "hard_mix",
            Self::Difference => "difference",
            Self::Exclusion => "exclusion",
            Self::Subtract => "subtract",
            Self::Divide => "divide",
            Self::Hue => "hue",
            Self::Saturation => "saturation",
            Self::Color => "color",
            Self::Luminosity => "luminosity"
        }
    }
}

/// Image resource identifiers the resource parser understands
pub mod resource_ids {
    pub const RESOLUTION_INFO: u16 = 1005;
    pub const LAYER_STATE: u16 = 1024;
    pub const LAYER_GROUP_INFO: u16 = 1026;
    pub const GRID_AND_GUIDES: u16 = 1032;
    pub const THUMBNAIL_LEGACY: u16 = 1033;
    pub const THUMBNAIL: u16 = 1036;
    pub const ICC_PROFILE: u16 = 1039;
    pub const ID_SEED: u16 = 1044;
    pub const TRANSPARENCY_INDEX: u16 = 1047;
    pub const SLICES: u16 = 1050;
    pub const LAYER_COMPS: u16 = 1065;
    pub const LAYER_SELECTION_IDS: u16 = 1069;
}

/// Special channel ids in layer records
pub mod channel_ids {
    pub const TRANSPARENCY: i16 = -1;
    pub const USER_MASK: i16 = -2;
    pub const REAL_USER_MASK: i16 = -3;
}
