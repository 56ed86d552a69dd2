/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Action descriptors
//!
//! Newer resources and layer metadata (layer comps, slices, per layer comp
//! state) are stored as generic key/value trees in the format Photoshop uses
//! for its actions. Each value starts with a four character type code.
use crate::bytestream::ByteCursor;
use crate::chunk::{decode_legacy_string, read_unicode_string};
use crate::errors::PsdDecodeErrors;

/// Nesting deeper than this is treated as corrupt
const MAX_NESTING: usize = 64;

/// A class instance, a list of named values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Descriptor {
    pub name:     String,
    pub class_id: String,
    pub items:    Vec<(String, DescriptorValue)>
}

impl Descriptor {
    /// First value stored under `key`
    pub fn get(&self, key: &str) -> Option<&DescriptorValue> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(DescriptorValue::as_i32)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(DescriptorValue::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(DescriptorValue::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(DescriptorValue::as_f64)
    }

    pub fn get_descriptor(&self, key: &str) -> Option<&Descriptor> {
        self.get(key).and_then(DescriptorValue::as_descriptor)
    }

    pub fn get_list(&self, key: &str) -> Option<&[DescriptorValue]> {
        self.get(key).and_then(DescriptorValue::as_list)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorValue {
    /// `Objc` and `GlbO`
    Descriptor(Descriptor),
    /// `VlLs`
    List(Vec<DescriptorValue>),
    /// `doub`
    Double(f64),
    /// `UntF`, unit is a key such as `#Pxl` or `#Prc`
    UnitFloat { unit: [u8; 4], value: f64 },
    /// `UnFl`
    UnitFloats { unit: [u8; 4], values: Vec<f64> },
    /// `TEXT`
    Text(String),
    /// `enum`
    Enumerated { type_id: String, value: String },
    /// `long`
    Integer(i32),
    /// `comp`
    LargeInteger(i64),
    /// `bool`
    Boolean(bool),
    /// `type` and `GlbC`
    Class { name: String, class_id: String },
    /// `alis`, `tdta` and `Pth `, kept as bytes
    RawData { kind: [u8; 4], data: Vec<u8> },
    /// `obj `
    Reference(Vec<ReferenceItem>)
}

impl DescriptorValue {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::LargeInteger(v) => i32::try_from(*v).ok(),
            _ => None
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) | Self::UnitFloat { value: v, .. } => Some(*v),
            Self::Integer(v) => Some(f64::from(*v)),
            _ => None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None
        }
    }

    pub fn as_descriptor(&self) -> Option<&Descriptor> {
        match self {
            Self::Descriptor(v) => Some(v),
            _ => None
        }
    }

    pub fn as_list(&self) -> Option<&[DescriptorValue]> {
        match self {
            Self::List(v) => Some(v),
            _ => None
        }
    }
}

/// One step of an `obj ` reference
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceItem {
    Property { class_id: String, key_id: String },
    Class { name: String, class_id: String },
    Enumerated { class_id: String, type_id: String, value: String },
    Offset { class_id: String, offset: u32 },
    Identifier(u32),
    Index(u32),
    Name { class_id: String, value: String }
}

/// Parse a descriptor whose header (name and class id) starts at the
/// cursor position.
///
/// Most blocks put a `u32` version in front, that is the caller's job.
pub fn read_descriptor(stream: &mut ByteCursor) -> Result<Descriptor, PsdDecodeErrors> {
    read_descriptor_nested(stream, 0)
}

fn read_descriptor_nested(stream: &mut ByteCursor, depth: usize) -> Result<Descriptor, PsdDecodeErrors> {
    if depth > MAX_NESTING {
        return Err(PsdDecodeErrors::Generic("Descriptor nesting too deep"));
    }
    let name = read_unicode_string(stream)?;
    let class_id = read_key(stream)?;
    let count = stream.read_u32()? as usize;

    // each item is at least a 4 byte key length, 4 byte key and type
    if !stream.has(count.saturating_mul(12)) {
        return Err(PsdDecodeErrors::TruncatedData(
            count.saturating_mul(12),
            stream.remaining()
        ));
    }
    let mut items = Vec::with_capacity(count);

    for _ in 0..count {
        let key = read_key(stream)?;
        let value = read_value(stream, depth)?;
        items.push((key, value));
    }
    Ok(Descriptor {
        name,
        class_id,
        items
    })
}

/// A `u32` length followed by that many bytes, a zero length means a four
/// byte key follows instead.
fn read_key(stream: &mut ByteCursor) -> Result<String, PsdDecodeErrors> {
    let length = match stream.read_u32()? as usize {
        0 => 4,
        n => n
    };
    Ok(decode_legacy_string(stream.read_bytes(length)?))
}

fn read_value(stream: &mut ByteCursor, depth: usize) -> Result<DescriptorValue, PsdDecodeErrors> {
    let kind = stream.read_fixed_bytes::<4>()?;

    let value = match &kind {
        b"Objc" | b"GlbO" => DescriptorValue::Descriptor(read_descriptor_nested(stream, depth + 1)?),
        b"VlLs" => {
            let count = stream.read_u32()? as usize;

            if !stream.has(count.saturating_mul(4)) {
                return Err(PsdDecodeErrors::TruncatedData(
                    count.saturating_mul(4),
                    stream.remaining()
                ));
            }
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(read_value(stream, depth + 1)?);
            }
            DescriptorValue::List(values)
        }
        b"doub" => DescriptorValue::Double(stream.read_f64()?),
        b"UntF" => DescriptorValue::UnitFloat {
            unit:  stream.read_fixed_bytes::<4>()?,
            value: stream.read_f64()?
        },
        b"UnFl" => {
            let unit = stream.read_fixed_bytes::<4>()?;
            let count = stream.read_u32()? as usize;
            let bytes = stream.read_bytes(count.saturating_mul(8))?;
            let values = bytes
                .chunks_exact(8)
                .map(|c| f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect();
            DescriptorValue::UnitFloats { unit, values }
        }
        b"TEXT" => DescriptorValue::Text(read_unicode_string(stream)?),
        b"enum" => DescriptorValue::Enumerated {
            type_id: read_key(stream)?,
            value:   read_key(stream)?
        },
        b"long" => DescriptorValue::Integer(stream.read_i32()?),
        b"comp" => DescriptorValue::LargeInteger(stream.read_i64()?),
        b"bool" => DescriptorValue::Boolean(stream.read_u8()? != 0),
        b"type" | b"GlbC" => DescriptorValue::Class {
            name:     read_unicode_string(stream)?,
            class_id: read_key(stream)?
        },
        b"alis" | b"tdta" | b"Pth " => {
            let length = stream.read_u32()? as usize;
            DescriptorValue::RawData {
                kind,
                data: stream.read_bytes(length)?.to_vec()
            }
        }
        b"obj " => {
            let count = stream.read_u32()? as usize;

            if !stream.has(count.saturating_mul(4)) {
                return Err(PsdDecodeErrors::TruncatedData(
                    count.saturating_mul(4),
                    stream.remaining()
                ));
            }
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_reference_item(stream)?);
            }
            DescriptorValue::Reference(items)
        }
        _ => {
            return Err(PsdDecodeErrors::UnexpectedSignature {
                expected: b"Objc",
                found:    kind
            })
        }
    };
    Ok(value)
}

fn read_reference_item(stream: &mut ByteCursor) -> Result<ReferenceItem, PsdDecodeErrors> {
    let kind = stream.read_fixed_bytes::<4>()?;

    let item = match &kind {
        b"prop" => {
            read_unicode_string(stream)?;
            ReferenceItem::Property {
                class_id: read_key(stream)?,
                key_id:   read_key(stream)?
            }
        }
        b"Clss" => ReferenceItem::Class {
            name:     read_unicode_string(stream)?,
            class_id: read_key(stream)?
        },
        b"Enmr" => {
            read_unicode_string(stream)?;
            ReferenceItem::Enumerated {
                class_id: read_key(stream)?,
                type_id:  read_key(stream)?,
                value:    read_key(stream)?
            }
        }
        b"rele" => {
            read_unicode_string(stream)?;
            ReferenceItem::Offset {
                class_id: read_key(stream)?,
                offset:   stream.read_u32()?
            }
        }
        b"Idnt" => ReferenceItem::Identifier(stream.read_u32()?),
        b"indx" => ReferenceItem::Index(stream.read_u32()?),
        b"name" => {
            read_unicode_string(stream)?;
            ReferenceItem::Name {
                class_id: read_key(stream)?,
                value:    read_unicode_string(stream)?
            }
        }
        _ => {
            return Err(PsdDecodeErrors::UnexpectedSignature {
                expected: b"prop",
                found:    kind
            })
        }
    };
    Ok(item)
}
