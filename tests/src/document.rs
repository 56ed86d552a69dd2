/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use psd_layers::zune_core::bit_depth::BitDepth;
use psd_layers::zune_core::colorspace::ColorSpace;
use psd_layers::{Document, PsdDecodeErrors};

use crate::builder::{Encoding, LayerSpec, MaskSpec, PsdBuilder};
use crate::plane;

fn masked_document(default_color: u8, flags: u8) -> Document {
    let layer = LayerSpec::new("masked", [0, 0, 4, 4])
        .channel(-1, plane(16, 255))
        .channel(0, (0..16).collect())
        .channel(1, (16..32).collect())
        .channel(2, (32..48).collect())
        .channel(-2, vec![255, 128, 0, 255])
        .mask(MaskSpec {
            rect: [1, 1, 3, 3],
            default_color,
            flags
        });
    psd_layers::load(&PsdBuilder::rgb(4, 4).layer(layer).build()).unwrap()
}

fn alpha(document: &Document, masked: bool) -> Vec<u8> {
    let pixels = document.layer_pixels(0, masked).unwrap();
    pixels.as_u8().unwrap().chunks_exact(4).map(|p| p[3]).collect()
}

#[test]
fn masked_and_raw_differ_only_in_alpha() {
    let document = masked_document(0, 0);

    let raw = document.layer_pixels(0, false).unwrap();
    let masked = document.layer_pixels(0, true).unwrap();
    assert_eq!(raw.dimensions(), masked.dimensions());

    for (r, m) in raw.as_u8().unwrap().chunks_exact(4).zip(masked.as_u8().unwrap().chunks_exact(4)) {
        assert_eq!(r[..3], m[..3]);
    }
    assert_eq!(alpha(&document, false), vec![255; 16]);

    #[rustfmt::skip]
    let expected = vec![
        0, 0,   0,   0,
        0, 255, 128, 0,
        0, 0,   255, 0,
        0, 0,   0,   0
    ];
    assert_eq!(alpha(&document, true), expected);
}

#[test]
fn mask_default_outside_rectangle() {
    let document = masked_document(255, 0);

    #[rustfmt::skip]
    let expected = vec![
        255, 255, 255, 255,
        255, 255, 128, 255,
        255, 0,   255, 255,
        255, 255, 255, 255
    ];
    assert_eq!(alpha(&document, true), expected);
}

#[test]
fn disabled_and_inverted_masks() {
    let disabled = masked_document(0, 2);
    assert_eq!(alpha(&disabled, true), vec![255; 16]);

    let inverted = masked_document(0, 4);
    let alpha = alpha(&inverted, true);
    assert_eq!(alpha[0], 255);
    assert_eq!(&alpha[5..7], &[0, 127]);
    assert_eq!(alpha[9], 255);
}

#[test]
fn mask_view() {
    let document = masked_document(0, 0);
    assert!(document.layer_info(0).unwrap().has_mask);

    let mask = document.layer_mask_pixels(0).unwrap().unwrap();
    assert_eq!(mask.dimensions(), (2, 2));
    assert_eq!(
        mask.as_u8().unwrap(),
        &[255, 255, 255, 255, 128, 128, 128, 255, 0, 0, 0, 255, 255, 255, 255, 255]
    );

    let plain = PsdBuilder::rgb(1, 1)
        .layer(LayerSpec::new("plain", [0, 0, 1, 1]).channel(0, vec![1]))
        .build();
    let document = psd_layers::load(&plain).unwrap();
    assert_eq!(document.layer_mask_pixels(0).unwrap(), None);
}

#[test]
fn missing_channels() {
    // no alpha and no blue
    let layer = LayerSpec::new("partial", [0, 0, 1, 2])
        .channel(0, vec![200, 100])
        .channel(1, vec![50, 25]);
    let document = psd_layers::load(&PsdBuilder::rgb(2, 1).layer(layer).build()).unwrap();

    let pixels = document.layer_pixels(0, true).unwrap();
    assert_eq!(pixels.as_u8().unwrap(), &[0, 50, 200, 255, 0, 25, 100, 255]);
}

#[test]
fn auto_ids() {
    let data = PsdBuilder::rgb(1, 1)
        .layer(LayerSpec::new("a", [0, 0, 1, 1]))
        .layer(LayerSpec::new("b", [0, 0, 1, 1]))
        .layer(LayerSpec::new("c", [0, 0, 1, 1]))
        .build();
    let mut document = psd_layers::load(&data).unwrap();

    assert_eq!(document.assign_auto_ids(100), 3);

    let mut ids: Vec<u32> = (0..3)
        .map(|i| document.layer_info(i).unwrap().layer_id.unwrap())
        .collect();
    assert!(ids.iter().all(|id| *id >= 100));
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    assert_eq!(document.assign_auto_ids(100), 0);
}

#[test]
fn auto_ids_skip_existing() {
    let data = PsdBuilder::rgb(1, 1)
        .layer(LayerSpec::new("a", [0, 0, 1, 1]).id(150))
        .layer(LayerSpec::new("b", [0, 0, 1, 1]))
        .layer(LayerSpec::new("c", [0, 0, 1, 1]).id(3))
        .build();
    let mut document = psd_layers::load(&data).unwrap();

    assert_eq!(document.assign_auto_ids(100), 1);
    assert_eq!(document.layer_info(1).unwrap().layer_id, Some(151));
    assert_eq!(document.layer_info(0).unwrap().layer_id, Some(150));
    assert_eq!(document.layer_info(2).unwrap().layer_id, Some(3));
}

#[test]
fn out_of_range_queries() {
    let data = PsdBuilder::rgb(1, 1)
        .layer(LayerSpec::new("a", [0, 0, 1, 1]).channel(0, vec![1]))
        .build();
    let document = psd_layers::load(&data).unwrap();
    let count = document.layer_count();

    assert!(matches!(
        document.layer_pixels(count, false),
        Err(PsdDecodeErrors::InvalidArgument(_))
    ));
    assert!(matches!(
        document.layer_pixels(usize::MAX, true),
        Err(PsdDecodeErrors::InvalidArgument(_))
    ));
    assert!(document.layer_name(count).is_err());
    assert!(document.layer_info(count).is_err());
    assert!(document.layer_type(count).is_err());
    assert!(document.layer_mask_pixels(count).is_err());

    // the document is still usable
    assert_eq!(document.layer_pixels(0, false).unwrap().dimensions(), (1, 1));
}

#[test]
fn cmyk_composite() {
    let planes = vec![vec![255, 0], vec![0, 255], vec![255, 255], vec![255, 0]];
    let data = PsdBuilder::new(2, 1, 4, 8, 4)
        .composite(Encoding::Raw, planes)
        .build();
    let document = psd_layers::load(&data).unwrap();

    assert_eq!(document.colorspace(), ColorSpace::CMYK);
    let pixels = document.composite_pixels().unwrap();
    // second pixel has full black ink
    assert_eq!(pixels.as_u8().unwrap(), &[255, 0, 255, 255, 0, 0, 0, 255]);
}

#[test]
fn indexed_composite() {
    let mut builder = PsdBuilder::new(2, 1, 1, 8, 2).composite(Encoding::Rle, vec![vec![1, 0]]);
    builder.color_mode_data = vec![0; 768];
    builder.color_mode_data[1] = 10;
    builder.color_mode_data[256 + 1] = 20;
    builder.color_mode_data[512 + 1] = 30;

    let document = psd_layers::load(&builder.build()).unwrap();
    assert_eq!(document.color_mode_data().len(), 768);

    let pixels = document.composite_pixels().unwrap();
    assert_eq!(pixels.as_u8().unwrap(), &[30, 20, 10, 255, 0, 0, 0, 255]);
}

#[test]
fn indexed_without_palette() {
    let data = PsdBuilder::new(1, 1, 1, 8, 2).build();
    assert!(psd_layers::load(&data).is_err());
}

#[test]
fn bitmap_composite() {
    let data = PsdBuilder::new(3, 1, 1, 1, 0)
        .composite(Encoding::Raw, vec![vec![0b1010_0000]])
        .build();
    let document = psd_layers::load(&data).unwrap();
    let pixels = document.composite_pixels().unwrap();

    assert_eq!(pixels.bit_depth(), BitDepth::Eight);
    assert_eq!(
        pixels.as_u8().unwrap(),
        &[0, 0, 0, 255, 255, 255, 255, 255, 0, 0, 0, 255]
    );
}

#[test]
fn lab_white_composite() {
    let data = PsdBuilder::new(1, 1, 3, 8, 9)
        .composite(Encoding::Raw, vec![vec![255], vec![128], vec![128]])
        .build();
    let pixels = psd_layers::load(&data).unwrap().composite_pixels().unwrap();

    assert!(pixels.as_u8().unwrap()[..3].iter().all(|c| *c >= 253));
}

#[test]
fn merged_alpha_needs_the_flag() {
    let planes = vec![vec![100], vec![50]];

    let data = PsdBuilder::new(1, 1, 2, 8, 1)
        .composite(Encoding::Raw, planes.clone())
        .build();
    let document = psd_layers::load(&data).unwrap();
    assert_eq!(document.colorspace(), ColorSpace::LumaA);
    assert_eq!(document.composite_pixels().unwrap().as_u8().unwrap(), &[100, 100, 100, 255]);

    let data = PsdBuilder::new(1, 1, 2, 8, 1)
        .layer(LayerSpec::new("a", [0, 0, 1, 1]).channel(0, vec![1]))
        .merged_transparency()
        .composite(Encoding::Raw, planes)
        .build();
    let document = psd_layers::load(&data).unwrap();
    assert_eq!(document.composite_pixels().unwrap().as_u8().unwrap(), &[100, 100, 100, 50]);
}

#[test]
fn concurrent_queries() {
    let document = masked_document(0, 0);
    let expected = document.layer_pixels(0, true).unwrap();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| document.layer_pixels(0, true).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn pixels_own_their_data() {
    let data = PsdBuilder::rgb(1, 1)
        .composite(Encoding::Raw, vec![vec![1], vec![2], vec![3]])
        .build();
    let document = psd_layers::load(&data).unwrap();
    drop(data);

    assert_eq!(document.composite_pixels().unwrap().as_u8().unwrap(), &[3, 2, 1, 255]);
}
