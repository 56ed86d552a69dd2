/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use psd_layers::chunk::Tagged;
use psd_layers::layers::AdditionalInfo;
use psd_layers::{BlendMode, LayerType, PsdDecodeErrors};

use crate::builder::{comp_metadata, object, Encoding, Item, LayerSpec, PsdBuilder};
use crate::plane;

/// An opaque RGB layer filled with one colour
fn solid(name: &str, rect: [i32; 4], rgb: [u8; 3]) -> LayerSpec {
    let area = ((rect[2] - rect[0]) * (rect[3] - rect[1])) as usize;
    LayerSpec::new(name, rect)
        .channel(-1, plane(area, 255))
        .channel(0, plane(area, rgb[0]))
        .channel(1, plane(area, rgb[1]))
        .channel(2, plane(area, rgb[2]))
}

#[test]
fn negative_layer_count() {
    let data = PsdBuilder::new(2, 2, 4, 8, 3)
        .layer(solid("only", [0, 0, 2, 2], [1, 2, 3]))
        .merged_transparency()
        .build();
    let document = psd_layers::load(&data).unwrap();

    assert_eq!(document.layer_count(), 1);
    assert!(document.merged_has_transparency());
    assert_eq!(document.layer_name(0).unwrap(), "only");
}

#[test]
fn record_fields() {
    let mut layer = solid("legacy", [1, 2, 3, 5], [0, 0, 0])
        .unicode("Ünïcode")
        .id(42)
        .flags(0b0001_1011)
        .block(b"iOpa", vec![128]);
    layer.blend = *b"mul ";
    layer.opacity = 200;
    layer.clipping = 1;

    let data = PsdBuilder::rgb(8, 8).layer(layer).build();
    let document = psd_layers::load(&data).unwrap();
    let info = document.layer_info(0).unwrap();

    assert_eq!((info.top, info.left, info.bottom, info.right), (1, 2, 3, 5));
    assert_eq!((info.width, info.height), (3, 2));
    assert_eq!(info.name, "Ünïcode");
    assert_eq!(document.layer(0).unwrap().legacy_name, "legacy");
    assert_eq!(info.layer_id, Some(42));
    assert_eq!(info.blend_mode, BlendMode::Multiply);
    assert_eq!(info.blend_mode.name(), "multiply");
    assert_eq!(info.opacity, 200);
    assert_eq!(info.fill_opacity, 128);
    assert!(info.clipping);
    assert!(info.transparency_protected);
    assert!(!info.visible);
    assert!(!info.obsolete);
    assert!(info.pixel_data_irrelevant);
    assert!(!info.has_mask);
    assert_eq!(info.group_layer_id, None);
}

#[test]
fn unknown_blocks_are_kept() {
    let layer = solid("a", [0, 0, 1, 1], [9, 9, 9]).block(b"zzzz", vec![1, 2, 3]);
    let data = PsdBuilder::rgb(1, 1).layer(layer).build();
    let document = psd_layers::load(&data).unwrap();

    let record = document.layer(0).unwrap();
    assert!(record.additional_info.contains(&Tagged::Skipped {
        signature: *b"zzzz",
        data:      vec![1, 2, 3]
    }));
}

#[test]
fn group_tree() {
    let data = PsdBuilder::rgb(4, 4)
        .layer(LayerSpec::divider("</Layer group>", 3))
        .layer(solid("a", [0, 0, 2, 2], [255, 0, 0]))
        .layer(solid("b", [2, 2, 4, 4], [0, 255, 0]).id(11))
        .layer(LayerSpec::divider("Group", 1).id(7))
        .layer(solid("top", [0, 0, 4, 4], [0, 0, 255]))
        .build();
    let document = psd_layers::load(&data).unwrap();

    assert_eq!(document.layer_type(0).unwrap(), LayerType::BoundingSectionDivider);
    assert_eq!(document.layer_type(3).unwrap(), LayerType::OpenFolder);
    assert_eq!(document.layer_type(4).unwrap(), LayerType::Any);

    assert_eq!(document.children(None).unwrap(), vec![3, 4]);
    assert_eq!(document.children(Some(3)).unwrap(), vec![0, 1, 2]);
    assert_eq!(document.layer_parent(1).unwrap(), Some(3));
    assert_eq!(document.layer_parent(4).unwrap(), None);
    assert_eq!(document.layer(2).unwrap().depth, 1);

    assert_eq!(document.layer_info(2).unwrap().group_layer_id, Some(7));
    assert_eq!(document.layer_info(4).unwrap().group_layer_id, None);

    // markers carry no pixels
    let marker = document.layer_pixels(3, true).unwrap();
    assert_eq!(marker.dimensions(), (0, 0));
    assert!(marker.is_empty());
}

#[test]
fn nested_groups() {
    let data = PsdBuilder::rgb(2, 2)
        .layer(LayerSpec::divider("</outer>", 3))
        .layer(LayerSpec::divider("</inner>", 3))
        .layer(solid("deep", [0, 0, 1, 1], [1, 1, 1]))
        .layer(LayerSpec::divider("inner", 2))
        .layer(LayerSpec::divider("outer", 1))
        .build();
    let document = psd_layers::load(&data).unwrap();

    assert_eq!(document.layer(2).unwrap().depth, 2);
    assert_eq!(document.layer_parent(2).unwrap(), Some(3));
    assert_eq!(document.layer_parent(3).unwrap(), Some(4));
    assert_eq!(document.layer_type(3).unwrap(), LayerType::ClosedFolder);
    assert_eq!(document.children(Some(4)).unwrap(), vec![0, 3]);
}

#[test]
fn every_layer_encoding() {
    for encoding in [Encoding::Raw, Encoding::Rle, Encoding::Zip, Encoding::ZipPrediction] {
        let data = PsdBuilder::rgb(6, 6)
            .layer(solid("a", [1, 1, 4, 5], [10, 20, 30]).encoding(encoding))
            .layer(solid("b", [0, 0, 6, 6], [40, 50, 60]).encoding(encoding))
            .build();
        let document = psd_layers::load(&data).unwrap();

        let a = document.layer_pixels(0, false).unwrap();
        assert_eq!(a.dimensions(), (4, 3));
        assert_eq!(a.pixel(3, 2), Some([30.0 / 255.0, 20.0 / 255.0, 10.0 / 255.0, 1.0]));

        let b = document.layer_pixels(1, false).unwrap();
        assert_eq!(&b.as_u8().unwrap()[..4], &[60, 50, 40, 255], "{encoding:?}");
    }
}

#[test]
fn layers_in_psb() {
    let data = PsdBuilder::rgb(3, 3)
        .psb()
        .layer(solid("a", [0, 0, 3, 3], [7, 8, 9]).encoding(Encoding::Rle).id(1))
        .layer(solid("b", [1, 1, 2, 2], [1, 2, 3]).id(2))
        .build();
    let document = psd_layers::load(&data).unwrap();

    assert_eq!(document.layer_count(), 2);
    assert_eq!(document.layer_info(1).unwrap().layer_id, Some(2));
    assert_eq!(
        document.layer_pixels(0, true).unwrap().as_u8().unwrap()[..4],
        [9, 8, 7, 255]
    );
}

#[test]
fn sixteen_bit_layer() {
    let sample = |v: u16| -> Vec<u8> { (0..4).flat_map(|_| v.to_be_bytes()).collect() };
    let layer = LayerSpec::new("deep", [0, 0, 2, 2])
        .channel(0, sample(0x1000))
        .channel(1, sample(0x2000))
        .channel(2, sample(0xFFFF))
        .encoding(Encoding::Rle);

    let data = PsdBuilder::new(2, 2, 3, 16, 3).layer(layer).build();
    let document = psd_layers::load(&data).unwrap();
    let pixels = document.layer_pixels(0, true).unwrap();

    assert_eq!(&pixels.as_u16().unwrap()[..4], &[0xFFFF, 0x2000, 0x1000, 0xFFFF]);
}

#[test]
fn channel_length_mismatch() {
    let mut broken = solid("broken", [0, 0, 2, 2], [1, 2, 3]).encoding(Encoding::Rle);
    broken.trailing = Some((0, 1));

    let data = PsdBuilder::rgb(2, 2)
        .layer(solid("fine", [0, 0, 2, 2], [1, 2, 3]))
        .layer(broken)
        .build();

    let err = psd_layers::load(&data).unwrap_err();
    match &err {
        PsdDecodeErrors::LayerDirectoryCorrupt { layer, .. } => assert_eq!(*layer, Some(1)),
        other => panic!("unexpected error {other:?}")
    }
    assert!(err.is_channel_corruption());
}

#[test]
fn divider_with_leftover_channel_bytes() {
    // the tag plus eight bytes nothing accounts for
    let mut divider = LayerSpec::divider("</Layer group>", 3);
    divider.trailing = Some((1, 8));

    let data = PsdBuilder::rgb(2, 2)
        .layer(divider)
        .layer(LayerSpec::divider("Group", 1))
        .build();

    let err = psd_layers::load(&data).unwrap_err();
    match &err {
        PsdDecodeErrors::LayerDirectoryCorrupt { layer, .. } => assert_eq!(*layer, Some(0)),
        other => panic!("unexpected error {other:?}")
    }
    assert!(err.is_channel_corruption());
}

#[test]
fn truncated_layer_records() {
    let mut data = PsdBuilder::rgb(2, 2)
        .layer(solid("a", [0, 0, 2, 2], [1, 2, 3]))
        .build();
    // header, empty colour mode data and resources, then the section and layer info lengths
    let count_at = 26 + 4 + 4 + 4 + 4;
    data[count_at..count_at + 2].copy_from_slice(&3_i16.to_be_bytes());

    assert!(matches!(
        psd_layers::load(&data),
        Err(PsdDecodeErrors::LayerDirectoryCorrupt { .. })
    ));
}

#[test]
fn inverted_rectangle_is_rejected() {
    let data = PsdBuilder::rgb(2, 2)
        .layer(LayerSpec::new("bad", [5, 0, 1, 2]))
        .build();

    let err = psd_layers::load(&data).unwrap_err();
    assert!(matches!(
        err,
        PsdDecodeErrors::LayerDirectoryCorrupt { layer: Some(0), .. }
    ));
}

#[test]
fn empty_layer_is_valid() {
    let data = PsdBuilder::rgb(2, 2)
        .layer(solid("empty", [1, 1, 1, 1], [0, 0, 0]))
        .build();
    let document = psd_layers::load(&data).unwrap();

    assert_eq!(document.layer_pixels(0, true).unwrap().dimensions(), (0, 0));
}

#[test]
fn comp_states() {
    let settings = vec![
        object(vec![
            ("enab", Item::Bool(false)),
            ("compList", Item::List(vec![Item::Long(5), Item::Long(6)]))
        ]),
        object(vec![
            (
                "Ofst",
                object(vec![("Hrzn", Item::Double(12.0)), ("Vrtc", Item::Double(-3.0))])
            ),
            ("compList", Item::List(vec![Item::Long(6)]))
        ])
    ];
    let layer = solid("c", [0, 0, 1, 1], [0, 0, 0]).block(b"shmd", comp_metadata(settings));

    let data = PsdBuilder::rgb(1, 1).layer(layer).build();
    let document = psd_layers::load(&data).unwrap();
    let states = document.layer_info(0).unwrap().comp_states;

    assert_eq!(states.len(), 2);
    assert_eq!((states[0].id, states[0].enabled), (5, false));
    assert_eq!(states[1].id, 6);
    assert_eq!((states[1].offset_x, states[1].offset_y), (12, -3));

    let record = document.layer(0).unwrap();
    assert!(record
        .additional_info
        .iter()
        .any(|i| matches!(i, Tagged::Parsed(AdditionalInfo::CompStates(_)))));
}
