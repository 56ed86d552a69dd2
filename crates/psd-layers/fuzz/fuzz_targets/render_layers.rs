#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(document) = psd_layers::load(data) else {
        return;
    };
    for index in 0..document.layer_count() {
        let _ = document.layer_pixels(index, true);
        let _ = document.layer_mask_pixels(index);
        let _ = document.layer_info(index);
    }
    let _ = document.composite_pixels();
});
