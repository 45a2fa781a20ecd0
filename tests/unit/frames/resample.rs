use std::io::Cursor;

use image::{ImageFormat, Rgba};

use super::*;

fn png_source(width: u32, height: u32) -> FrameSource {
    let img = RgbaImage::from_pixel(width, height, Rgba([90, 90, 220, 255]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    FrameSource::from_bytes(buf).unwrap()
}

#[test]
fn fit_within_bounds_longer_side() {
    assert_eq!(fit_within(64, 32, 32), (32, 16));
    assert_eq!(fit_within(32, 64, 32), (16, 32));
    assert_eq!(fit_within(100, 100, 10), (10, 10));
    assert_eq!(fit_within(1000, 1, 10), (10, 1));
}

#[test]
fn fit_within_never_upscales() {
    assert_eq!(fit_within(20, 10, 64), (20, 10));
    assert_eq!(fit_within(64, 64, 64), (64, 64));
}

#[test]
fn absent_max_keeps_source_dimensions() {
    let source = png_source(37, 21);
    let frame = resample(&source, 0, None).unwrap();
    assert_eq!(frame.dimensions(), (37, 21));
}

#[test]
fn max_pixel_size_downscales_preserving_aspect() {
    let source = png_source(64, 32);
    let frame = resample(&source, 0, Some(16)).unwrap();
    assert_eq!(frame.dimensions(), (16, 8));
}

#[test]
fn resampling_twice_yields_identical_dimensions() {
    let source = png_source(90, 45);
    let a = resample(&source, 0, Some(30)).unwrap();
    let b = resample(&source, 0, Some(30)).unwrap();
    assert_eq!(a.dimensions(), b.dimensions());
    assert_eq!(a, b);
}

#[test]
fn out_of_range_index_is_skipped() {
    let source = png_source(4, 4);
    assert!(resample(&source, 1, None).is_none());
}

#[test]
fn debug_output_omits_pixels() {
    let frame = DecodedFrame::new(RgbaImage::new(3, 2));
    assert_eq!(
        format!("{frame:?}"),
        "DecodedFrame { width: 3, height: 2 }"
    );
}

#[test]
fn wider_frame_is_scaled_into_the_canvas() {
    let blue = DecodedFrame::new(RgbaImage::from_pixel(128, 32, image::Rgba([0, 0, 255, 255])));
    let fitted = fit_onto_canvas(blue, 64, 64);
    assert_eq!(fitted.dimensions(), (64, 64));
    // 64x16 band centered vertically, spanning the full width.
    assert_eq!(fitted.image().get_pixel(0, 24).0, [0, 0, 255, 255]);
    assert_eq!(fitted.image().get_pixel(63, 39).0, [0, 0, 255, 255]);
    assert_eq!(fitted.image().get_pixel(32, 23).0[3], 0);
    assert_eq!(fitted.image().get_pixel(32, 40).0[3], 0);
}

#[test]
fn smaller_frame_is_centered_unscaled() {
    let green = DecodedFrame::new(RgbaImage::from_pixel(16, 16, image::Rgba([0, 255, 0, 255])));
    let fitted = fit_onto_canvas(green, 64, 64);
    assert_eq!(fitted.dimensions(), (64, 64));
    assert_eq!(fitted.image().get_pixel(24, 24).0, [0, 255, 0, 255]);
    assert_eq!(fitted.image().get_pixel(39, 39).0, [0, 255, 0, 255]);
    assert_eq!(fitted.image().get_pixel(23, 23).0[3], 0);
}

#[test]
fn matching_frame_is_returned_as_is() {
    let frame = DecodedFrame::new(RgbaImage::from_pixel(5, 3, image::Rgba([1, 2, 3, 4])));
    assert_eq!(fit_onto_canvas(frame.clone(), 5, 3), frame);
}
