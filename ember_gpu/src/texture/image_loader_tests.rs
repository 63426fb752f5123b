use super::*;
use image::ImageOutputFormat;
use serial_test::serial;
use std::io::Cursor;

fn png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

// ============================================================================
// Mip counts
// ============================================================================

#[test]
fn test_mip_count() {
    assert_eq!(mip_count(1, 1), 1);
    assert_eq!(mip_count(2, 2), 2);
    assert_eq!(mip_count(256, 256), 9);
    assert_eq!(mip_count(300, 70), 9);
    assert_eq!(mip_count(1, 1024), 11);
}

#[test]
fn test_chain_dimensions() {
    let scratch = ScratchImage::from_rgba8(RgbaImage::new(16, 4));
    assert_eq!(scratch.metadata.mip_levels, 5);
    let dims: Vec<(u32, u32)> = scratch.mips.iter().map(|m| (m.width, m.height)).collect();
    assert_eq!(dims, vec![(16, 4), (8, 2), (4, 1), (2, 1), (1, 1)]);
    for mip in &scratch.mips {
        assert_eq!(mip.pixels.len(), (mip.width * mip.height * 4) as usize);
    }
}

// ============================================================================
// Decoding
// ============================================================================

#[test]
fn test_decode_png_keeps_base_level() {
    let source = RgbaImage::from_fn(4, 4, |x, y| Rgba([x as u8 * 60, y as u8 * 60, 7, 255]));
    let scratch = ScratchImage::from_memory(&png_bytes(&source)).unwrap();
    assert_eq!(scratch.metadata.format, TextureFormat::R8G8B8A8_SRGB);
    assert_eq!((scratch.metadata.width, scratch.metadata.height), (4, 4));
    assert_eq!(scratch.mips[0].pixels, source.into_raw());
}

#[test]
#[serial]
fn test_decode_garbage_fails() {
    let result = ScratchImage::from_memory(b"definitely not an image");
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
#[serial]
fn test_missing_file_fails() {
    let result = ScratchImage::from_file(Path::new("does/not/exist.png"));
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn test_uniform_color_survives_downsampling() {
    let scratch = ScratchImage::from_rgba8(RgbaImage::from_pixel(8, 8, Rgba([200, 100, 50, 255])));
    for mip in &scratch.mips {
        for px in mip.pixels.chunks(4) {
            assert!((px[0] as i32 - 200).abs() <= 1);
            assert!((px[1] as i32 - 100).abs() <= 1);
            assert!((px[2] as i32 - 50).abs() <= 1);
            assert_eq!(px[3], 255);
        }
    }
}

#[test]
fn test_black_white_average_is_linear() {
    // Half black, half white: a linear-space average is ~188 in sRGB, not 128
    let source = RgbaImage::from_fn(2, 1, |x, _| {
        if x == 0 { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) }
    });
    let scratch = ScratchImage::from_rgba8(source);
    let last = scratch.mips.last().unwrap();
    assert_eq!((last.width, last.height), (1, 1));
    assert!(last.pixels[0] > 170, "got {}", last.pixels[0]);
}
