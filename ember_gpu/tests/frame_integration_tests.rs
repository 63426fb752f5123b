//! Integration tests for the frame core, view table and texture manager on Vulkan
//!
//! These tests require a GPU and are marked with #[ignore].
//! Run with: cargo test --test frame_integration_tests -- --ignored


use ember_gpu::ember::descriptor::ViewTable;
use ember_gpu::ember::frame::FrameCore;
use ember_gpu::ember::render::{Buffer, Fence, ResourceState};
use ember_gpu::ember::texture::TextureManager;
use ember_gpu::ember::{Config, Error};
use gpu_test_utils::{get_test_device, test_config};
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use serial_test::serial;
use std::io::Cursor;
use std::time::{Duration, Instant};

fn png(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8 ^ seed, y as u8, seed, 255]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

// ============================================================================
// FRAME LOOP
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_frames_complete_on_gpu() {
    let device = get_test_device();
    let mut frame = FrameCore::new(device, &test_config()).unwrap();

    for expected in 1..=5u64 {
        frame.pre_draw().unwrap();
        frame.post_draw().unwrap();

        let state = frame.frame_state();
        assert_eq!(state.fence_value, expected);
        assert!(state.completed_value >= expected);
        assert!(frame.fence().completed_value().unwrap() >= expected);
    }
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_back_buffers_alternate() {
    let device = get_test_device();
    let mut frame = FrameCore::new(device, &test_config()).unwrap();

    let mut indices = Vec::new();
    for _ in 0..4 {
        frame.pre_draw().unwrap();
        indices.push(frame.frame_state().back_buffer_index);
        frame.post_draw().unwrap();
    }
    assert_ne!(indices[0], indices[1]);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_frame_pacing() {
    let device = get_test_device();
    let config = Config { target_frame_rate: Some(60), ..test_config() };
    let mut frame = FrameCore::new(device, &config).unwrap();

    frame.pre_draw().unwrap();
    frame.post_draw().unwrap();
    let start = Instant::now();
    frame.pre_draw().unwrap();
    frame.post_draw().unwrap();
    assert!(start.elapsed() >= Duration::from_secs_f64(1.0 / 65.0));
}

// ============================================================================
// BUFFERS AND VIEWS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_buffer_mapping_round_trip() {
    let device = get_test_device();
    let frame = FrameCore::new(device, &test_config()).unwrap();

    let buffer = frame.factory().create_buffer(256).unwrap();
    let pattern: Vec<u8> = (0..=255u8).rev().collect();
    buffer.write(0, &pattern).unwrap();
    assert_eq!(buffer.read(0, 256).unwrap(), pattern);
    assert_eq!(buffer.mapped_ptr().unwrap(), buffer.mapped_ptr().unwrap());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_view_table_exhaustion() {
    let device = get_test_device();
    let mut views = ViewTable::new(device, 4, 0).unwrap();
    let slots: Vec<u32> = (0..4).map(|_| views.allocate().unwrap()).collect();
    assert_eq!(slots, vec![0, 1, 2, 3]);
    assert_eq!(views.allocate(), Err(Error::ViewSlotsExhausted { capacity: 4 }));
}

// ============================================================================
// TEXTURE UPLOADS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_texture_upload_and_release() {
    let device = get_test_device();
    let mut frame = FrameCore::new(device.clone(), &test_config()).unwrap();
    let mut views = ViewTable::new(device, 16, 0).unwrap();
    let mut textures = TextureManager::new();

    textures
        .load_texture_from_memory(&mut frame, &mut views, "a", &png(64, 32, 1))
        .unwrap();
    textures
        .load_texture_from_memory(&mut frame, &mut views, "b", &png(16, 16, 2))
        .unwrap();
    textures
        .load_texture_from_memory(&mut frame, &mut views, "a", &png(64, 32, 1))
        .unwrap();

    assert_eq!(textures.len(), 2);
    assert_eq!(textures.view_index("b").unwrap(), textures.view_index("a").unwrap() + 1);
    assert_eq!(textures.metadata("a").unwrap().mip_levels, 7);
    assert_eq!(textures.pending_uploads(), 2);

    frame.pre_draw().unwrap();
    views.bind(frame.command_list()).unwrap();
    frame.post_draw().unwrap();
    textures.release_intermediate_resources();
    assert_eq!(textures.pending_uploads(), 0);

    let texture = textures.texture("a").unwrap();
    assert_eq!(frame.resource_state(texture.as_ref()), Some(ResourceState::ShaderResource));

    // Texture stays usable in later frames
    for _ in 0..2 {
        frame.pre_draw().unwrap();
        views.bind(frame.command_list()).unwrap();
        views
            .set_descriptor_table(frame.command_list(), 0, textures.view_index("a").unwrap())
            .unwrap();
        frame.post_draw().unwrap();
    }

    frame.flush().unwrap();
    textures.finalize(&mut frame);
}
