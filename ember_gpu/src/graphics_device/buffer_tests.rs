use super::*;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::GraphicsDevice;

fn make_buffer(size: u64) -> std::sync::Arc<dyn Buffer> {
    let device = MockGraphicsDevice::new();
    device
        .create_buffer(&BufferDesc { size, usage: BufferUsage::GENERAL })
        .unwrap()
}

// ============================================================================
// Usage flags
// ============================================================================

#[test]
fn test_general_usage_covers_bindable_kinds() {
    let usage = BufferUsage::GENERAL;
    assert!(usage.contains(BufferUsage::VERTEX));
    assert!(usage.contains(BufferUsage::INDEX));
    assert!(usage.contains(BufferUsage::CONSTANT));
    assert!(usage.contains(BufferUsage::STRUCTURED));
    assert!(!usage.contains(BufferUsage::STAGING));
}

// ============================================================================
// Mapped access
// ============================================================================

#[test]
fn test_write_then_read() {
    let buffer = make_buffer(64);
    buffer.write(8, &[1, 2, 3, 4]).unwrap();
    assert_eq!(buffer.read(8, 4).unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn test_write_pod_floats() {
    let buffer = make_buffer(256);
    let color = [1.0f32, 0.5, 0.25, 1.0];
    buffer.write_pod(0, &color).unwrap();
    let bytes = buffer.read(0, 16).unwrap();
    let back: &[f32] = bytemuck::cast_slice(&bytes);
    assert_eq!(back, &color);
}

#[test]
fn test_write_out_of_bounds_rejected() {
    let buffer = make_buffer(16);
    assert!(buffer.write(12, &[0; 8]).is_err());
    assert!(buffer.write(u64::MAX, &[0]).is_err());
    assert!(buffer.read(16, 1).is_err());
}

#[test]
fn test_write_exactly_at_end_accepted() {
    let buffer = make_buffer(16);
    assert!(buffer.write(12, &[9; 4]).is_ok());
    assert!(buffer.read(16, 0).is_ok());
}

#[test]
fn test_mapping_address_is_stable() {
    let buffer = make_buffer(32);
    let a = buffer.mapped_ptr().unwrap();
    buffer.write(0, &[7; 32]).unwrap();
    let b = buffer.mapped_ptr().unwrap();
    assert_eq!(a, b);
}
