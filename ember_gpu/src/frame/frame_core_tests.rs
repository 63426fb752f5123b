use super::*;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use std::time::{Duration, Instant};

fn unpaced() -> Config {
    Config { target_frame_rate: None, ..Config::default() }
}

fn setup(latency: Duration, config: &Config) -> (Arc<MockGraphicsDevice>, FrameCore) {
    let device = Arc::new(MockGraphicsDevice::with_latency(latency));
    let core = FrameCore::new(device.clone(), config).unwrap();
    (device, core)
}

// ============================================================================
// Initialization
// ============================================================================

#[test]
fn test_init_leaves_list_open() {
    let (device, mut core) = setup(Duration::ZERO, &unpaced());
    assert!(core.command_list().is_recording());
    assert!(!core.in_frame());
    assert_eq!(core.frame_state(), FrameState::default());
    assert!(device.state().submissions.is_empty());
}

#[test]
fn test_init_creates_depth_at_output_size() {
    let config = Config { width: 640, height: 480, ..unpaced() };
    let (_device, core) = setup(Duration::ZERO, &config);
    let depth = core.depth_buffer();
    assert_eq!((depth.info().width, depth.info().height), (640, 480));
    assert_eq!(depth.info().format, config.depth_format);
    assert_eq!(core.viewport(), Viewport::full(640, 480));
    assert_eq!(core.scissor(), Rect2D::full(640, 480));
}

#[test]
fn test_frame_sized_to_granted_swapchain_extent() {
    let device = Arc::new(MockGraphicsDevice::new());
    device.state().granted_extent = Some((1270, 710));
    let config = Config { width: 1280, height: 720, ..unpaced() };
    let mut core = FrameCore::new(device.clone(), &config).unwrap();

    let back_buffer = core.current_back_buffer().unwrap();
    assert_eq!((back_buffer.info().width, back_buffer.info().height), (1270, 710));
    let depth = core.depth_buffer();
    assert_eq!((depth.info().width, depth.info().height), (1270, 710));
    assert_eq!(core.viewport(), Viewport::full(1270, 710));
    assert_eq!(core.scissor(), Rect2D::full(1270, 710));

    core.pre_draw().unwrap();
    core.post_draw().unwrap();
    let frame = &device.state().submissions[0];
    assert!(frame.contains(&"viewport 1270x710".to_string()));
    assert!(frame.contains(&"scissor 1270x710".to_string()));
}

#[test]
fn test_invalid_config_rejected() {
    let device = Arc::new(MockGraphicsDevice::new());
    let config = Config { width: 0, ..unpaced() };
    assert!(FrameCore::new(device, &config).is_err());
}

#[test]
fn test_back_buffers_start_presentable() {
    let (_device, core) = setup(Duration::ZERO, &unpaced());
    let back_buffer = core.current_back_buffer().unwrap();
    assert_eq!(core.resource_state(back_buffer.as_ref()), Some(ResourceState::Present));
}

// ============================================================================
// Frame bracketing
// ============================================================================

#[test]
fn test_frame_records_commands_in_order() {
    let (device, mut core) = setup(Duration::ZERO, &unpaced());
    core.pre_draw().unwrap();
    core.command_list().draw(3, 0).unwrap();
    core.post_draw().unwrap();

    let state = device.state();
    assert_eq!(state.submissions.len(), 1);
    let log = &state.submissions[0];
    assert_eq!(log.len(), 7);
    assert_eq!(log[0], "barrier Present->RenderTarget");
    assert!(log[1].starts_with("begin_rendering"));
    assert!(log[1].ends_with("clear_color=Some([0.1, 0.25, 0.5, 1.0]) clear_depth=Some(1.0)"));
    assert_eq!(log[2], "viewport 1280x720");
    assert_eq!(log[3], "scissor 1280x720");
    assert_eq!(log[4], "draw 3 first=0");
    assert_eq!(log[5], "end_rendering");
    assert_eq!(log[6], "barrier RenderTarget->Present");
    assert_eq!(state.presents, 1);
}

#[test]
fn test_list_reopened_after_post_draw() {
    let (_device, mut core) = setup(Duration::ZERO, &unpaced());
    core.pre_draw().unwrap();
    core.post_draw().unwrap();
    assert!(core.command_list().is_recording());
    assert!(!core.in_frame());
}

#[test]
fn test_back_buffer_alternates() {
    let (_device, mut core) = setup(Duration::ZERO, &unpaced());
    let mut indices = Vec::new();
    for _ in 0..4 {
        core.pre_draw().unwrap();
        indices.push(core.frame_state().back_buffer_index);
        core.post_draw().unwrap();
    }
    assert_eq!(indices, vec![0, 1, 0, 1]);
}

#[test]
fn test_back_buffer_returns_to_present() {
    let (_device, mut core) = setup(Duration::ZERO, &unpaced());
    core.pre_draw().unwrap();
    let back_buffer = core.current_back_buffer().unwrap();
    assert_eq!(core.resource_state(back_buffer.as_ref()), Some(ResourceState::RenderTarget));
    core.post_draw().unwrap();
    assert_eq!(core.resource_state(back_buffer.as_ref()), Some(ResourceState::Present));
}

#[test]
fn test_post_draw_without_pre_draw_fails() {
    let (_device, mut core) = setup(Duration::ZERO, &unpaced());
    assert!(matches!(core.post_draw(), Err(Error::InvalidState(_))));
}

#[test]
fn test_double_pre_draw_fails() {
    let (_device, mut core) = setup(Duration::ZERO, &unpaced());
    core.pre_draw().unwrap();
    assert!(matches!(core.pre_draw(), Err(Error::InvalidState(_))));
}

// ============================================================================
// Fence synchronization
// ============================================================================

#[test]
fn test_fence_value_increments_once_per_frame() {
    let (device, mut core) = setup(Duration::ZERO, &unpaced());
    for _ in 0..3 {
        core.pre_draw().unwrap();
        core.post_draw().unwrap();
    }
    assert_eq!(core.frame_state().fence_value, 3);
    assert_eq!(device.state().signals, vec![1, 2, 3]);
}

#[test]
fn test_post_draw_waits_for_gpu() {
    let latency = Duration::from_millis(15);
    let (_device, mut core) = setup(latency, &unpaced());
    core.pre_draw().unwrap();
    let start = Instant::now();
    core.post_draw().unwrap();

    assert!(start.elapsed() >= latency);
    let frame = core.frame_state();
    assert_eq!(frame.fence_value, 1);
    assert!(frame.completed_value >= frame.fence_value);
    assert!(core.fence().completed_value().unwrap() >= frame.fence_value);
}

#[test]
fn test_no_frame_runs_ahead_of_gpu() {
    let (_device, mut core) = setup(Duration::from_millis(3), &unpaced());
    for _ in 0..5 {
        core.pre_draw().unwrap();
        // Recording only starts once the previous frame has completed
        assert_eq!(
            core.fence().completed_value().unwrap(),
            core.frame_state().fence_value
        );
        core.post_draw().unwrap();
    }
}

#[test]
fn test_flush_submits_without_presenting() {
    let (device, mut core) = setup(Duration::from_millis(2), &unpaced());
    core.flush().unwrap();
    assert_eq!(core.frame_state().fence_value, 1);
    assert_eq!(core.frame_state().completed_value, 1);
    assert!(core.command_list().is_recording());
    let state = device.state();
    assert_eq!(state.submissions.len(), 1);
    assert_eq!(state.presents, 0);
}

#[test]
fn test_flush_inside_frame_fails() {
    let (_device, mut core) = setup(Duration::ZERO, &unpaced());
    core.pre_draw().unwrap();
    assert!(core.flush().is_err());
}

// ============================================================================
// Pacing
// ============================================================================

#[test]
fn test_consecutive_frames_are_paced() {
    let config = Config::default();
    let target = Duration::from_secs_f64(1.0 / config.target_frame_rate.unwrap() as f64);
    let (_device, mut core) = setup(Duration::ZERO, &config);
    core.pre_draw().unwrap();
    core.post_draw().unwrap();

    let start = Instant::now();
    core.pre_draw().unwrap();
    core.post_draw().unwrap();
    assert!(start.elapsed() >= target - Duration::from_millis(1));
}
