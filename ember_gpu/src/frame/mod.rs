/// Frame module - frame bracketing, fence synchronization and pacing

pub mod frame_core;
pub mod frame_pacer;

pub use frame_core::{FrameCore, FrameState};
pub use frame_pacer::FramePacer;
