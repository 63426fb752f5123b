//! Configuration shared by the device backend and the frame core

use crate::error::{Error, Result};
use crate::graphics_device::TextureFormat;

/// Which backend validation messages are forwarded to the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything including info/verbose
    All,
}

/// Ember configuration
///
/// # Example
///
/// ```
/// use ember_gpu::ember::Config;
///
/// let config = Config {
///     width: 800,
///     height: 600,
///     target_frame_rate: None,
///     ..Config::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,
    /// Application version reported to the driver
    pub app_version: (u32, u32, u32),
    /// Enable backend validation layers
    pub enable_validation: bool,
    /// Validation message filter
    pub debug_severity: DebugSeverity,
    /// Output resolution (back buffers, depth buffer, viewport, scissor)
    pub width: u32,
    pub height: u32,
    /// Back buffer pixel format
    pub back_buffer_format: TextureFormat,
    /// Depth buffer pixel format
    pub depth_format: TextureFormat,
    /// Background color written by every PreDraw
    pub clear_color: [f32; 4],
    /// Frame pacing target in frames per second (None disables pacing)
    pub target_frame_rate: Option<u32>,
    /// Number of slots in the shader-visible view table
    pub view_table_capacity: u32,
    /// Low slots kept out of the allocator (debug overlay views)
    pub reserved_view_slots: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Ember Application".to_string(),
            app_version: (1, 0, 0),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            width: 1280,
            height: 720,
            back_buffer_format: TextureFormat::B8G8R8A8_SRGB,
            depth_format: TextureFormat::D32_FLOAT,
            clear_color: [0.1, 0.25, 0.5, 1.0],
            target_frame_rate: Some(60),
            view_table_capacity: 512,
            reserved_view_slots: 0,
        }
    }
}

impl Config {
    /// Reject configurations no device could satisfy
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InitializationFailed(format!(
                "output resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.depth_format.is_depth() {
            return Err(Error::InitializationFailed(format!(
                "depth format {:?} is not a depth format",
                self.depth_format
            )));
        }
        if self.back_buffer_format.is_depth() {
            return Err(Error::InitializationFailed(format!(
                "back buffer format {:?} is a depth format",
                self.back_buffer_format
            )));
        }
        if self.view_table_capacity == 0 {
            return Err(Error::InitializationFailed(
                "view table capacity must be at least 1".to_string(),
            ));
        }
        if self.reserved_view_slots >= self.view_table_capacity {
            return Err(Error::InitializationFailed(format!(
                "{} reserved view slots leave nothing in a table of {}",
                self.reserved_view_slots, self.view_table_capacity
            )));
        }
        if self.target_frame_rate == Some(0) {
            return Err(Error::InitializationFailed(
                "target frame rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
