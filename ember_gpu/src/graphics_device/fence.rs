/// Fence trait - monotonically increasing GPU completion counter

use crate::error::Result;

/// Completion fence
///
/// The queue advances the value through `GraphicsDevice::signal`; the CPU
/// observes it with `completed_value` or blocks with `wait`.
pub trait Fence: Send + Sync {
    /// Last value the GPU has reached
    fn completed_value(&self) -> Result<u64>;

    /// Block the calling thread until the fence reaches `value`
    fn wait(&self, value: u64) -> Result<()>;
}
