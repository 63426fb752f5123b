/*!
# Ember GPU

Resource and frame-synchronization layer for a single-adapter, single-queue,
double-buffered renderer.

This crate provides the backend-agnostic API; backends (Vulkan) implement the
`GraphicsDevice` family of traits and plug into the same core.

## Architecture

- **GraphicsDevice**: Factory/queue trait implemented by each backend
- **ResourceFactory**: Creates mapped buffers and device-local textures
- **ViewTable**: Fixed-capacity shader-visible view table with a monotonic slot allocator
- **TextureManager**: Keyed texture registry with staged uploads and deferred staging release
- **FrameCore**: `pre_draw`/`post_draw` frame bracketing, fence wait and frame pacing

A frame loop looks like:

```ignore
frame.pre_draw()?;
views.bind(frame.command_list())?;
// ... record draws on frame.command_list() ...
frame.post_draw()?;
textures.release_intermediate_resources();
```
*/

// Internal modules
mod error;
mod engine;
mod config;
pub mod log;
pub mod graphics_device;
pub mod utils;
pub mod resource;
pub mod descriptor;
pub mod texture;
pub mod frame;

// Main ember namespace module
pub mod ember {
    // Error types
    pub use crate::error::{Error, Result};

    // Logger slot
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::{Config, DebugSeverity};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, FileLogger};
    }

    // Device traits and resource types implemented by backends
    pub mod render {
        pub use crate::graphics_device::*;
    }

    // Buffer/texture factory and barrier state tracking
    pub mod resource {
        pub use crate::resource::*;
    }

    // Shader-visible view table
    pub mod descriptor {
        pub use crate::descriptor::*;
    }

    // Texture loading and registry
    pub mod texture {
        pub use crate::texture::*;
    }

    // Frame bracketing and pacing
    pub mod frame {
        pub use crate::frame::*;
    }
}
