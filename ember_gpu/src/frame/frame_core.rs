/// Frame core - owns presentation, the command list and CPU/GPU synchronization
///
/// One command list is recorded, submitted and reused every frame. After
/// submission `post_draw` blocks until the fence confirms the GPU finished
/// that frame, so at most one frame is ever in flight and reopening the list
/// can never race the GPU.

use std::sync::Arc;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::FramePacer;
use crate::graphics_device::{
    Buffer, CommandList, Fence, GraphicsDevice, Rect2D, RenderingDesc, ResourceState,
    SubresourceFootprint, Swapchain, SwapchainDesc, Texture, Viewport,
};
use crate::resource::{ResourceFactory, ResourceStateTracker};
use crate::{engine_debug, engine_error, engine_info, engine_warn};

const BACK_BUFFER_COUNT: u32 = 2;
const FAR_DEPTH: f32 = 1.0;

/// Per-frame synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameState {
    /// Back buffer rendered this frame (0 or 1)
    pub back_buffer_index: u32,
    /// Last value signaled on the fence (one per submitted frame)
    pub fence_value: u64,
    /// Fence value last observed as completed
    pub completed_value: u64,
}

pub struct FrameCore {
    device: Arc<dyn GraphicsDevice>,
    factory: ResourceFactory,
    swapchain: Box<dyn Swapchain>,
    back_buffers: Vec<Arc<dyn Texture>>,
    depth: Arc<dyn Texture>,
    command_list: Box<dyn CommandList>,
    fence: Arc<dyn Fence>,
    states: ResourceStateTracker,
    viewport: Viewport,
    scissor: Rect2D,
    clear_color: [f32; 4],
    frame: FrameState,
    in_frame: bool,
    pacer: Option<FramePacer>,
}

impl FrameCore {
    /// Create the swapchain, depth buffer, command list and fence
    ///
    /// The command list is left open so resources can be uploaded before
    /// the first frame.
    pub fn new(device: Arc<dyn GraphicsDevice>, config: &Config) -> Result<Self> {
        config.validate().map_err(|e| fatal("validate configuration", e))?;

        engine_info!("ember::FrameCore", "Adapter: {}", device.adapter_name());

        let factory = ResourceFactory::new(device.clone());
        let mut states = ResourceStateTracker::new();

        let swapchain = device
            .create_swapchain(&SwapchainDesc {
                width: config.width,
                height: config.height,
                buffer_count: BACK_BUFFER_COUNT,
                format: config.back_buffer_format,
            })
            .map_err(|e| fatal("create swapchain", e))?;

        // The surface may grant a different extent than requested
        let (width, height) = (swapchain.width(), swapchain.height());
        if (width, height) != (config.width, config.height) {
            engine_warn!(
                "ember::FrameCore",
                "Swapchain granted {}x{} instead of {}x{}, sizing the frame to the swapchain",
                width, height, config.width, config.height
            );
        }

        let back_buffers = (0..swapchain.buffer_count())
            .map(|i| swapchain.back_buffer(i))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| fatal("query back buffers", e))?;
        for back_buffer in &back_buffers {
            states.register(back_buffer.as_ref(), ResourceState::Present);
        }

        let depth = factory
            .create_depth_stencil(width, height, config.depth_format)
            .map_err(|e| fatal("create depth buffer", e))?;
        states.register(depth.as_ref(), ResourceState::DepthWrite);

        let mut command_list = device
            .create_command_list()
            .map_err(|e| fatal("create command list", e))?;
        command_list.begin().map_err(|e| fatal("open command list", e))?;

        let fence = device.create_fence(0).map_err(|e| fatal("create fence", e))?;

        engine_info!(
            "ember::FrameCore",
            "Frame core ready: {}x{}, {} back buffers ({:?}), depth {:?}, pacing {}",
            width,
            height,
            back_buffers.len(),
            config.back_buffer_format,
            config.depth_format,
            match config.target_frame_rate {
                Some(fps) => format!("{} fps", fps),
                None => "off".to_string(),
            }
        );

        Ok(Self {
            device,
            factory,
            swapchain,
            back_buffers,
            depth,
            command_list,
            fence,
            states,
            viewport: Viewport::full(width, height),
            scissor: Rect2D::full(width, height),
            clear_color: config.clear_color,
            frame: FrameState::default(),
            in_frame: false,
            pacer: config.target_frame_rate.map(FramePacer::new),
        })
    }

    /// Start a frame: acquire the back buffer, bind and clear the attachments
    pub fn pre_draw(&mut self) -> Result<()> {
        if self.in_frame {
            return Err(fatal("pre_draw", Error::InvalidState("pre_draw called twice".to_string())));
        }

        let index = self
            .swapchain
            .current_back_buffer_index()
            .map_err(|e| fatal("acquire back buffer", e))?;
        self.frame.back_buffer_index = index;
        let back_buffer = self.back_buffer(index)?;

        self.states
            .transition(
                self.command_list.as_mut(),
                back_buffer.as_ref(),
                ResourceState::Present,
                ResourceState::RenderTarget,
            )
            .map_err(|e| fatal("back buffer to render target", e))?;

        self.command_list
            .begin_rendering(&RenderingDesc {
                color: back_buffer.as_ref(),
                depth: Some(self.depth.as_ref()),
                clear_color: Some(self.clear_color),
                clear_depth: Some(FAR_DEPTH),
            })
            .map_err(|e| fatal("bind attachments", e))?;
        self.command_list
            .set_viewport(self.viewport)
            .map_err(|e| fatal("set viewport", e))?;
        self.command_list
            .set_scissor(self.scissor)
            .map_err(|e| fatal("set scissor", e))?;

        self.in_frame = true;
        Ok(())
    }

    /// Finish a frame: submit, present, wait for the GPU, pace, reopen the list
    pub fn post_draw(&mut self) -> Result<()> {
        if !self.in_frame {
            return Err(fatal("post_draw", Error::InvalidState("post_draw without pre_draw".to_string())));
        }
        self.in_frame = false;

        let back_buffer = self.back_buffer(self.frame.back_buffer_index)?;

        self.command_list
            .end_rendering()
            .map_err(|e| fatal("unbind attachments", e))?;
        self.states
            .transition(
                self.command_list.as_mut(),
                back_buffer.as_ref(),
                ResourceState::RenderTarget,
                ResourceState::Present,
            )
            .map_err(|e| fatal("back buffer to present", e))?;
        self.command_list.end().map_err(|e| fatal("close command list", e))?;

        self.device
            .execute(self.command_list.as_ref(), Some(self.swapchain.as_ref()))
            .map_err(|e| fatal("submit", e))?;
        self.swapchain.present().map_err(|e| fatal("present", e))?;

        self.signal_and_wait()?;

        if let Some(pacer) = &mut self.pacer {
            pacer.pace();
        }

        self.command_list.begin().map_err(|e| fatal("reopen command list", e))
    }

    /// Submit whatever is recorded outside a frame and wait for it (startup uploads, teardown)
    pub fn flush(&mut self) -> Result<()> {
        if self.in_frame {
            return Err(fatal("flush", Error::InvalidState("flush inside a frame".to_string())));
        }
        self.command_list.end().map_err(|e| fatal("close command list", e))?;
        self.device
            .execute(self.command_list.as_ref(), None)
            .map_err(|e| fatal("submit", e))?;
        self.signal_and_wait()?;
        self.command_list.begin().map_err(|e| fatal("reopen command list", e))?;
        engine_debug!("ember::FrameCore", "Flushed at fence value {}", self.frame.fence_value);
        Ok(())
    }

    /// Record a full-chain buffer-to-texture copy and leave `texture` shader-readable
    ///
    /// `texture` must be freshly created in `CopyDest`; `staging` must stay
    /// alive until the submission carrying this copy has completed.
    pub fn record_texture_upload(
        &mut self,
        staging: &dyn Buffer,
        texture: &dyn Texture,
        footprints: &[SubresourceFootprint],
    ) -> Result<()> {
        if !self.command_list.is_recording() {
            return Err(fatal("record upload", Error::InvalidState("command list is closed".to_string())));
        }
        self.states.register(texture, ResourceState::CopyDest);
        self.command_list.copy_buffer_to_texture(staging, texture, footprints)?;
        self.states.transition(
            self.command_list.as_mut(),
            texture,
            ResourceState::CopyDest,
            ResourceState::ShaderResource,
        )
    }

    /// Record a tracked state transition on the open command list
    pub fn transition(&mut self, texture: &dyn Texture, before: ResourceState, after: ResourceState) -> Result<()> {
        self.states.transition(self.command_list.as_mut(), texture, before, after)
    }

    /// Stop tracking the state of a texture that is being dropped
    pub fn forget(&mut self, texture: &dyn Texture) {
        self.states.forget(texture);
    }

    /// Command list currently recording (drawing between `pre_draw` and `post_draw`)
    pub fn command_list(&mut self) -> &mut dyn CommandList {
        self.command_list.as_mut()
    }

    pub fn factory(&self) -> &ResourceFactory {
        &self.factory
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn frame_state(&self) -> FrameState {
        self.frame
    }

    pub fn fence(&self) -> &Arc<dyn Fence> {
        &self.fence
    }

    /// Whether `pre_draw` has been called without the matching `post_draw`
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    pub fn current_back_buffer(&self) -> Result<Arc<dyn Texture>> {
        self.back_buffer(self.frame.back_buffer_index)
    }

    pub fn depth_buffer(&self) -> &Arc<dyn Texture> {
        &self.depth
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scissor(&self) -> Rect2D {
        self.scissor
    }

    pub fn resource_state(&self, texture: &dyn Texture) -> Option<ResourceState> {
        self.states.state_of(texture)
    }

    fn back_buffer(&self, index: u32) -> Result<Arc<dyn Texture>> {
        self.back_buffers
            .get(index as usize)
            .cloned()
            .ok_or_else(|| fatal("back buffer", Error::InvalidState(format!("no back buffer {}", index))))
    }

    fn signal_and_wait(&mut self) -> Result<()> {
        self.frame.fence_value += 1;
        let target = self.frame.fence_value;
        self.device
            .signal(self.fence.as_ref(), target)
            .map_err(|e| fatal("signal fence", e))?;

        let mut completed = self.fence.completed_value().map_err(|e| fatal("read fence", e))?;
        if completed < target {
            self.fence.wait(target).map_err(|e| fatal("wait fence", e))?;
            completed = self.fence.completed_value().map_err(|e| fatal("read fence", e))?;
        }
        self.frame.completed_value = completed;
        Ok(())
    }
}

impl Drop for FrameCore {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            engine_error!("ember::FrameCore", "wait_idle on teardown failed: {}", e);
        }
    }
}

fn fatal(step: &str, error: Error) -> Error {
    engine_error!("ember::FrameCore", "{} failed: {}", step, error);
    error
}

#[cfg(test)]
#[path = "frame_core_tests.rs"]
mod tests;
