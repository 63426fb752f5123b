/// Mock graphics device for unit tests (no GPU required)
///
/// Resources are plain CPU memory. Executed command lists are replayed:
/// recorded buffer-to-texture copies land in the mock textures' mip data,
/// and every submission's command log is kept for inspection. Fence signals
/// complete after a configurable latency on a background thread, which lets
/// tests observe CPU/GPU synchronization.

use std::cell::UnsafeCell;
use std::ptr::NonNull;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread::JoinHandle;
use std::time::Duration;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::{
    Buffer, BufferDesc, BufferUsage, BufferViewDesc, CommandList, CopyAlignment,
    CpuDescriptorHandle, DescriptorHeap, Fence, GpuDescriptorHandle, GraphicsDevice, IndexType,
    Pipeline, PipelineDesc, Rect2D, RenderingDesc, ResourceBarrier, ResourceId,
    SubresourceFootprint, Swapchain, SwapchainDesc, Texture, TextureDesc, TextureFormat,
    TextureInfo, TextureUsage, TextureViewDesc, Viewport,
};
use crate::engine_bail;

/// Copy alignment reported by the mock (same values as a D3D12 device)
pub const MOCK_COPY_ALIGNMENT: CopyAlignment = CopyAlignment { row_pitch: 256, placement: 512 };

const MOCK_HEAP_CPU_START: u64 = 0x1000_0000;
const MOCK_HEAP_GPU_START: u64 = 0x7f00_0000_0000;
const MOCK_HEAP_STRIDE: u64 = 32;
const FENCE_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Shared state
// ============================================================================

/// View written into a mock descriptor heap slot
#[derive(Debug, Clone, PartialEq)]
pub enum MockView {
    Texture { texture: ResourceId, desc: TextureViewDesc },
    Buffer { buffer: ResourceId, desc: BufferViewDesc },
}

/// Everything the mock device has seen, shared by all mock objects
#[derive(Default)]
pub struct MockState {
    pub buffers: FxHashMap<ResourceId, Weak<MockBuffer>>,
    pub textures: FxHashMap<ResourceId, Weak<MockTexture>>,
    /// Views by (heap, slot)
    pub views: FxHashMap<(ResourceId, u32), MockView>,
    /// Command log of every executed list, in submission order
    pub submissions: Vec<Vec<String>>,
    /// Values passed to `signal`, in order
    pub signals: Vec<u64>,
    pub presents: u32,
    pub texture_descs: Vec<TextureDesc>,
    pub buffer_descs: Vec<BufferDesc>,
    /// Make every buffer/texture creation fail with `OutOfMemory`
    pub fail_allocations: bool,
    /// Extent handed out by `create_swapchain` instead of the requested one
    pub granted_extent: Option<(u32, u32)>,
    pending_signals: Vec<JoinHandle<()>>,
}

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    id: ResourceId,
    usage: BufferUsage,
    storage: UnsafeCell<Vec<u8>>,
}

// Writes go through the mapped pointer exactly like on a real upload heap;
// callers are responsible for not racing on the same bytes.
unsafe impl Sync for MockBuffer {}

impl MockBuffer {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            id: ResourceId::new(),
            usage,
            storage: UnsafeCell::new(vec![0u8; size as usize]),
        }
    }
}

impl Buffer for MockBuffer {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn size(&self) -> u64 {
        // SAFETY: the Vec is never resized, only its bytes are written
        unsafe { (*self.storage.get()).len() as u64 }
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn mapped_ptr(&self) -> Result<NonNull<u8>> {
        // SAFETY: see `size`
        let ptr = unsafe { (*self.storage.get()).as_mut_ptr() };
        NonNull::new(ptr).ok_or_else(|| Error::BackendError("null mock mapping".to_string()))
    }
}

// ============================================================================
// Mock Texture
// ============================================================================

pub struct MockTexture {
    id: ResourceId,
    info: TextureInfo,
    /// Tightly packed pixels of each mip
    mips: Mutex<Vec<Vec<u8>>>,
}

impl MockTexture {
    pub fn new(info: TextureInfo) -> Self {
        let bpp = info.format.bytes_per_pixel() as usize;
        let mips = (0..info.mip_levels)
            .map(|mip| {
                let w = (info.width >> mip).max(1) as usize;
                let h = (info.height >> mip).max(1) as usize;
                vec![0u8; w * h * bpp]
            })
            .collect();
        Self { id: ResourceId::new(), info, mips: Mutex::new(mips) }
    }

    /// Current contents of `mip`
    pub fn mip_data(&self, mip: u32) -> Vec<u8> {
        self.mips.lock().unwrap()[mip as usize].clone()
    }
}

impl Texture for MockTexture {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

// ============================================================================
// Mock Descriptor Heap
// ============================================================================

pub struct MockDescriptorHeap {
    pub id: ResourceId,
    capacity: u32,
}

impl MockDescriptorHeap {
    fn slot_of(&self, handle: CpuDescriptorHandle) -> Result<u32> {
        let rel = handle.ptr.wrapping_sub(MOCK_HEAP_CPU_START);
        if handle.ptr < MOCK_HEAP_CPU_START || rel % MOCK_HEAP_STRIDE != 0 {
            engine_bail!("ember::mock", "handle {:#x} is not a slot of this heap", handle.ptr);
        }
        let slot = rel / MOCK_HEAP_STRIDE;
        if slot >= self.capacity as u64 {
            engine_bail!("ember::mock", "slot {} beyond heap capacity {}", slot, self.capacity);
        }
        Ok(slot as u32)
    }
}

/// Id of a heap created by the mock device (keys `MockState::views`)
pub fn mock_heap_id(heap: &dyn DescriptorHeap) -> ResourceId {
    unsafe { &*(heap as *const dyn DescriptorHeap as *const MockDescriptorHeap) }.id
}

impl DescriptorHeap for MockDescriptorHeap {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn stride(&self) -> u64 {
        MOCK_HEAP_STRIDE
    }

    fn cpu_start(&self) -> CpuDescriptorHandle {
        CpuDescriptorHandle { ptr: MOCK_HEAP_CPU_START }
    }

    fn gpu_start(&self) -> GpuDescriptorHandle {
        GpuDescriptorHandle { ptr: MOCK_HEAP_GPU_START }
    }
}

// ============================================================================
// Mock Pipeline
// ============================================================================

pub struct MockPipeline;

impl Pipeline for MockPipeline {}

// ============================================================================
// Mock CommandList
// ============================================================================

struct PendingCopy {
    src: ResourceId,
    dst: ResourceId,
    footprints: Vec<SubresourceFootprint>,
}

pub struct MockCommandList {
    pub commands: Vec<String>,
    recording: bool,
    copies: Vec<PendingCopy>,
}

impl MockCommandList {
    pub fn new() -> Self {
        Self { commands: Vec::new(), recording: false, copies: Vec::new() }
    }

    fn record(&mut self, command: String) -> Result<()> {
        if !self.recording {
            engine_bail!("ember::mock", "'{}' recorded on a closed command list", command);
        }
        self.commands.push(command);
        Ok(())
    }
}

impl Default for MockCommandList {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            engine_bail!("ember::mock", "begin on a command list that is still recording");
        }
        self.commands.clear();
        self.copies.clear();
        self.recording = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if !self.recording {
            engine_bail!("ember::mock", "end on a closed command list");
        }
        self.recording = false;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn resource_barrier(&mut self, barrier: &ResourceBarrier) -> Result<()> {
        self.record(format!("barrier {:?}->{:?}", barrier.before, barrier.after))
    }

    fn begin_rendering(&mut self, desc: &RenderingDesc) -> Result<()> {
        self.record(format!(
            "begin_rendering color={} depth={} clear_color={:?} clear_depth={:?}",
            desc.color.id().get(),
            desc.depth.map(|d| d.id().get()).unwrap_or(0),
            desc.clear_color,
            desc.clear_depth,
        ))
    }

    fn end_rendering(&mut self) -> Result<()> {
        self.record("end_rendering".to_string())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.record(format!("viewport {}x{}", viewport.width, viewport.height))
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.record(format!("scissor {}x{}", scissor.width, scissor.height))
    }

    fn copy_buffer_to_texture(
        &mut self,
        src: &dyn Buffer,
        dst: &dyn Texture,
        footprints: &[SubresourceFootprint],
    ) -> Result<()> {
        self.record(format!("copy_buffer_to_texture mips={}", footprints.len()))?;
        self.copies.push(PendingCopy {
            src: src.id(),
            dst: dst.id(),
            footprints: footprints.to_vec(),
        });
        Ok(())
    }

    fn set_descriptor_heap(&mut self, heap: &dyn DescriptorHeap) -> Result<()> {
        self.record(format!("set_descriptor_heap capacity={}", heap.capacity()))
    }

    fn set_descriptor_table(&mut self, root_index: u32, handle: GpuDescriptorHandle) -> Result<()> {
        self.record(format!("set_descriptor_table root={} ptr={:#x}", root_index, handle.ptr))
    }

    fn bind_pipeline(&mut self, _pipeline: &dyn Pipeline) -> Result<()> {
        self.record("bind_pipeline".to_string())
    }

    fn set_root_constants(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        self.record(format!("root_constants offset={} len={}", offset, data.len()))
    }

    fn set_vertex_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()> {
        self.record(format!("vertex_buffer {} offset={}", buffer.id().get(), offset))
    }

    fn set_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, index_type: IndexType) -> Result<()> {
        self.record(format!("index_buffer {} offset={} {:?}", buffer.id().get(), offset, index_type))
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.record(format!("draw {} first={}", vertex_count, first_vertex))
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.record(format!("draw_indexed {} first={} base={}", index_count, first_index, vertex_offset))
    }
}

// ============================================================================
// Mock Fence
// ============================================================================

#[derive(Default)]
struct FenceInner {
    value: Mutex<u64>,
    reached: Condvar,
}

impl FenceInner {
    fn set(&self, value: u64) {
        let mut current = self.value.lock().unwrap();
        if value > *current {
            *current = value;
        }
        self.reached.notify_all();
    }
}

pub struct MockFence {
    inner: Arc<FenceInner>,
}

impl Fence for MockFence {
    fn completed_value(&self) -> Result<u64> {
        Ok(*self.inner.value.lock().unwrap())
    }

    fn wait(&self, value: u64) -> Result<()> {
        let guard = self.inner.value.lock().unwrap();
        let (guard, timeout) = self
            .inner
            .reached
            .wait_timeout_while(guard, FENCE_WAIT_TIMEOUT, |current| *current < value)
            .unwrap();
        if timeout.timed_out() {
            engine_bail!("ember::mock", "fence stuck at {} waiting for {}", *guard, value);
        }
        Ok(())
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    state: Arc<Mutex<MockState>>,
    back_buffers: Vec<Arc<MockTexture>>,
    current: u32,
    acquired: bool,
    desc: SwapchainDesc,
}

impl MockSwapchain {
    /// Whether an image is currently acquired (between first index query and present)
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }
}

impl Swapchain for MockSwapchain {
    fn current_back_buffer_index(&mut self) -> Result<u32> {
        self.acquired = true;
        Ok(self.current)
    }

    fn back_buffer(&self, index: u32) -> Result<Arc<dyn Texture>> {
        match self.back_buffers.get(index as usize) {
            Some(texture) => Ok(texture.clone()),
            None => engine_bail!("ember::mock", "back buffer {} out of range", index),
        }
    }

    fn present(&mut self) -> Result<()> {
        self.acquired = false;
        self.current = (self.current + 1) % self.desc.buffer_count;
        self.state.lock().unwrap().presents += 1;
        Ok(())
    }

    fn buffer_count(&self) -> u32 {
        self.desc.buffer_count
    }

    fn width(&self) -> u32 {
        self.desc.width
    }

    fn height(&self) -> u32 {
        self.desc.height
    }

    fn format(&self) -> TextureFormat {
        self.desc.format
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    state: Arc<Mutex<MockState>>,
    gpu_latency: Duration,
}

impl MockGraphicsDevice {
    /// Device whose fence signals complete immediately
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Device whose fence signals complete `gpu_latency` after being queued
    pub fn with_latency(gpu_latency: Duration) -> Self {
        Self { state: Arc::new(Mutex::new(MockState::default())), gpu_latency }
    }

    /// Lock the recorded state for inspection
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Live mock texture behind `id`
    pub fn texture(&self, id: ResourceId) -> Option<Arc<MockTexture>> {
        self.state().textures.get(&id).and_then(Weak::upgrade)
    }

    /// Whether the buffer `id` is still alive
    pub fn buffer_alive(&self, id: ResourceId) -> bool {
        self.state().buffers.get(&id).is_some_and(|b| b.strong_count() > 0)
    }

    fn register_texture(&self, info: TextureInfo) -> Arc<MockTexture> {
        let texture = Arc::new(MockTexture::new(info));
        self.state().textures.insert(texture.id, Arc::downgrade(&texture));
        texture
    }

    fn replay_copy(&self, copy: &PendingCopy) -> Result<()> {
        let (src, dst) = {
            let state = self.state();
            (
                state.buffers.get(&copy.src).and_then(Weak::upgrade),
                state.textures.get(&copy.dst).and_then(Weak::upgrade),
            )
        };
        let Some(src) = src else {
            engine_bail!("ember::mock", "copy source buffer {} released before execution", copy.src.get());
        };
        let Some(dst) = dst else {
            engine_bail!("ember::mock", "copy destination texture {} released before execution", copy.dst.get());
        };

        let mut mips = dst.mips.lock().unwrap();
        for fp in &copy.footprints {
            let mip = &mut mips[fp.mip as usize];
            for row in 0..fp.height as u64 {
                let bytes = src.read(fp.offset + row * fp.row_pitch, fp.row_bytes as usize)?;
                let start = (row * fp.row_bytes) as usize;
                mip[start..start + bytes.len()].copy_from_slice(&bytes);
            }
        }
        Ok(())
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        let mut state = self.state();
        if state.fail_allocations {
            return Err(Error::OutOfMemory);
        }
        if desc.size == 0 {
            engine_bail!("ember::mock", "zero-sized buffer");
        }
        let buffer = Arc::new(MockBuffer::new(desc.size, desc.usage));
        state.buffers.insert(buffer.id, Arc::downgrade(&buffer));
        state.buffer_descs.push(desc.clone());
        Ok(buffer)
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        {
            let mut state = self.state();
            if state.fail_allocations {
                return Err(Error::OutOfMemory);
            }
            if desc.width == 0 || desc.height == 0 {
                engine_bail!("ember::mock", "zero-sized texture {}x{}", desc.width, desc.height);
            }
            let max_mips = 32 - desc.width.max(desc.height).leading_zeros();
            if desc.mip_levels == 0 || desc.mip_levels > max_mips {
                engine_bail!("ember::mock", "invalid mip count {} for {}x{}", desc.mip_levels, desc.width, desc.height);
            }
            if desc.format.is_depth() != (desc.usage == TextureUsage::DepthStencil) {
                engine_bail!("ember::mock", "format {:?} does not match usage {:?}", desc.format, desc.usage);
            }
            state.texture_descs.push(desc.clone());
        }
        Ok(self.register_texture(TextureInfo::from_desc(desc)))
    }

    fn copy_alignment(&self) -> CopyAlignment {
        MOCK_COPY_ALIGNMENT
    }

    fn create_descriptor_heap(&self, capacity: u32) -> Result<Arc<dyn DescriptorHeap>> {
        if capacity == 0 {
            engine_bail!("ember::mock", "descriptor heap with zero capacity");
        }
        Ok(Arc::new(MockDescriptorHeap { id: ResourceId::new(), capacity }))
    }

    fn create_texture_view(
        &self,
        heap: &dyn DescriptorHeap,
        handle: CpuDescriptorHandle,
        texture: &dyn Texture,
        desc: &TextureViewDesc,
    ) -> Result<()> {
        let heap = unsafe { &*(heap as *const dyn DescriptorHeap as *const MockDescriptorHeap) };
        let slot = heap.slot_of(handle)?;
        self.state().views.insert(
            (heap.id, slot),
            MockView::Texture { texture: texture.id(), desc: *desc },
        );
        Ok(())
    }

    fn create_buffer_view(
        &self,
        heap: &dyn DescriptorHeap,
        handle: CpuDescriptorHandle,
        buffer: &dyn Buffer,
        desc: &BufferViewDesc,
    ) -> Result<()> {
        let heap = unsafe { &*(heap as *const dyn DescriptorHeap as *const MockDescriptorHeap) };
        let slot = heap.slot_of(handle)?;
        self.state().views.insert(
            (heap.id, slot),
            MockView::Buffer { buffer: buffer.id(), desc: *desc },
        );
        Ok(())
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        if desc.vertex_shader.is_empty() || desc.fragment_shader.is_empty() {
            engine_bail!("ember::mock", "pipeline without shader code");
        }
        Ok(Arc::new(MockPipeline))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList::new()))
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<Box<dyn Swapchain>> {
        let mut desc = desc.clone();
        if let Some((width, height)) = self.state().granted_extent {
            desc.width = width;
            desc.height = height;
        }
        let back_buffers = (0..desc.buffer_count)
            .map(|_| {
                self.register_texture(TextureInfo {
                    width: desc.width,
                    height: desc.height,
                    mip_levels: 1,
                    format: desc.format,
                    usage: TextureUsage::RenderTarget,
                })
            })
            .collect();
        Ok(Box::new(MockSwapchain {
            state: self.state.clone(),
            back_buffers,
            current: 0,
            acquired: false,
            desc,
        }))
    }

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>> {
        let inner = Arc::new(FenceInner::default());
        inner.set(initial_value);
        Ok(Arc::new(MockFence { inner }))
    }

    fn execute(&self, commands: &dyn CommandList, _swapchain: Option<&dyn Swapchain>) -> Result<()> {
        let list = unsafe { &*(commands as *const dyn CommandList as *const MockCommandList) };
        if list.recording {
            engine_bail!("ember::mock", "executing a command list that is still recording");
        }
        for copy in &list.copies {
            self.replay_copy(copy)?;
        }
        self.state().submissions.push(list.commands.clone());
        Ok(())
    }

    fn signal(&self, fence: &dyn Fence, value: u64) -> Result<()> {
        let fence = unsafe { &*(fence as *const dyn Fence as *const MockFence) };
        let mut state = self.state();
        state.signals.push(value);
        if self.gpu_latency.is_zero() {
            fence.inner.set(value);
        } else {
            let inner = fence.inner.clone();
            let latency = self.gpu_latency;
            state.pending_signals.push(std::thread::spawn(move || {
                std::thread::sleep(latency);
                inner.set(value);
            }));
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let pending = std::mem::take(&mut self.state().pending_signals);
        for handle in pending {
            let _ = handle.join();
        }
        Ok(())
    }

    fn adapter_name(&self) -> String {
        "Mock Adapter".to_string()
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
