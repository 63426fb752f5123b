/// Shader-visible view table and its slot allocator
///
/// One process-wide table of texture/buffer views. Slots are handed out
/// monotonically and never reclaimed; each slot maps to a CPU handle (to
/// write a view) and a GPU handle (to bind it) by pure address arithmetic.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    Buffer, BufferViewDesc, CommandList, CpuDescriptorHandle, DescriptorHeap,
    GpuDescriptorHandle, GraphicsDevice, Texture, TextureViewDesc,
};
use crate::utils::SlotAllocator;
use crate::{engine_error, engine_info};

pub struct ViewTable {
    device: Arc<dyn GraphicsDevice>,
    heap: Arc<dyn DescriptorHeap>,
    allocator: SlotAllocator,
    stride: u64,
    cpu_start: CpuDescriptorHandle,
    gpu_start: GpuDescriptorHandle,
}

impl ViewTable {
    /// Create a table of `capacity` slots, the first `reserved` of which are never allocated
    pub fn new(device: Arc<dyn GraphicsDevice>, capacity: u32, reserved: u32) -> Result<Self> {
        if reserved >= capacity {
            return Err(Error::InitializationFailed(format!(
                "view table of {} slots cannot reserve {}",
                capacity, reserved
            )));
        }

        let heap = device.create_descriptor_heap(capacity)?;
        let stride = heap.stride();
        let cpu_start = heap.cpu_start();
        let gpu_start = heap.gpu_start();

        engine_info!(
            "ember::ViewTable",
            "View table created: {} slots ({} reserved), stride {}",
            capacity, reserved, stride
        );

        Ok(Self {
            device,
            heap,
            allocator: SlotAllocator::with_reserved(capacity, reserved),
            stride,
            cpu_start,
            gpu_start,
        })
    }

    /// Next unused slot
    ///
    /// Fails with `ViewSlotsExhausted` once every slot has been handed out;
    /// the table is sized for the whole run, so this is a configuration error.
    pub fn allocate(&mut self) -> Result<u32> {
        match self.allocator.alloc() {
            Some(slot) => Ok(slot),
            None => {
                let capacity = self.allocator.capacity();
                engine_error!(
                    "ember::ViewTable",
                    "View table exhausted: all {} slots in use", capacity
                );
                Err(Error::ViewSlotsExhausted { capacity })
            }
        }
    }

    /// CPU handle of `slot` (base + slot * stride)
    pub fn cpu_handle(&self, slot: u32) -> CpuDescriptorHandle {
        debug_assert!(slot < self.capacity(), "slot {} outside view table", slot);
        CpuDescriptorHandle { ptr: self.cpu_start.ptr + slot as u64 * self.stride }
    }

    /// GPU handle of `slot` (base + slot * stride)
    pub fn gpu_handle(&self, slot: u32) -> GpuDescriptorHandle {
        debug_assert!(slot < self.capacity(), "slot {} outside view table", slot);
        GpuDescriptorHandle { ptr: self.gpu_start.ptr + slot as u64 * self.stride }
    }

    /// Write a shader-readable view of `texture` (mips `0..mip_levels`) at `slot`
    pub fn create_texture_view(&self, slot: u32, texture: &dyn Texture, mip_levels: u32) -> Result<()> {
        self.check_slot(slot)?;
        let desc = TextureViewDesc { format: texture.info().format, mip_levels };
        self.device
            .create_texture_view(self.heap.as_ref(), self.cpu_handle(slot), texture, &desc)
    }

    /// Write a read-only structured buffer view (elements `0..num_elements`) at `slot`
    pub fn create_structured_buffer_view(
        &self,
        slot: u32,
        buffer: &dyn Buffer,
        num_elements: u32,
        stride: u32,
    ) -> Result<()> {
        self.check_slot(slot)?;
        if num_elements as u64 * stride as u64 > buffer.size() {
            return Err(Error::InvalidResource(format!(
                "{} elements of {} bytes exceed buffer of {} bytes",
                num_elements, stride, buffer.size()
            )));
        }
        let desc = BufferViewDesc { first_element: 0, num_elements, stride };
        self.device
            .create_buffer_view(self.heap.as_ref(), self.cpu_handle(slot), buffer, &desc)
    }

    /// Make this table the active one on `cmd`
    pub fn bind(&self, cmd: &mut dyn CommandList) -> Result<()> {
        cmd.set_descriptor_heap(self.heap.as_ref())
    }

    /// Point root parameter `root_index` at `slot`
    pub fn set_descriptor_table(&self, cmd: &mut dyn CommandList, root_index: u32, slot: u32) -> Result<()> {
        self.check_slot(slot)?;
        cmd.set_descriptor_table(root_index, self.gpu_handle(slot))
    }

    pub fn capacity(&self) -> u32 {
        self.allocator.capacity()
    }

    /// Slots handed out so far (reserved slots excluded)
    pub fn allocated(&self) -> u32 {
        self.allocator.len()
    }

    pub fn remaining(&self) -> u32 {
        self.allocator.remaining()
    }

    pub fn heap(&self) -> &Arc<dyn DescriptorHeap> {
        &self.heap
    }

    fn check_slot(&self, slot: u32) -> Result<()> {
        if slot >= self.capacity() {
            return Err(Error::InvalidResource(format!(
                "slot {} outside view table of {}",
                slot,
                self.capacity()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "view_table_tests.rs"]
mod tests;
