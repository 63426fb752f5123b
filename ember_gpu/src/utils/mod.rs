/// Small containers shared by the core modules

pub mod slot_allocator;

pub use slot_allocator::SlotAllocator;
