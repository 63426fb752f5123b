/// Hands out unique `u32` indices from a fixed-capacity range.
///
/// Indices are handed out in increasing order, starting after the reserved
/// prefix, and are never returned to the pool: the view table lives as long
/// as the device and slots stay bound to their resource for that whole time.
///
/// # Example
///
/// ```ignore
/// let mut alloc = SlotAllocator::with_reserved(4, 1);
/// assert_eq!(alloc.alloc(), Some(1));  // slot 0 is reserved
/// assert_eq!(alloc.alloc(), Some(2));
/// assert_eq!(alloc.alloc(), Some(3));
/// assert_eq!(alloc.alloc(), None);     // exhausted
/// ```
pub struct SlotAllocator {
    next_id: u32,
    reserved: u32,
    capacity: u32,
}

impl SlotAllocator {
    /// Allocator over `0..capacity`
    pub fn new(capacity: u32) -> Self {
        Self::with_reserved(capacity, 0)
    }

    /// Allocator over `reserved..capacity`; the first `reserved` indices are never handed out
    pub fn with_reserved(capacity: u32, reserved: u32) -> Self {
        let reserved = reserved.min(capacity);
        Self {
            next_id: reserved,
            reserved,
            capacity,
        }
    }

    /// Next index, or `None` once every index has been handed out
    pub fn alloc(&mut self) -> Option<u32> {
        if self.next_id >= self.capacity {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        Some(id)
    }

    /// Highest index ever allocated + 1 (or the reserved count if nothing was allocated)
    pub fn high_water_mark(&self) -> u32 {
        self.next_id
    }

    /// Number of allocated indices (reserved ones excluded)
    pub fn len(&self) -> u32 {
        self.next_id - self.reserved
    }

    /// Whether nothing has been allocated yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices still available
    pub fn remaining(&self) -> u32 {
        self.capacity - self.next_id
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn reserved(&self) -> u32 {
        self.reserved
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
