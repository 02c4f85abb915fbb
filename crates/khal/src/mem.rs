//! Physical memory access for the memory test.

/// 32-bit word access to physical memory plus a cache flush.
pub trait MemoryBus {
    fn read_u32(&self, addr: u32) -> u32;
    fn write_u32(&self, addr: u32, value: u32);
    /// Write back and invalidate the cache so the next read reaches DRAM.
    fn flush_cache(&self);
}

/// Identity-mapped physical memory on the running CPU (paging is off
/// during POST).
#[derive(Debug)]
pub struct PhysMemory {
    _private: (),
}

impl PhysMemory {
    /// # Safety
    ///
    /// The caller owns every address the bus will be asked to touch: nothing
    /// else (stack, code, the vector table) may live there.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl MemoryBus for PhysMemory {
    #[inline]
    fn read_u32(&self, addr: u32) -> u32 {
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    #[inline]
    fn write_u32(&self, addr: u32, value: u32) {
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }

    #[inline]
    fn flush_cache(&self) {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        unsafe {
            core::arch::asm!("wbinvd", options(nostack, preserves_flags));
        }
    }
}
