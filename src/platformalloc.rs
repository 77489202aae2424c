// Abstract over where the heap block and the mapped page come from

use std::alloc::{Layout, alloc, dealloc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocFailed;

impl std::error::Error for AllocFailed {}

impl fmt::Display for AllocFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Alloc failed")
    }
}

/// A 32-bit integer's worth of memory from the global allocator, i.e. from the heap.
///
/// Dropping the block frees it; `release` does the same but makes the free visible at the call
/// site.
#[derive(Debug)]
pub struct HeapBlock {
    ptr: *mut i32,
}

impl HeapBlock {
    pub const LAYOUT: Layout = Layout::new::<i32>();

    pub fn new() -> Result<Self, AllocFailed> {
        debug_assert!(Self::LAYOUT.size() == 4);

        let ptr = unsafe { alloc(Self::LAYOUT) } as *mut i32;
        if ptr.is_null() {
            log::error!("heap allocation of {} bytes failed", Self::LAYOUT.size());
            return Err(AllocFailed);
        }
        debug_assert!(ptr.is_aligned());
        log::debug!("allocated {} heap bytes at {:p}", Self::LAYOUT.size(), ptr);

        Ok(Self { ptr })
    }

    pub fn addr(&self) -> usize {
        self.ptr.addr()
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for HeapBlock {
    fn drop(&mut self) {
        log::debug!("freeing heap block at {:p}", self.ptr);
        unsafe { dealloc(self.ptr as *mut u8, Self::LAYOUT) };
    }
}

/// One page of anonymous memory straight from the OS, bypassing the heap.
#[derive(Debug)]
pub struct MappedPage {
    ptr: *mut u8,
}

impl MappedPage {
    pub fn new() -> Result<Self, AllocFailed> {
        let ptr = sys_alloc(vendor::PAGE_SIZE)?;
        log::debug!("mapped {} bytes at {:p}", vendor::PAGE_SIZE, ptr);
        Ok(Self { ptr })
    }

    pub fn addr(&self) -> usize {
        self.ptr.addr()
    }

    pub fn size(&self) -> usize {
        vendor::PAGE_SIZE
    }
}

impl Drop for MappedPage {
    fn drop(&mut self) {
        log::debug!("unmapping {} bytes at {:p}", self.size(), self.ptr);
        sys_dealloc(self.ptr, self.size());
    }
}

/// Where the walk gets its heap block and its mapped page from.
pub trait Backing {
    fn heap_block(&self) -> Result<HeapBlock, AllocFailed>;

    /// `None` where the platform cannot map pages at all.
    fn mapped_page(&self) -> Option<Result<MappedPage, AllocFailed>>;
}

/// The global allocator for the heap block, the OS for the page.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsBacking;

impl Backing for OsBacking {
    fn heap_block(&self) -> Result<HeapBlock, AllocFailed> {
        HeapBlock::new()
    }

    fn mapped_page(&self) -> Option<Result<MappedPage, AllocFailed>> {
        MAPPING_SUPPORTED.then(MappedPage::new)
    }
}

/// Whether this platform has a way to map pages at all. Where it doesn't, `sys_alloc` always
/// fails.
pub const MAPPING_SUPPORTED: bool = vendor::SUPPORTED;

pub fn sys_alloc(size: usize) -> Result<*mut u8, AllocFailed> {
    debug_assert!(size > 0);

    let ptr = vendor::sys_alloc(size)?;
    debug_assert!(ptr.addr() % vendor::PAGE_SIZE == 0);

    Ok(ptr)
}

pub fn sys_dealloc(ptr: *mut u8, size: usize) {
    debug_assert!(size > 0);
    debug_assert!(!ptr.is_null());

    vendor::sys_dealloc(ptr, size)
}

#[cfg(target_os = "linux")]
pub mod vendor {
    pub const PAGE_SIZE: usize = 4096;
    pub const SUPPORTED: bool = true;

    use super::AllocFailed;
    use rustix::mm::{MapFlags, ProtFlags, mmap_anonymous, munmap};
    use std::ffi::c_void;
    use std::ptr;

    pub fn sys_alloc(reqsize: usize) -> Result<*mut u8, AllocFailed> {
        match unsafe {
            mmap_anonymous(
                ptr::null_mut(),
                reqsize,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::PRIVATE,
            )
        } {
            Ok(p) => Ok(p as *mut u8),
            Err(e) => {
                log::warn!("mmap of {reqsize} bytes failed: {e}");
                Err(AllocFailed)
            }
        }
    }

    pub fn sys_dealloc(p: *mut u8, size: usize) {
        if let Err(e) = unsafe { munmap(p as *mut c_void, size) } {
            log::warn!("munmap of {p:p} failed: {e}");
        }
    }
}

#[cfg(target_vendor = "apple")]
pub mod vendor {
    pub const PAGE_SIZE: usize = 16384;
    pub const SUPPORTED: bool = true;

    use super::AllocFailed;
    use mach_sys::kern_return::KERN_SUCCESS;
    use mach_sys::port::mach_port_t;
    use mach_sys::traps::mach_task_self;
    use mach_sys::vm::{mach_vm_allocate, mach_vm_deallocate};
    use mach_sys::vm_statistics::VM_FLAGS_ANYWHERE;
    use mach_sys::vm_types::{mach_vm_address_t, mach_vm_size_t};

    pub fn sys_alloc(size: usize) -> Result<*mut u8, AllocFailed> {
        let task: mach_port_t = unsafe { mach_task_self() };
        let mut address: mach_vm_address_t = 0;
        let size: mach_vm_size_t = size as mach_vm_size_t;

        let retval = unsafe { mach_vm_allocate(task, &mut address, size, VM_FLAGS_ANYWHERE) };
        if retval == KERN_SUCCESS {
            Ok(address as *mut u8)
        } else {
            log::warn!("mach_vm_allocate of {size} bytes failed: {retval}");
            Err(AllocFailed)
        }
    }

    pub fn sys_dealloc(p: *mut u8, size: usize) {
        let retval = unsafe { mach_vm_deallocate(mach_task_self(), p.addr() as u64, size as u64) };
        if retval != KERN_SUCCESS {
            log::warn!("mach_vm_deallocate of {p:p} failed: {retval}");
        }
    }
}

#[cfg(not(any(target_os = "linux", target_vendor = "apple")))]
pub mod vendor {
    pub const PAGE_SIZE: usize = 4096;
    pub const SUPPORTED: bool = false;

    use super::AllocFailed;

    pub fn sys_alloc(_reqsize: usize) -> Result<*mut u8, AllocFailed> {
        Err(AllocFailed)
    }

    pub fn sys_dealloc(_p: *mut u8, _size: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_block_is_writable_and_aligned() {
        let b = HeapBlock::new().unwrap();
        assert_ne!(b.addr(), 0);
        assert_eq!(b.addr() % HeapBlock::LAYOUT.align(), 0);
        unsafe {
            b.ptr.write(31337);
            assert_eq!(b.ptr.read(), 31337);
        }
        b.release();
    }

    #[test]
    fn two_live_heap_blocks_do_not_overlap() {
        let a = HeapBlock::new().unwrap();
        let b = HeapBlock::new().unwrap();
        assert!(a.addr().abs_diff(b.addr()) >= HeapBlock::LAYOUT.size());
    }

    #[test]
    fn mapped_page_is_page_aligned() {
        if !MAPPING_SUPPORTED {
            assert_eq!(MappedPage::new().unwrap_err(), AllocFailed);
            return;
        }

        let m = MappedPage::new().unwrap();
        assert_ne!(m.addr(), 0);
        assert_eq!(m.addr() % m.size(), 0);
        unsafe {
            std::ptr::write_bytes(m.ptr, 0xAB, m.size());
            assert_eq!(*m.ptr.add(m.size() - 1), 0xAB);
        }
    }

    #[test]
    fn os_backing_maps_only_where_supported() {
        assert_eq!(OsBacking.mapped_page().is_some(), MAPPING_SUPPORTED);
        assert_ne!(OsBacking.heap_block().unwrap().addr(), 0);
    }

    #[test]
    fn alloc_failed_displays() {
        assert_eq!(AllocFailed.to_string(), "Alloc failed");
    }
}
