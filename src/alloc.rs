//! Bucket-array storage.
//!
//! The tables own one contiguous allocation of buckets for their whole
//! lifetime. Allocators hand that storage out and take it back; the table
//! initializes every slot itself, so the memory may be uninitialized.

use std::alloc::Layout;
use std::ptr::NonNull;

use crate::error::Error;

/// Provider of bucket-array storage.
///
/// `allocate` must honor `layout.align()`; the tables additionally verify
/// that the returned address is aligned to the full cache line, since the
/// half-line bucket variants rely on whole-line prefetches.
pub trait BucketAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, Error>;

    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this allocator with
    /// the same `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The global allocator, with the layout's alignment raised to whatever the
/// caller asks for. Good enough wherever huge pages are unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct SysAlloc;

impl BucketAlloc for SysAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, Error> {
        debug_assert!(layout.size() > 0);
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(Error::OutOfMemory {
            bytes: layout.size(),
        })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) };
    }
}

#[cfg(target_os = "linux")]
pub use huge::HugePageAlloc;

#[cfg(target_os = "linux")]
mod huge {
    use super::{BucketAlloc, Error, Layout, NonNull};

    /// 2 MiB, the default hugetlb page size on x86-64 and aarch64 Linux.
    pub const HUGE_PAGE_SIZE: usize = 1 << 21;

    /// Anonymous `mmap` allocator backed by 2 MiB huge pages.
    ///
    /// Sizes are rounded up to the huge-page boundary. When the hugetlb
    /// pool is empty or unconfigured, falls back to an ordinary anonymous
    /// mapping with a transparent-huge-page hint rather than failing the
    /// allocation. Either way the mapping is page-aligned, which satisfies
    /// the cache-line contract with room to spare.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct HugePageAlloc;

    fn round_to_huge_page(n: usize) -> usize {
        ((n - 1) / HUGE_PAGE_SIZE + 1) * HUGE_PAGE_SIZE
    }

    impl BucketAlloc for HugePageAlloc {
        fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, Error> {
            debug_assert!(layout.align() <= HUGE_PAGE_SIZE);
            let len = round_to_huge_page(layout.size());
            let prot = libc::PROT_READ | libc::PROT_WRITE;
            let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

            let mut ptr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    len,
                    prot,
                    flags | libc::MAP_HUGETLB,
                    -1,
                    0,
                )
            };
            if ptr == libc::MAP_FAILED {
                // No hugetlb pages reserved on this machine; take a normal
                // mapping and let the kernel promote it if THP is on.
                ptr = unsafe { libc::mmap(std::ptr::null_mut(), len, prot, flags, -1, 0) };
                if ptr == libc::MAP_FAILED {
                    return Err(Error::OutOfMemory { bytes: len });
                }
                unsafe { libc::madvise(ptr, len, libc::MADV_HUGEPAGE) };
            }
            Ok(unsafe { NonNull::new_unchecked(ptr.cast()) })
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            let len = round_to_huge_page(layout.size());
            unsafe { libc::munmap(ptr.as_ptr().cast(), len) };
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::CACHE_LINE;

        #[test]
        fn rounds_up_to_huge_page() {
            assert_eq!(round_to_huge_page(1), HUGE_PAGE_SIZE);
            assert_eq!(round_to_huge_page(HUGE_PAGE_SIZE), HUGE_PAGE_SIZE);
            assert_eq!(round_to_huge_page(HUGE_PAGE_SIZE + 1), 2 * HUGE_PAGE_SIZE);
        }

        #[test]
        fn allocation_is_cache_line_aligned() {
            let alloc = HugePageAlloc;
            let layout = Layout::from_size_align(1 << 20, CACHE_LINE).unwrap();
            let ptr = alloc.allocate(layout).unwrap();
            assert_eq!(ptr.as_ptr() as usize % CACHE_LINE, 0);
            // Touch both ends so a bad mapping faults here, not in a table test.
            unsafe {
                ptr.as_ptr().write(0xa5);
                ptr.as_ptr().add((1 << 20) - 1).write(0x5a);
                alloc.deallocate(ptr, layout);
            }
        }
    }
}
