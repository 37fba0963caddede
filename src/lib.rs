//! Bucketized cuckoo hash tables tuned for lookup-heavy workloads.
//!
//! Keys live in fixed-size buckets sized to a cache line (or half of one),
//! so a single line fill covers every slot a probe has to inspect, and the
//! in-bucket search is a broadcast-compare over all slots at once. Collisions
//! are resolved by two-choice cuckoo placement: each key has exactly two
//! candidate buckets, and inserts displace residents along a bounded chain
//! when both are full.
//!
//! Three variants share the design:
//!
//! * [`CuckooMap`] — `u64` keys and `u64` values, 4 slots per 64-byte bucket.
//! * [`CuckooSet`] — `u64` keys only, 4 slots per 32-byte bucket.
//! * [`CuckooSet32`] — `u32` keys, 8 slots per 32-byte bucket.
//!
//! The hash function and the bucket-array allocator are both injected; the
//! defaults are a CRC32C-based hash ([`Crc32cHash`]) and the global allocator
//! with an over-aligned layout ([`SysAlloc`]). On Linux, [`HugePageAlloc`]
//! backs the bucket array with 2 MiB huge pages.
//!
//! Tables are single-writer. Multiple threads may probe a table concurrently
//! as long as no mutation is in flight; there is no internal synchronization.
//!
//! ```
//! use cacheline_cuckoo::CuckooMap;
//!
//! let mut map = CuckooMap::with_capacity(1024)?;
//! map.insert(7, 700)?;
//! let entry = map.find(7).unwrap();
//! assert_eq!(map.value_at(entry), 700);
//! map.erase(entry);
//! assert!(map.find(7).is_none());
//! # Ok::<(), cacheline_cuckoo::Error>(())
//! ```

pub mod alloc;
pub mod error;
pub mod hash;
pub mod map;
pub mod set;
pub mod set32;
mod simd;

#[cfg(target_os = "linux")]
pub use alloc::HugePageAlloc;
pub use alloc::{BucketAlloc, SysAlloc};
pub use error::Error;
pub use hash::{Crc32cHash, FoldHash, TableHash};
pub use map::CuckooMap;
pub use set::CuckooSet;
pub use set32::CuckooSet32;

/// Cache line size the bucket layouts are built around.
pub const CACHE_LINE: usize = 64;

/// Upper bound on the length of a cuckoo eviction chain. Hitting it means
/// the table is past the load factor two-choice placement can sustain.
pub const MAX_INSERT_DEPTH: usize = 256;

/// Locator for an occupied slot, handed out by `find` and `find_batched`.
///
/// An `Entry` stays valid until the next mutating call on the table: any
/// `insert` may displace the referenced slot, and `erase` through one entry
/// may free the slot another one points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub(crate) bucket: usize,
    pub(crate) slot: usize,
}

impl Entry {
    /// Index of the bucket holding the slot.
    #[inline]
    pub fn bucket(&self) -> usize {
        self.bucket
    }

    /// Slot index within the bucket.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }
}
