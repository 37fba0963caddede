//! A cuckoo hash set of `u64` keys.
//!
//! Without values a bucket is just four keys, 32 bytes: two buckets per
//! cache line. The bucket array itself is still aligned to the full line so
//! a prefetch of either bucket pulls its whole line.

use std::alloc::Layout;
use std::mem;
use std::ptr::NonNull;

use crate::alloc::{BucketAlloc, SysAlloc};
use crate::error::Error;
use crate::hash::{Crc32cHash, TableHash};
use crate::simd;
use crate::{Entry, CACHE_LINE, MAX_INSERT_DEPTH};

pub const SLOTS_PER_BUCKET: usize = 4;

/// Reserved key marking an empty slot. Callers must not insert it.
pub const EMPTY_KEY: u64 = u64::MAX;

/// Largest batch `find_batched` accepts.
pub const MAX_LOOKUP_BATCH: usize = CACHE_LINE / mem::size_of::<u64>();

#[repr(C, align(32))]
struct Bucket {
    keys: [u64; SLOTS_PER_BUCKET],
}

const _: () = assert!(mem::size_of::<Bucket>() == CACHE_LINE / 2);
const _: () = assert!(mem::align_of::<Bucket>() == CACHE_LINE / 2);

impl Bucket {
    const EMPTY: Bucket = Bucket {
        keys: [EMPTY_KEY; SLOTS_PER_BUCKET],
    };

    #[inline(always)]
    fn find_simd(&self, key: u64) -> Option<usize> {
        simd::search4(key, &self.keys)
    }

    #[cfg(test)]
    fn find(&self, key: u64) -> Option<usize> {
        self.keys.iter().position(|&k| k == key)
    }

    #[inline]
    fn insert(&mut self, key: u64) -> Result<bool, Error> {
        for i in 0..SLOTS_PER_BUCKET {
            if self.keys[i] == EMPTY_KEY {
                self.keys[i] = key;
                return Ok(true);
            }
            if self.keys[i] == key {
                return Err(Error::DuplicateKey(key));
            }
        }
        Ok(false)
    }

    #[inline]
    fn replace(&mut self, i: usize, key: u64) -> u64 {
        mem::replace(&mut self.keys[i], key)
    }
}

/// Half-line bucketized cuckoo set. Same placement scheme as
/// [`CuckooMap`](crate::CuckooMap), half the memory per resident key.
pub struct CuckooSet<H = Crc32cHash, A: BucketAlloc = SysAlloc> {
    buckets: NonNull<Bucket>,
    // Layout of the bucket array, kept for the deallocation in Drop.
    layout: Layout,
    num_buckets: usize,
    bucket_mask: usize,
    len: usize,
    victim_rotation: usize,
    hasher: H,
    alloc: A,
}

unsafe impl<H: Send, A: BucketAlloc + Send> Send for CuckooSet<H, A> {}
unsafe impl<H: Sync, A: BucketAlloc + Sync> Sync for CuckooSet<H, A> {}

impl CuckooSet {
    pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
        Self::with_parts(capacity, Crc32cHash, SysAlloc)
    }
}

impl<H: TableHash, A: BucketAlloc> CuckooSet<H, A> {
    pub fn with_parts(capacity: usize, hasher: H, alloc: A) -> Result<Self, Error> {
        let num_buckets = capacity.next_power_of_two() / SLOTS_PER_BUCKET;
        if num_buckets == 0 {
            return Err(Error::InvalidCapacity(capacity));
        }
        let layout = bucket_array_layout(num_buckets)?;
        let ptr = alloc.allocate(layout)?;
        if ptr.as_ptr() as usize % CACHE_LINE != 0 {
            unsafe { alloc.deallocate(ptr, layout) };
            return Err(Error::Misaligned {
                addr: ptr.as_ptr() as usize,
                align: CACHE_LINE,
            });
        }
        let buckets = ptr.cast::<Bucket>();
        for i in 0..num_buckets {
            unsafe { buckets.as_ptr().add(i).write(Bucket::EMPTY) };
        }
        Ok(Self {
            buckets,
            layout,
            num_buckets,
            bucket_mask: num_buckets - 1,
            len: 0,
            victim_rotation: 0,
            hasher,
            alloc,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.num_buckets * SLOTS_PER_BUCKET
    }

    #[inline]
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.capacity() as f64
    }

    #[inline]
    pub fn find(&self, key: u64) -> Option<Entry> {
        let h = self.hasher.hash_key(key);
        let b1 = self.home_bucket(h);
        if let Some(slot) = self.bucket(b1).find_simd(key) {
            return Some(Entry { bucket: b1, slot });
        }
        let b2 = self.other_bucket(h, key);
        self.bucket(b2)
            .find_simd(key)
            .map(|slot| Entry { bucket: b2, slot })
    }

    #[inline]
    pub fn contains(&self, key: u64) -> bool {
        self.find(key).is_some()
    }

    /// Batched lookup; see [`CuckooMap::find_batched`](crate::CuckooMap::find_batched)
    /// for the pipeline. Second buckets are prefetched only for keys that
    /// missed their first.
    pub fn find_batched(&self, keys: &[u64], out: &mut [Option<Entry>]) {
        assert!(keys.len() <= MAX_LOOKUP_BATCH);
        assert_eq!(keys.len(), out.len());

        let mut hashes = [0u64; MAX_LOOKUP_BATCH];
        let mut b1s = [0usize; MAX_LOOKUP_BATCH];
        for (i, &key) in keys.iter().enumerate() {
            let h = self.hasher.hash_key(key);
            hashes[i] = h;
            b1s[i] = self.home_bucket(h);
            simd::prefetch(self.bucket(b1s[i]) as *const Bucket);
        }

        for (i, &key) in keys.iter().enumerate() {
            out[i] = self
                .bucket(b1s[i])
                .find_simd(key)
                .map(|slot| Entry { bucket: b1s[i], slot });
        }

        let mut b2s = [0usize; MAX_LOOKUP_BATCH];
        for (i, &key) in keys.iter().enumerate() {
            if out[i].is_some() {
                continue;
            }
            b2s[i] = self.other_bucket(hashes[i], key);
            simd::prefetch(self.bucket(b2s[i]) as *const Bucket);
        }

        for (i, &key) in keys.iter().enumerate() {
            if out[i].is_some() {
                continue;
            }
            out[i] = self
                .bucket(b2s[i])
                .find_simd(key)
                .map(|slot| Entry { bucket: b2s[i], slot });
        }
    }

    pub fn insert(&mut self, key: u64) -> Result<(), Error> {
        debug_assert_ne!(key, EMPTY_KEY, "the all-ones key marks empty slots");
        let h = self.hasher.hash_key(key);
        let b1 = self.home_bucket(h);
        let b2 = self.other_bucket(h, key);
        if self.bucket(b1).find_simd(key).is_some() || self.bucket(b2).find_simd(key).is_some() {
            return Err(Error::DuplicateKey(key));
        }

        if !self.bucket_mut(b1).insert(key)? && !self.bucket_mut(b2).insert(key)? {
            self.displace_insert(b1, key)?;
        }
        self.len += 1;
        Ok(())
    }

    pub fn erase(&mut self, entry: Entry) {
        debug_assert!(entry.bucket < self.num_buckets && entry.slot < SLOTS_PER_BUCKET);
        debug_assert_ne!(self.bucket(entry.bucket).keys[entry.slot], EMPTY_KEY);
        self.bucket_mut(entry.bucket).keys[entry.slot] = EMPTY_KEY;
        self.len -= 1;
    }

    #[inline]
    pub fn key_at(&self, entry: Entry) -> u64 {
        debug_assert!(entry.bucket < self.num_buckets && entry.slot < SLOTS_PER_BUCKET);
        self.bucket(entry.bucket).keys[entry.slot]
    }

    fn displace_insert(&mut self, bucket_id: usize, key: u64) -> Result<(), Error> {
        let mut path: Vec<(usize, usize)> = Vec::with_capacity(MAX_INSERT_DEPTH);
        let (mut bucket_id, mut key) = (bucket_id, key);

        for _ in 0..MAX_INSERT_DEPTH {
            let slot = self.next_victim_slot();
            let evicted = self.bucket_mut(bucket_id).replace(slot, key);
            path.push((bucket_id, slot));

            let h = self.hasher.hash_key(evicted);
            let home = self.home_bucket(h);
            let next = if home == bucket_id {
                self.other_bucket(h, evicted)
            } else {
                home
            };
            if self.bucket_mut(next).insert(evicted)? {
                return Ok(());
            }
            (bucket_id, key) = (next, evicted);
        }

        for &(b, slot) in path.iter().rev() {
            key = self.bucket_mut(b).replace(slot, key);
        }
        Err(Error::DisplacementExhausted {
            depth: MAX_INSERT_DEPTH,
        })
    }

    #[inline]
    fn next_victim_slot(&mut self) -> usize {
        self.victim_rotation = self.victim_rotation.wrapping_add(1);
        self.victim_rotation & (SLOTS_PER_BUCKET - 1)
    }

    #[inline(always)]
    fn home_bucket(&self, h: u64) -> usize {
        h as usize & self.bucket_mask
    }

    #[inline(always)]
    fn other_bucket(&self, h: u64, key: u64) -> usize {
        self.hasher.hash_key(h ^ key) as usize & self.bucket_mask
    }

    #[inline(always)]
    fn bucket(&self, i: usize) -> &Bucket {
        debug_assert!(i < self.num_buckets);
        unsafe { &*self.buckets.as_ptr().add(i) }
    }

    #[inline(always)]
    fn bucket_mut(&mut self, i: usize) -> &mut Bucket {
        debug_assert!(i < self.num_buckets);
        unsafe { &mut *self.buckets.as_ptr().add(i) }
    }
}

impl<H, A: BucketAlloc> Drop for CuckooSet<H, A> {
    fn drop(&mut self) {
        unsafe { self.alloc.deallocate(self.buckets.cast(), self.layout) };
    }
}

fn bucket_array_layout(num_buckets: usize) -> Result<Layout, Error> {
    let bytes = num_buckets
        .checked_mul(mem::size_of::<Bucket>())
        .ok_or(Error::InvalidCapacity(num_buckets))?;
    // Align the whole array to the full line even though buckets are half
    // a line; a line prefetch must cover its bucket pair.
    Layout::from_size_align(bytes, CACHE_LINE).map_err(|_| Error::InvalidCapacity(num_buckets))
}
