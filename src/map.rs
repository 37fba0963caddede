//! A cuckoo hash map from `u64` keys to `u64` values.
//!
//! Each bucket is exactly one 64-byte cache line: four keys followed by
//! their four values. A lookup therefore costs at most two line fills, and
//! the in-bucket search compares all four keys in one vector op.

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

/// Value written alongside [`EMPTY_KEY`] when a slot is cleared.
pub const EMPTY_VALUE: u64 = u64::MAX;

/// Largest batch `find_batched` accepts: one cache line's worth of keys.
pub const MAX_LOOKUP_BATCH: usize = CACHE_LINE / mem::size_of::<u64>();

#[repr(C, align(64))]
struct Bucket {
    keys: [u64; SLOTS_PER_BUCKET],
    values: [u64; SLOTS_PER_BUCKET],
}

const _: () = assert!(mem::size_of::<Bucket>() == CACHE_LINE);
const _: () = assert!(mem::align_of::<Bucket>() == CACHE_LINE);
const _: () = assert!(SLOTS_PER_BUCKET.is_power_of_two());

impl Bucket {
    const EMPTY: Bucket = Bucket {
        keys: [EMPTY_KEY; SLOTS_PER_BUCKET],
        values: [EMPTY_VALUE; SLOTS_PER_BUCKET],
    };

    #[inline(always)]
    fn find_simd(&self, key: u64) -> Option<usize> {
        simd::search4(key, &self.keys)
    }

    #[cfg(test)]
    fn find(&self, key: u64) -> Option<usize> {
        self.keys.iter().position(|&k| k == key)
    }

    /// Writes the pair into the first empty slot. `Ok(false)` means the
    /// bucket is full; nothing was written.
    #[inline]
    fn insert(&mut self, key: u64, value: u64) -> Result<bool, Error> {
        for i in 0..SLOTS_PER_BUCKET {
            if self.keys[i] == EMPTY_KEY {
                self.update(i, key, value);
                return Ok(true);
            }
            if self.keys[i] == key {
                return Err(Error::DuplicateKey(key));
            }
        }
        Ok(false)
    }

    /// Swaps the pair into slot `i`, returning the previous resident.
    #[inline]
    fn replace(&mut self, i: usize, key: u64, value: u64) -> (u64, u64) {
        let evicted = (self.keys[i], self.values[i]);
        self.update(i, key, value);
        evicted
    }

    #[inline]
    fn update(&mut self, i: usize, key: u64, value: u64) {
        self.keys[i] = key;
        self.values[i] = value;
    }

    #[inline]
    fn erase(&mut self, i: usize) {
        self.keys[i] = EMPTY_KEY;
        self.values[i] = EMPTY_VALUE;
    }
}

/// Cache-line bucketized cuckoo map; see the crate docs for the layout.
///
/// Single-writer: mutation needs `&mut self`. Concurrent `find`s from
/// several threads are fine on a table nobody is mutating.
#[derive(Debug)]
pub struct CuckooMap<H = Crc32cHash, A: BucketAlloc = SysAlloc> {
    buckets: NonNull<Bucket>,
    // Layout of the bucket array, kept for the deallocation in Drop.
    layout: Layout,
    num_buckets: usize,
    bucket_mask: usize,
    len: usize,
    // Rotates over slot indices so successive evictions from the same
    // bucket pick different victims. Never inspects keys.
    victim_rotation: usize,
    hasher: H,
    alloc: A,
}

unsafe impl<H: Send, A: BucketAlloc + Send> Send for CuckooMap<H, A> {}
unsafe impl<H: Sync, A: BucketAlloc + Sync> Sync for CuckooMap<H, A> {}

impl CuckooMap {
    /// Builds a map with the default CRC32C hash and the system allocator.
    pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
        Self::with_parts(capacity, Crc32cHash, SysAlloc)
    }
}

impl<H: TableHash, A: BucketAlloc> CuckooMap<H, A> {
    /// Builds a map over injected collaborators. `capacity` is rounded up
    /// to the next power of two and must be at least one bucket's worth of
    /// slots.
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
            // Safety: the allocation spans `num_buckets` buckets.
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

    /// Number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total slot count.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.num_buckets * SLOTS_PER_BUCKET
    }

    #[inline]
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.capacity() as f64
    }

    /// Looks up `key`, probing its first bucket and then, on a miss, its
    /// second.
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

    /// Looks up `keys.len() <= MAX_LOOKUP_BATCH` keys, overlapping the
    /// memory latency of the independent probes.
    ///
    /// The passes are deliberate: hash-and-prefetch every first bucket,
    /// probe them, then prefetch second buckets for the misses only, and
    /// probe those once the lines have had time to arrive. Element-wise the
    /// results equal `find` on each key.
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

    /// Inserts the pair, displacing residents along a bounded cuckoo chain
    /// when both candidate buckets are full.
    ///
    /// Fails with [`Error::DuplicateKey`] if the key is already present and
    /// with [`Error::DisplacementExhausted`] if the chain runs out of
    /// budget; in both cases the table is left exactly as it was.
    pub fn insert(&mut self, key: u64, value: u64) -> Result<(), Error> {
        debug_assert_ne!(key, EMPTY_KEY, "the all-ones key marks empty slots");
        let h = self.hasher.hash_key(key);
        let b1 = self.home_bucket(h);
        let b2 = self.other_bucket(h, key);
        if self.bucket(b1).find_simd(key).is_some() || self.bucket(b2).find_simd(key).is_some() {
            return Err(Error::DuplicateKey(key));
        }

        if !self.bucket_mut(b1).insert(key, value)? && !self.bucket_mut(b2).insert(key, value)? {
            self.displace_insert(b1, key, value)?;
        }
        self.len += 1;
        Ok(())
    }

    /// Clears the slot `entry` points at. The entry must come from a prior
    /// `find`/`find_batched` with no mutation in between.
    pub fn erase(&mut self, entry: Entry) {
        debug_assert!(entry.bucket < self.num_buckets && entry.slot < SLOTS_PER_BUCKET);
        debug_assert_ne!(self.bucket(entry.bucket).keys[entry.slot], EMPTY_KEY);
        self.bucket_mut(entry.bucket).erase(entry.slot);
        self.len -= 1;
    }

    /// Key stored at `entry`.
    #[inline]
    pub fn key_at(&self, entry: Entry) -> u64 {
        debug_assert!(entry.bucket < self.num_buckets && entry.slot < SLOTS_PER_BUCKET);
        self.bucket(entry.bucket).keys[entry.slot]
    }

    /// Value stored at `entry`.
    #[inline]
    pub fn value_at(&self, entry: Entry) -> u64 {
        debug_assert!(entry.bucket < self.num_buckets && entry.slot < SLOTS_PER_BUCKET);
        self.bucket(entry.bucket).values[entry.slot]
    }

    /// Mutable access to the value stored at `entry`.
    #[inline]
    pub fn value_at_mut(&mut self, entry: Entry) -> &mut u64 {
        debug_assert!(entry.bucket < self.num_buckets && entry.slot < SLOTS_PER_BUCKET);
        &mut self.bucket_mut(entry.bucket).values[entry.slot]
    }

    // Walks the eviction chain: kick a resident out of `bucket_id`, move it
    // to its other candidate, and repeat for whoever that displaces. On
    // exhaustion the chain is replayed backwards so every pair returns to
    // the slot it was evicted from.
    fn displace_insert(&mut self, bucket_id: usize, key: u64, value: u64) -> Result<(), Error> {
        let mut path: Vec<(usize, usize)> = Vec::with_capacity(MAX_INSERT_DEPTH);
        let (mut bucket_id, mut key, mut value) = (bucket_id, key, value);

        for _ in 0..MAX_INSERT_DEPTH {
            let slot = self.next_victim_slot();
            let (evicted_key, evicted_value) = self.bucket_mut(bucket_id).replace(slot, key, value);
            path.push((bucket_id, slot));

            let h = self.hasher.hash_key(evicted_key);
            let home = self.home_bucket(h);
            let next = if home == bucket_id {
                self.other_bucket(h, evicted_key)
            } else {
                home
            };
            if self.bucket_mut(next).insert(evicted_key, evicted_value)? {
                return Ok(());
            }
            (bucket_id, key, value) = (next, evicted_key, evicted_value);
        }

        for &(b, slot) in path.iter().rev() {
            (key, value) = self.bucket_mut(b).replace(slot, key, value);
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
        // Safety: i is masked or asserted below num_buckets.
        unsafe { &*self.buckets.as_ptr().add(i) }
    }

    #[inline(always)]
    fn bucket_mut(&mut self, i: usize) -> &mut Bucket {
        debug_assert!(i < self.num_buckets);
        unsafe { &mut *self.buckets.as_ptr().add(i) }
    }
}

impl<H, A: BucketAlloc> Drop for CuckooMap<H, A> {
    fn drop(&mut self) {
        unsafe { self.alloc.deallocate(self.buckets.cast(), self.layout) };
    }
}

fn bucket_array_layout(num_buckets: usize) -> Result<Layout, Error> {
    let bytes = num_buckets
        .checked_mul(mem::size_of::<Bucket>())
        .ok_or(Error::InvalidCapacity(num_buckets))?;
    Layout::from_size_align(bytes, CACHE_LINE).map_err(|_| Error::InvalidCapacity(num_buckets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // Pins every key to bucket 0, forcing maximal displacement pressure.
    #[derive(Default)]
    struct ConstHash;
    impl TableHash for ConstHash {
        fn hash_key(&self, _key: u64) -> u64 {
            0
        }
    }

    // Identity hash: first bucket is the key's low bits, second is bucket
    // of h ^ key == 0. Handy for steering keys into chosen buckets.
    #[derive(Default)]
    struct IdentityHash;
    impl TableHash for IdentityHash {
        fn hash_key(&self, key: u64) -> u64 {
            key
        }
    }

    // Hands back storage bumped off cache-line alignment.
    #[derive(Default, Debug)]
    struct MisalignedAlloc;
    impl BucketAlloc for MisalignedAlloc {
        fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, Error> {
            let padded = Layout::from_size_align(layout.size() + CACHE_LINE, layout.align())
                .map_err(|_| Error::OutOfMemory {
                    bytes: layout.size(),
                })?;
            let ptr = SysAlloc.allocate(padded)?;
            Ok(unsafe { NonNull::new_unchecked(ptr.as_ptr().add(8)) })
        }
        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            let padded =
                Layout::from_size_align(layout.size() + CACHE_LINE, layout.align()).unwrap();
            unsafe {
                let base = NonNull::new_unchecked(ptr.as_ptr().sub(8));
                SysAlloc.deallocate(base, padded);
            }
        }
    }

    #[test]
    fn fill_and_find_at_80_percent() {
        let mut map = CuckooMap::with_capacity(1024).unwrap();
        for k in 0..820 {
            map.insert(k, k * 10).unwrap();
        }
        assert_eq!(map.len(), 820);
        for k in 0..820 {
            let entry = map.find(k).unwrap_or_else(|| panic!("key {k} missing"));
            assert_eq!(map.key_at(entry), k);
            assert_eq!(map.value_at(entry), k * 10);
        }
        assert!(map.find(1000).is_none());
    }

    #[test]
    fn erase_drains_the_table() {
        let mut map = CuckooMap::with_capacity(1024).unwrap();
        for k in 0..820 {
            map.insert(k, k).unwrap();
        }
        for k in 0..820 {
            let entry = map.find(k).unwrap();
            map.erase(entry);
        }
        assert_eq!(map.len(), 0);
        assert!(map.is_empty());
        for k in 0..820 {
            assert!(map.find(k).is_none());
        }
    }

    #[test]
    fn batched_matches_fixed_vector() {
        let mut map = CuckooMap::with_capacity(4096).unwrap();
        for k in 0..3276 {
            map.insert(k, k + 1).unwrap();
        }
        let keys = [0u64, 1, 2, 3, 9999, 5, 6, 9998];
        let mut out = [None; 8];
        map.find_batched(&keys, &mut out);
        for (i, &key) in keys.iter().enumerate() {
            match out[i] {
                Some(entry) => {
                    assert!(key < 3276, "unexpected hit for {key}");
                    assert_eq!(map.key_at(entry), key);
                    assert_eq!(map.value_at(entry), key + 1);
                }
                None => assert!(key >= 3276, "missing hit for {key}"),
            }
        }
    }

    #[test]
    fn batched_equals_scalar_on_random_probes() {
        let mut rng = fastrand::Rng::with_seed(99);
        let mut map = CuckooMap::with_capacity(4096).unwrap();
        for k in 0..3000u64 {
            map.insert(k, k).unwrap();
        }
        for _ in 0..1000 {
            let keys: [u64; MAX_LOOKUP_BATCH] = std::array::from_fn(|_| rng.u64(0..6000));
            let mut out = [None; MAX_LOOKUP_BATCH];
            map.find_batched(&keys, &mut out);
            for (i, &key) in keys.iter().enumerate() {
                assert_eq!(out[i], map.find(key), "key {key}");
            }
        }
    }

    #[test]
    fn batched_accepts_short_batches() {
        let mut map = CuckooMap::with_capacity(64).unwrap();
        map.insert(1, 10).unwrap();
        map.insert(2, 20).unwrap();
        let keys = [1u64, 7, 2];
        let mut out = [None; 3];
        map.find_batched(&keys, &mut out);
        assert!(out[0].is_some());
        assert!(out[1].is_none());
        assert!(out[2].is_some());
    }

    #[test]
    fn simd_probe_matches_scalar_probe() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut map = CuckooMap::with_capacity(2048).unwrap();
        let mut keys = Vec::new();
        for _ in 0..1500 {
            let k = rng.u64(..u64::MAX - 1);
            if map.insert(k, k).is_ok() {
                keys.push(k);
            }
        }
        // Probe every bucket with present and absent keys; both search
        // flavors must locate the same slot.
        for i in 0..map.num_buckets {
            let bucket = map.bucket(i);
            for probe in [keys[0], keys[keys.len() / 2], rng.u64(..), bucket.keys[0]] {
                assert_eq!(bucket.find_simd(probe), bucket.find(probe));
            }
        }
    }

    #[test]
    fn duplicate_key_in_first_bucket() {
        let mut map = CuckooMap::with_capacity(64).unwrap();
        map.insert(42, 1).unwrap();
        assert_eq!(map.insert(42, 2), Err(Error::DuplicateKey(42)));
        assert_eq!(map.len(), 1);
        assert_eq!(map.value_at(map.find(42).unwrap()), 1);
    }

    #[test]
    fn duplicate_key_in_second_bucket() {
        // Identity hash with 2 buckets: odd keys home to bucket 1, every
        // second candidate is bucket 0. Fill bucket 1 so key 9 lands in
        // its second choice, then try to insert it again.
        let mut map = CuckooMap::with_parts(8, IdentityHash, SysAlloc).unwrap();
        for k in [1u64, 3, 5, 7] {
            map.insert(k, k).unwrap();
        }
        map.insert(9, 90).unwrap();
        assert_eq!(map.find(9).unwrap().bucket(), 0);
        assert_eq!(map.insert(9, 91), Err(Error::DuplicateKey(9)));
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn displacement_exhaustion_unwinds() {
        let mut map = CuckooMap::with_parts(4, ConstHash, SysAlloc).unwrap();
        for k in 1..=4 {
            map.insert(k, k * 100).unwrap();
        }
        assert_eq!(
            map.insert(5, 500),
            Err(Error::DisplacementExhausted {
                depth: MAX_INSERT_DEPTH
            })
        );
        // The failed insert must leave no trace.
        assert_eq!(map.len(), 4);
        assert!(map.find(5).is_none());
        for k in 1..=4 {
            assert_eq!(map.value_at(map.find(k).unwrap()), k * 100);
        }
    }

    #[test]
    fn capacity_of_one_bucket_works() {
        let mut map = CuckooMap::with_capacity(SLOTS_PER_BUCKET).unwrap();
        assert_eq!(map.capacity(), SLOTS_PER_BUCKET);
        for k in 0..SLOTS_PER_BUCKET as u64 {
            map.insert(k, k).unwrap();
        }
        assert_eq!(map.len(), SLOTS_PER_BUCKET);
        for k in 0..SLOTS_PER_BUCKET as u64 {
            let entry = map.find(k).unwrap();
            assert_eq!(map.key_at(entry), k);
            map.erase(entry);
        }
        assert!(map.is_empty());
    }

    #[test]
    fn capacity_below_one_bucket_is_rejected() {
        assert_eq!(
            CuckooMap::with_capacity(2).unwrap_err(),
            Error::InvalidCapacity(2)
        );
        assert_eq!(
            CuckooMap::with_capacity(0).unwrap_err(),
            Error::InvalidCapacity(0)
        );
    }

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let map = CuckooMap::with_capacity(1000).unwrap();
        assert_eq!(map.capacity(), 1024);
        assert_eq!(map.num_buckets, 256);
    }

    #[test]
    fn misaligned_allocator_is_rejected() {
        let err = CuckooMap::with_parts(64, Crc32cHash, MisalignedAlloc).unwrap_err();
        assert!(matches!(err, Error::Misaligned { align: 64, .. }));
    }

    #[test]
    fn bucket_array_is_cache_line_aligned() {
        let map = CuckooMap::with_capacity(256).unwrap();
        assert_eq!(map.buckets.as_ptr() as usize % CACHE_LINE, 0);
        assert!(map.num_buckets.is_power_of_two());
    }

    #[test]
    fn value_can_be_updated_in_place() {
        let mut map = CuckooMap::with_capacity(64).unwrap();
        map.insert(5, 50).unwrap();
        *map.value_at_mut(map.find(5).unwrap()) = 55;
        assert_eq!(map.value_at(map.find(5).unwrap()), 55);
    }

    #[test]
    fn load_factor_tracks_occupancy() {
        let mut map = CuckooMap::with_capacity(1024).unwrap();
        assert_eq!(map.load_factor(), 0.0);
        for k in 0..512 {
            map.insert(k, k).unwrap();
        }
        assert!((map.load_factor() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn resident_keys_sit_in_a_candidate_bucket() {
        let mut rng = fastrand::Rng::with_seed(11);
        let mut map = CuckooMap::with_capacity(1024).unwrap();
        let mut keys = Vec::new();
        while keys.len() < 700 {
            let k = rng.u64(..u64::MAX - 1);
            if map.insert(k, k).is_ok() {
                keys.push(k);
            }
        }
        let hasher = Crc32cHash;
        for &k in &keys {
            let entry = map.find(k).unwrap();
            let h = hasher.hash_key(k);
            let b1 = h as usize & map.bucket_mask;
            let b2 = hasher.hash_key(h ^ k) as usize & map.bucket_mask;
            assert!(entry.bucket() == b1 || entry.bucket() == b2, "key {k:#x}");
        }
    }

    #[test]
    fn len_counts_occupied_slots() {
        let mut rng = fastrand::Rng::with_seed(3);
        let mut map = CuckooMap::with_capacity(512).unwrap();
        for _ in 0..300 {
            let _ = map.insert(rng.u64(0..400), 0);
        }
        let mut occupied = 0;
        for i in 0..map.num_buckets {
            occupied += map
                .bucket(i)
                .keys
                .iter()
                .filter(|&&k| k != EMPTY_KEY)
                .count();
        }
        assert_eq!(map.len(), occupied);
    }

    #[test]
    fn cross_check_against_std_hashmap() {
        let mut rng = fastrand::Rng::with_seed(12345);
        let mut map = CuckooMap::with_capacity(2048).unwrap();
        let mut model = HashMap::new();

        for _ in 0..1200 {
            let key = rng.u64(1..4000);
            let value = rng.u64(..);
            match map.insert(key, value) {
                Ok(()) => {
                    assert!(model.insert(key, value).is_none());
                }
                Err(Error::DuplicateKey(_)) => {
                    assert!(model.contains_key(&key));
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(map.len(), model.len());
        for _ in 0..2000 {
            let key = rng.u64(1..5000);
            let found = map.find(key).map(|e| map.value_at(e));
            assert_eq!(found, model.get(&key).copied(), "key {key}");
        }
    }

    #[test]
    fn mixed_inserts_and_erases_stay_consistent() {
        let mut rng = fastrand::Rng::with_seed(67890);
        let mut map = CuckooMap::with_capacity(512).unwrap();
        let mut model = HashMap::new();

        for _ in 0..3000 {
            let key = rng.u64(1..300);
            if rng.bool() {
                if map.insert(key, key * 2).is_ok() {
                    model.insert(key, key * 2);
                }
            } else if let Some(entry) = map.find(key) {
                map.erase(entry);
                model.remove(&key);
            }
            assert_eq!(map.len(), model.len());
        }
        for key in 1..300u64 {
            assert_eq!(
                map.find(key).map(|e| map.value_at(e)),
                model.get(&key).copied()
            );
        }
    }
}
