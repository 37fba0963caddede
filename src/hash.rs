//! Key hashing.
//!
//! The tables derive both candidate buckets from a single hash value:
//! `b1 = h & mask` and `b2 = hash(h ^ key) & mask`. That second derivation
//! re-feeds the hash function, so implementations must avalanche well in the
//! low bits and under XOR with the key.

use cfg_if::cfg_if;

/// Hash over table keys.
///
/// Must be deterministic and stateless: the table recomputes hashes during
/// displacement and relies on both calls agreeing.
pub trait TableHash {
    fn hash_key(&self, key: u64) -> u64;
}

/// CRC32C of the key, replicated into both 32-bit halves of the result.
///
/// The replication spreads the CRC's entropy across the low bits (used for
/// `h & mask`) and the high bits (folded into the second derivation). Uses
/// the hardware CRC32C instruction where the target has one, and a
/// table-driven software CRC with identical output everywhere else.
#[derive(Clone, Copy, Debug, Default)]
pub struct Crc32cHash;

impl TableHash for Crc32cHash {
    #[inline(always)]
    fn hash_key(&self, key: u64) -> u64 {
        let crc = crc32c_u64(0, key);
        (crc as u64) << 32 | crc as u64
    }
}

/// Multiply-fold hash: XOR the seed in, widen-multiply by an odd constant,
/// fold the 128-bit product onto itself.
///
/// Cheaper than CRC on targets without a CRC instruction, and mixes well
/// enough for the two-choice derivation. The default seed is fixed so the
/// hash stays deterministic across runs.
#[derive(Clone, Copy, Debug)]
pub struct FoldHash {
    seed: u64,
}

const FOLD: u64 = 0x2d35_8dcc_aa6c_78a5;

impl FoldHash {
    pub const fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

impl Default for FoldHash {
    fn default() -> Self {
        Self::with_seed(0x9e37_79b9_7f4a_7c15)
    }
}

impl TableHash for FoldHash {
    #[inline(always)]
    fn hash_key(&self, key: u64) -> u64 {
        let r = ((key ^ self.seed) as u128) * FOLD as u128;
        ((r >> 64) as u64) ^ (r as u64)
    }
}

#[inline(always)]
fn crc32c_u64(crc: u32, value: u64) -> u32 {
    cfg_if! {
        if #[cfg(all(target_arch = "aarch64", target_feature = "crc"))] {
            return unsafe { core::arch::aarch64::__crc32cd(crc, value) };
        } else if #[cfg(all(target_arch = "x86_64", target_feature = "sse4.2"))] {
            return unsafe { core::arch::x86_64::_mm_crc32_u64(crc as u64, value) as u32 };
        } else {
            return crc32c_u64_sw(crc, value);
        }
    }
}

// Reflected CRC32C (Castagnoli), no pre/post inversion, matching the raw
// semantics of the hardware instructions above.
static CRC32C_TABLE: [u32; 256] = crc32c_table();

const fn crc32c_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0x82f6_3b78
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

#[allow(dead_code)] // unused on targets that take the hardware path
#[inline]
fn crc32c_u64_sw(mut crc: u32, value: u64) -> u32 {
    for byte in value.to_le_bytes() {
        crc = CRC32C_TABLE[((crc ^ byte as u32) & 0xff) as usize] ^ (crc >> 8);
    }
    crc
}
