//! In-bucket probe primitives.
//!
//! A probe broadcasts the needle across a vector register, compares it
//! against every slot of the bucket at once, and reduces the per-lane
//! results to a hit mask. The scalar fallbacks build the same mask with
//! plain compares, so every path returns the identical slot index.

use cfg_if::cfg_if;

/// First slot of `slots` equal to `key`, searching all four lanes at once.
#[inline(always)]
pub(crate) fn search4(key: u64, slots: &[u64; 4]) -> Option<usize> {
    cfg_if! {
        if #[cfg(all(target_arch = "aarch64", target_feature = "neon"))] {
            return unsafe { search4_neon(key, slots) };
        } else if #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))] {
            return unsafe { search4_avx2(key, slots) };
        } else {
            return search4_scalar(key, slots);
        }
    }
}

/// Eight-lane variant of [`search4`] for 32-bit keys.
#[inline(always)]
pub(crate) fn search8(key: u32, slots: &[u32; 8]) -> Option<usize> {
    cfg_if! {
        if #[cfg(all(target_arch = "aarch64", target_feature = "neon"))] {
            return unsafe { search8_neon(key, slots) };
        } else if #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))] {
            return unsafe { search8_avx2(key, slots) };
        } else {
            return search8_scalar(key, slots);
        }
    }
}

#[inline(always)]
pub(crate) fn search4_scalar(key: u64, slots: &[u64; 4]) -> Option<usize> {
    let mut mask = 0u32;
    for (i, &slot) in slots.iter().enumerate() {
        mask |= ((slot == key) as u32) << i;
    }
    (mask != 0).then(|| mask.trailing_zeros() as usize)
}

#[inline(always)]
pub(crate) fn search8_scalar(key: u32, slots: &[u32; 8]) -> Option<usize> {
    let mut mask = 0u32;
    for (i, &slot) in slots.iter().enumerate() {
        mask |= ((slot == key) as u32) << i;
    }
    (mask != 0).then(|| mask.trailing_zeros() as usize)
}

#[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
#[inline(always)]
unsafe fn search4_neon(key: u64, slots: &[u64; 4]) -> Option<usize> {
    use core::arch::aarch64::*;
    unsafe {
        let needle: uint64x2_t = vdupq_n_u64(key);
        let lo: uint64x2_t = vld1q_u64(slots.as_ptr());
        let hi: uint64x2_t = vld1q_u64(slots.as_ptr().add(2));
        let eq_lo: uint64x2_t = vceqq_u64(lo, needle);
        let eq_hi: uint64x2_t = vceqq_u64(hi, needle);
        // Narrow each 64-bit lane result to 32 bits, then weigh lane i by
        // bit i and sum across lanes to get a 4-bit hit mask.
        let hits: uint32x4_t = vcombine_u32(vmovn_u64(eq_lo), vmovn_u64(eq_hi));
        let ones: uint32x4_t = vshrq_n_u32::<31>(hits);
        let weights: int32x4_t = vld1q_s32([0i32, 1, 2, 3].as_ptr());
        let mask: u32 = vaddvq_u32(vshlq_u32(ones, weights));
        (mask != 0).then(|| mask.trailing_zeros() as usize)
    }
}

#[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
#[inline(always)]
unsafe fn search8_neon(key: u32, slots: &[u32; 8]) -> Option<usize> {
    use core::arch::aarch64::*;
    unsafe {
        let needle: uint32x4_t = vdupq_n_u32(key);
        let lo: uint32x4_t = vld1q_u32(slots.as_ptr());
        let hi: uint32x4_t = vld1q_u32(slots.as_ptr().add(4));
        let eq_lo: uint32x4_t = vceqq_u32(lo, needle);
        let eq_hi: uint32x4_t = vceqq_u32(hi, needle);
        let hits: uint16x8_t = vcombine_u16(vmovn_u32(eq_lo), vmovn_u32(eq_hi));
        let ones: uint16x8_t = vshrq_n_u16::<15>(hits);
        let weights: int16x8_t = vld1q_s16([0i16, 1, 2, 3, 4, 5, 6, 7].as_ptr());
        let mask: u16 = vaddvq_u16(vshlq_u16(ones, weights));
        (mask != 0).then(|| mask.trailing_zeros() as usize)
    }
}

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
#[inline(always)]
unsafe fn search4_avx2(key: u64, slots: &[u64; 4]) -> Option<usize> {
    use core::arch::x86_64::*;
    unsafe {
        let needle = _mm256_set1_epi64x(key as i64);
        let lanes = _mm256_loadu_si256(slots.as_ptr() as *const __m256i);
        let eq = _mm256_cmpeq_epi64(lanes, needle);
        let mask = _mm256_movemask_pd(_mm256_castsi256_pd(eq));
        (mask != 0).then(|| mask.trailing_zeros() as usize)
    }
}

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
#[inline(always)]
unsafe fn search8_avx2(key: u32, slots: &[u32; 8]) -> Option<usize> {
    use core::arch::x86_64::*;
    unsafe {
        let needle = _mm256_set1_epi32(key as i32);
        let lanes = _mm256_loadu_si256(slots.as_ptr() as *const __m256i);
        let eq = _mm256_cmpeq_epi32(lanes, needle);
        let mask = _mm256_movemask_ps(_mm256_castsi256_ps(eq));
        (mask != 0).then(|| mask.trailing_zeros() as usize)
    }
}

/// Non-blocking hint to pull the line holding `p` toward L1.
#[inline(always)]
pub(crate) fn prefetch<T>(p: *const T) {
    cfg_if! {
        if #[cfg(target_arch = "x86_64")] {
            use core::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
            unsafe { _mm_prefetch::<_MM_HINT_T0>(p as *const i8) };
        } else if #[cfg(target_arch = "aarch64")] {
            unsafe {
                core::arch::asm!(
                    "prfm pldl1keep, [{p}]",
                    p = in(reg) p,
                    options(nostack, preserves_flags),
                );
            }
        } else {
            let _ = p;
        }
    }
}
