use thiserror::Error;

/// Errors surfaced by table construction and mutation.
///
/// None of these are retried internally. `DuplicateKey` signals a caller
/// bug; `DisplacementExhausted` signals overload (the table is left exactly
/// as it was before the offending insert).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The key already sits in one of its two candidate buckets.
    #[error("key {0:#x} is already present")]
    DuplicateKey(u64),

    /// A cuckoo eviction chain ran out of budget without finding a free
    /// slot. The chain has been unwound.
    #[error("no free slot after {depth} displacements; table is overloaded")]
    DisplacementExhausted { depth: usize },

    /// The allocator handed back storage that is not cache-line aligned.
    #[error("bucket storage at {addr:#x} is not aligned to {align} bytes")]
    Misaligned { addr: usize, align: usize },

    /// The requested capacity does not round to a positive power-of-two
    /// bucket count.
    #[error("capacity {0} is below one bucket's worth of slots")]
    InvalidCapacity(usize),

    /// The allocator could not provide the bucket array.
    #[error("allocation of {bytes} bytes failed")]
    OutOfMemory { bytes: usize },
}
