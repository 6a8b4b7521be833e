#[cfg(feature = "foldhash")]
use core::hash::BuildHasher;
#[cfg(feature = "foldhash")]
use core::hash::Hash;

/// Hash and equality operations an [`H64`](crate::H64) applies to its
/// entries.
///
/// The table calls `hash` with its current seed, which changes whenever the
/// group array is reallocated (unless the table uses [`Seeding::Fixed`]).
/// Implementations must spread their output over all 64 bits: the low bits
/// pick the first probed group and the top byte becomes the slot hint, so a
/// hash that leaves either end constant produces pathological probe lengths.
///
/// Two entries that compare equal under `eq` must hash identically for every
/// seed, and an entry's hash must not change while it is stored.
pub trait Strategy<T: ?Sized> {
    /// Hashes `entry` under `seed`.
    fn hash(&self, entry: &T, seed: u64) -> u64;

    /// Returns `true` if `a` and `b` denote the same key.
    fn eq(&self, a: &T, b: &T) -> bool;
}

/// A [`Strategy`] built from a pair of closures.
///
/// Usually created through [`H64::with_fns`](crate::H64::with_fns).
#[derive(Clone, Copy, Debug)]
pub struct FnStrategy<H, E> {
    hash: H,
    eq: E,
}

impl<H, E> FnStrategy<H, E> {
    /// Bundles a hash closure and an equality closure.
    pub const fn new(hash: H, eq: E) -> Self {
        Self { hash, eq }
    }
}

impl<T, H, E> Strategy<T> for FnStrategy<H, E>
where
    T: ?Sized,
    H: Fn(&T, u64) -> u64,
    E: Fn(&T, &T) -> bool,
{
    #[inline(always)]
    fn hash(&self, entry: &T, seed: u64) -> u64 {
        (self.hash)(entry, seed)
    }

    #[inline(always)]
    fn eq(&self, a: &T, b: &T) -> bool {
        (self.eq)(a, b)
    }
}

/// Hashes the byte view of an entry with [`byte_hash`] and compares entries
/// with `PartialEq`.
///
/// Suitable for strings and byte buffers:
///
/// ```rust
/// use h64::BytesStrategy;
/// use h64::H64;
///
/// let words = ["help".to_string(), "me".to_string()];
/// let mut table = H64::new(BytesStrategy);
/// table.extend(&words);
///
/// assert_eq!(table.find(&"help".to_string()), Some(&words[0]));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesStrategy;

impl<T> Strategy<T> for BytesStrategy
where
    T: AsRef<[u8]> + PartialEq + ?Sized,
{
    #[inline]
    fn hash(&self, entry: &T, seed: u64) -> u64 {
        byte_hash(entry.as_ref(), seed)
    }

    #[inline]
    fn eq(&self, a: &T, b: &T) -> bool {
        a == b
    }
}

/// Uses the entry's [`Hash`] and [`Eq`] implementations, hashing with a
/// foldhash hasher keyed by the table seed.
#[cfg(feature = "foldhash")]
#[derive(Clone, Copy, Debug, Default)]
pub struct StdStrategy;

#[cfg(feature = "foldhash")]
impl<T> Strategy<T> for StdStrategy
where
    T: Hash + Eq + ?Sized,
{
    #[inline]
    fn hash(&self, entry: &T, seed: u64) -> u64 {
        foldhash::fast::FixedState::with_seed(seed).hash_one(entry)
    }

    #[inline]
    fn eq(&self, a: &T, b: &T) -> bool {
        a == b
    }
}

/// Where a table takes the seed it passes to [`Strategy::hash`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Seeding {
    /// Derive a fresh seed from the address of every newly allocated group
    /// array. Two tables, or one table before and after a resize, hash the
    /// same entry differently. This is a probe-distribution perturbation, not
    /// a defense against a determined adversary.
    #[default]
    Address,
    /// Use the given seed for the lifetime of the table. Makes physical
    /// layout and probe statistics reproducible across runs.
    Fixed(u64),
}

impl Seeding {
    #[inline]
    pub(crate) fn derive(self, groups_addr: usize) -> u64 {
        match self {
            Seeding::Address => mix64(groups_addr as u64),
            Seeding::Fixed(seed) => seed,
        }
    }
}

/// Avalanche mixer used to turn an address into a seed.
#[inline]
pub(crate) fn mix64(mut n: u64) -> u64 {
    const Z: u64 = 0x9FB2_1C65_1E98_DF25;

    n ^= n.rotate_left(49) ^ n.rotate_left(24);
    n = n.wrapping_mul(Z);
    n ^= n >> 35;
    n = n.wrapping_mul(Z);
    n ^= n >> 28;
    n
}

/// The per-slot hint for a hash: its most significant byte.
#[inline(always)]
pub(crate) fn hint(hash: u64) -> u8 {
    (hash >> 56) as u8
}

/// MurmurHash64A over `key`, keyed by `seed`.
///
/// Eight-byte blocks are read little-endian. Good enough for most
/// [`Strategy`] implementations; not cryptographic.
///
/// ```rust
/// let a = h64::byte_hash(b"help", 0);
/// let b = h64::byte_hash(b"help", 1);
/// assert_ne!(a, b);
/// ```
pub fn byte_hash(key: &[u8], seed: u64) -> u64 {
    const M: u64 = 0xC6A4_A793_5BD1_E995;
    const R: u32 = 47;

    let mut h = seed ^ (key.len() as u64).wrapping_mul(M);

    let mut blocks = key.chunks_exact(8);
    for block in &mut blocks {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(block);

        let mut k = u64::from_le_bytes(buf);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h ^= k;
        h = h.wrapping_mul(M);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        for (i, &byte) in tail.iter().enumerate() {
            h ^= (byte as u64) << (8 * i);
        }
        h = h.wrapping_mul(M);
    }

    h ^= h >> R;
    h = h.wrapping_mul(M);
    h ^= h >> R;
    h
}
