use alloc::alloc::alloc_zeroed;
use alloc::alloc::dealloc;
use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ptr::NonNull;

/// Size of an L1 cache line, and of a [`Group`].
pub(crate) const CACHE_LINE: usize = 64;

/// Number of entry slots in a group.
pub const GROUP_SLOTS: usize = 7;

/// Status bits for slot occupancy.
const OCCUPIED_MASK: u8 = 0x7F;

/// Status bit set once a group has been full. Never cleared.
const OVERFLOW: u8 = 0x80;

/// Seven entries and their metadata, packed into one cache line.
///
/// A lookup may only stop probing at a group whose overflow bit is clear: an
/// entry is placed past a group only when that group is full, and the
/// overflow bit remembers that it once was. This replaces tombstones.
///
/// An all-zero bit pattern is a valid empty group.
#[repr(C, align(64))]
pub(crate) struct Group<'a, T> {
    /// Bits 0..7: slot `i` is occupied. Bit 7: the group has been full.
    status: u8,
    /// Top byte of each occupied slot's hash.
    hints: [u8; GROUP_SLOTS],
    entries: [Option<&'a T>; GROUP_SLOTS],
}

// The layout is independent of `T` since `T: Sized` makes `&T` a thin pointer.
#[cfg(target_pointer_width = "64")]
const _: () = assert!(core::mem::size_of::<Group<'static, u64>>() == CACHE_LINE);
const _: () = assert!(core::mem::align_of::<Group<'static, u64>>() == CACHE_LINE);

impl<'a, T> Group<'a, T> {
    /// Bitmask of occupied slots.
    #[inline(always)]
    pub(crate) fn occupied(&self) -> BitMask {
        BitMask(self.status & OCCUPIED_MASK)
    }

    #[inline(always)]
    pub(crate) fn is_full(&self) -> bool {
        self.status & OCCUPIED_MASK == OCCUPIED_MASK
    }

    #[inline(always)]
    pub(crate) fn was_full(&self) -> bool {
        self.status & OVERFLOW != 0
    }

    /// Lowest unoccupied slot. The group must not be full.
    #[inline(always)]
    pub(crate) fn first_free(&self) -> usize {
        debug_assert!(!self.is_full());
        (!self.status).trailing_zeros() as usize
    }

    #[inline(always)]
    pub(crate) fn get(&self, slot: usize) -> Option<&'a T> {
        self.entries[slot]
    }

    #[inline]
    pub(crate) fn insert_at(&mut self, slot: usize, entry: &'a T, hint: u8) {
        debug_assert!(slot < GROUP_SLOTS);
        debug_assert!(self.entries[slot].is_none());
        debug_assert!(self.status & (1 << slot) == 0);

        self.entries[slot] = Some(entry);
        self.hints[slot] = hint;
        self.status |= 1 << slot;
        if self.is_full() {
            self.status = OCCUPIED_MASK | OVERFLOW;
        }
    }

    #[inline]
    pub(crate) fn update_at(&mut self, slot: usize, entry: &'a T) -> Option<&'a T> {
        debug_assert!(slot < GROUP_SLOTS);
        debug_assert!(self.status & (1 << slot) != 0);

        self.entries[slot].replace(entry)
    }

    /// Empties an occupied slot. The overflow bit is left as is.
    #[inline]
    pub(crate) fn clear_at(&mut self, slot: usize) -> Option<&'a T> {
        debug_assert!(slot < GROUP_SLOTS);
        debug_assert!(self.status & (1 << slot) != 0);

        self.hints[slot] = 0;
        self.status &= !(1 << slot);
        self.entries[slot].take()
    }

    /// Occupied slots whose hint equals `hint`.
    #[inline(always)]
    pub(crate) fn match_hint(&self, hint: u8) -> BitMask {
        BitMask(self.hint_bits(hint) & self.status & OCCUPIED_MASK)
    }
}

// `hint_bits` sets bit `i` when `hints[i] == hint`. Bit 7 is unspecified and
// must be masked by the caller.
cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "x86_64", target_feature = "sse2"))] {
        impl<T> Group<'_, T> {
            #[inline(always)]
            fn hint_bits(&self, hint: u8) -> u8 {
                use core::arch::x86_64::*;
                // SAFETY: `Group` is `repr(C)` with `status` and `hints` as its
                // first eight bytes, so an 8-byte load from the start of the
                // group stays within it. `_mm_loadl_epi64` has no alignment
                // requirement.
                unsafe {
                    let ctrl = _mm_loadl_epi64(self as *const Self as *const __m128i);
                    let cmp = _mm_cmpeq_epi8(ctrl, _mm_set1_epi8(hint as i8));
                    // Byte 0 is the status byte; hints start at byte 1.
                    (_mm_movemask_epi8(cmp) >> 1) as u8
                }
            }
        }
    } else {
        impl<T> Group<'_, T> {
            #[inline(always)]
            fn hint_bits(&self, hint: u8) -> u8 {
                let mut bits = 0u8;
                for (i, &h) in self.hints.iter().enumerate() {
                    if h == hint {
                        bits |= 1 << i;
                    }
                }
                bits
            }
        }
    }
}

/// Set bits of a group's slot mask, lowest first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct BitMask(u8);

impl Iterator for BitMask {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let slot = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(slot)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for BitMask {}

impl FusedIterator for BitMask {}

/// A zero-initialized, cache-line aligned array of groups.
///
/// Owns its allocation but never the entries the groups point at.
pub(crate) struct GroupArray<'a, T> {
    ptr: NonNull<Group<'a, T>>,
    len: usize,
    _marker: PhantomData<Group<'a, T>>,
}

// SAFETY: A group array holds `&'a T` and nothing else that is thread-bound,
// so it may cross or be shared between threads exactly when `&'a T` may.
unsafe impl<T: Sync> Send for GroupArray<'_, T> {}
// SAFETY: See above.
unsafe impl<T: Sync> Sync for GroupArray<'_, T> {}

impl<'a, T> GroupArray<'a, T> {
    /// Allocates `len` empty groups. Aborts on allocation failure.
    pub(crate) fn new(len: usize) -> Self {
        debug_assert!(len.is_power_of_two());

        let layout = Self::layout(len);
        // SAFETY: `len` is a non-zero power of two and `Group` is 64 bytes, so
        // the layout has a non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw.cast::<Group<'a, T>>()) else {
            handle_alloc_error(layout);
        };

        Self {
            ptr,
            len,
            _marker: PhantomData,
        }
    }

    fn layout(len: usize) -> Layout {
        Layout::array::<Group<'a, T>>(len).expect("allocation size overflow")
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Address of the first group, used for seeding.
    #[inline]
    pub(crate) fn addr(&self) -> usize {
        self.ptr.as_ptr().addr()
    }

    #[inline(always)]
    pub(crate) fn as_slice(&self) -> &[Group<'a, T>] {
        // SAFETY: `ptr` points to `len` groups, zero-initialized on allocation
        // and only written through `&mut self` since. Zeroed memory is a valid
        // empty group.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline(always)]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [Group<'a, T>] {
        // SAFETY: As in `as_slice`, and `&mut self` guarantees exclusivity.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> Drop for GroupArray<'_, T> {
    fn drop(&mut self) {
        // SAFETY: `ptr` was allocated in `new` with this exact layout. Groups
        // hold only borrowed references, so nothing needs dropping first.
        unsafe {
            dealloc(self.ptr.as_ptr().cast(), Self::layout(self.len));
        }
    }
}
