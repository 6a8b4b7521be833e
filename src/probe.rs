use core::iter::FusedIterator;

/// Quadratic probing over groups.
///
/// Visits `(start + k * (k + 1) / 2) mod groups` for `k = 0, 1, ...`. With a
/// power-of-two group count the triangular numbers hit every residue exactly
/// once in the first `groups` steps, so the sequence yields each group once
/// and then ends.
#[derive(Clone, Debug)]
pub(crate) struct ProbeSeq {
    pos: usize,
    step: usize,
    mask: usize,
}

impl ProbeSeq {
    #[inline(always)]
    pub(crate) fn new(hash: u64, groups: usize) -> Self {
        debug_assert!(groups.is_power_of_two());

        let mask = groups - 1;
        Self {
            pos: hash as usize & mask,
            step: 0,
            mask,
        }
    }
}

impl Iterator for ProbeSeq {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<usize> {
        if self.step > self.mask {
            return None;
        }

        let pos = self.pos;
        self.step += 1;
        self.pos = (self.pos + self.step) & self.mask;
        Some(pos)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.mask + 1 - self.step;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ProbeSeq {}

impl FusedIterator for ProbeSeq {}
