use core::fmt::Debug;
use core::iter::FusedIterator;

use crate::group::GROUP_SLOTS;
use crate::group::Group;
use crate::group::GroupArray;
use crate::hash::FnStrategy;
use crate::hash::Seeding;
use crate::hash::Strategy;
use crate::hash::hint;
use crate::probe::ProbeSeq;
use crate::stats::Recorder;

/// Smallest group count a table ever uses; also the initial group count.
const MIN_GROUPS: usize = 4;

/// Largest population a table of `groups` groups holds before growing: 67%
/// of its slots.
#[inline(always)]
fn max_count(groups: usize) -> usize {
    ((groups as u128 * GROUP_SLOTS as u128 * 67) / 100) as usize
}

/// Population below which a table of `groups` groups shrinks: a quarter of
/// the growth threshold, 16.75% of its slots.
#[inline(always)]
fn min_count(groups: usize) -> usize {
    ((groups as u128 * GROUP_SLOTS as u128 * 67) / 400) as usize
}

/// Groups needed to hold `entries` below the growth threshold.
#[inline]
fn groups_for(entries: usize) -> usize {
    let slots = (entries as u128 * 100 / 67) as usize;
    (slots / GROUP_SLOTS + 1).next_power_of_two().max(MIN_GROUPS)
}

/// A flat hash table of borrowed entries.
///
/// `H64` stores `&'a T` references into groups of seven slots, each group
/// exactly one cache line. It never owns, copies or drops an entry: dropping
/// the table frees only its group array, and erasing returns the reference
/// to the caller.
///
/// Hashing and equality come from a [`Strategy`]. Each lookup computes the
/// hash once, walks groups in quadratic order, and only calls the equality
/// strategy for slots whose cached hint byte matches. Erasure leaves no
/// tombstones; a sticky per-group overflow bit tells lookups when to stop.
///
/// The table grows when an insertion finds more than 67% of slots in use and
/// shrinks when an erasure leaves fewer than 16.75% in use.
///
/// An entry's hash must not change while it is stored.
///
/// # Examples
///
/// ```rust
/// use h64::BytesStrategy;
/// use h64::H64;
///
/// let help = "help".to_string();
/// let mut table = H64::new(BytesStrategy);
///
/// table.insert(&help);
/// assert_eq!(table.len(), 1);
/// assert_eq!(table.find(&"help".to_string()), Some(&help));
///
/// assert_eq!(table.erase(&help), Some(&help));
/// assert!(table.find(&help).is_none());
/// ```
pub struct H64<'a, T, S> {
    groups: GroupArray<'a, T>,
    count: usize,
    seed: u64,
    seeding: Seeding,
    strategy: S,
    stats: Recorder,
}

impl<'a, T, S> H64<'a, T, S>
where
    S: Strategy<T>,
{
    /// Creates an empty table with the minimum group count.
    ///
    /// The seed is derived from the group array's address and re-derived on
    /// every resize.
    pub fn new(strategy: S) -> Self {
        Self::with_seeding(strategy, Seeding::Address)
    }

    /// Creates an empty table that always hashes with `seed`.
    ///
    /// Physical layout then depends only on the insertion sequence, which
    /// makes probe statistics and iteration order reproducible.
    ///
    /// ```rust
    /// use h64::BytesStrategy;
    /// use h64::H64;
    ///
    /// let table: H64<'_, String, _> = H64::with_seed(BytesStrategy, 42);
    /// assert_eq!(table.seed(), 42);
    /// ```
    pub fn with_seed(strategy: S, seed: u64) -> Self {
        Self::with_seeding(strategy, Seeding::Fixed(seed))
    }

    /// Creates an empty table with the given seeding mode.
    pub fn with_seeding(strategy: S, seeding: Seeding) -> Self {
        let groups = GroupArray::new(MIN_GROUPS);
        let seed = seeding.derive(groups.addr());
        Self {
            groups,
            count: 0,
            seed,
            seeding,
            strategy,
            stats: Recorder::new(),
        }
    }

    #[inline(always)]
    fn hash(&self, entry: &T) -> u64 {
        self.strategy.hash(entry, self.seed)
    }

    /// Locates the slot holding an entry equal to `query`.
    #[inline]
    fn find_slot(&self, query: &T, hash: u64) -> Option<(usize, usize)> {
        let hint = hint(hash);
        let groups = self.groups.as_slice();

        let mut probes = 0;
        let mut compares = 0;
        let mut found = None;
        'probe: for pos in ProbeSeq::new(hash, groups.len()) {
            probes += 1;
            let group = &groups[pos];
            for slot in group.match_hint(hint) {
                compares += 1;
                if let Some(stored) = group.get(slot)
                    && self.strategy.eq(query, stored)
                {
                    found = Some((pos, slot));
                    break 'probe;
                }
            }

            // Nothing was ever pushed past a group that never filled up.
            if !group.was_full() {
                break;
            }
        }

        self.stats
            .record(|c| c.record_find(probes, compares, found.is_some()));
        found
    }

    /// First free slot along `hash`'s probe sequence.
    #[inline]
    fn place(groups: &mut GroupArray<'a, T>, stats: &Recorder, hash: u64, entry: &'a T) {
        let group_count = groups.len();
        let groups = groups.as_mut_slice();
        for (probes, pos) in ProbeSeq::new(hash, group_count).enumerate() {
            let group = &mut groups[pos];
            if !group.is_full() {
                let slot = group.first_free();
                group.insert_at(slot, entry, hint(hash));
                stats.record(|c| c.record_insert(probes + 1));
                return;
            }
        }

        // The growth threshold keeps at least a third of all slots free.
        unreachable!("no free slot in {group_count} groups");
    }

    #[inline]
    fn maybe_grow(&mut self) {
        if self.count > max_count(self.groups.len()) {
            self.grow();
        }
    }

    #[cold]
    #[inline(never)]
    fn grow(&mut self) {
        self.resize(self.groups.len() * 2);
    }

    #[cold]
    #[inline(never)]
    fn shrink(&mut self) {
        self.resize(self.groups.len() / 2);
    }

    /// Moves every entry into a fresh array of `group_count` groups.
    fn resize(&mut self, group_count: usize) {
        debug_assert!(group_count.is_power_of_two());
        debug_assert!(group_count >= MIN_GROUPS);
        debug_assert!(self.count <= max_count(group_count));

        #[cfg(feature = "stats")]
        log::debug!("resizing h64 table\n{}", self.stats());
        log::trace!(
            "resizing h64 table from {} to {} groups with {} entries",
            self.groups.len(),
            group_count,
            self.count
        );

        let mut groups = GroupArray::new(group_count);
        let seed = self.seeding.derive(groups.addr());
        for entry in self.iter() {
            let hash = self.strategy.hash(entry, seed);
            Self::place(&mut groups, &self.stats, hash, entry);
        }

        self.groups = groups;
        self.seed = seed;
    }

    /// Inserts `entry`, replacing an equal entry if there is one.
    ///
    /// Returns the replaced reference. The replaced entry's slot and hint are
    /// reused, and the count is unchanged.
    ///
    /// ```rust
    /// use h64::BytesStrategy;
    /// use h64::H64;
    ///
    /// let (a, b) = ("help".to_string(), "help".to_string());
    /// let mut table = H64::new(BytesStrategy);
    ///
    /// assert_eq!(table.insert(&a), None);
    /// assert!(core::ptr::eq(table.insert(&b).unwrap(), &a));
    /// assert_eq!(table.len(), 1);
    /// assert!(core::ptr::eq(table.find(&a).unwrap(), &b));
    /// ```
    pub fn insert(&mut self, entry: &'a T) -> Option<&'a T> {
        self.maybe_grow();

        let hash = self.hash(entry);
        if let Some((pos, slot)) = self.find_slot(entry, hash) {
            return self.groups.as_mut_slice()[pos].update_at(slot, entry);
        }

        self.stats.record(|c| c.record_hint(hint(hash)));
        Self::place(&mut self.groups, &self.stats, hash, entry);
        self.count += 1;
        None
    }

    /// Inserts `entry` without looking for an equal one first.
    ///
    /// Equal entries inserted this way are all stored and all counted;
    /// [`find`](Self::find) and [`erase`](Self::erase) reach them one at a
    /// time. Use it when the caller knows the key is new, or wants multimap
    /// behavior.
    ///
    /// ```rust
    /// use h64::BytesStrategy;
    /// use h64::H64;
    ///
    /// let (a, b) = ("dup".to_string(), "dup".to_string());
    /// let mut table = H64::new(BytesStrategy);
    ///
    /// table.insert_new(&a);
    /// table.insert_new(&b);
    /// assert_eq!(table.len(), 2);
    ///
    /// assert!(table.erase(&a).is_some());
    /// assert!(table.find(&a).is_some());
    /// ```
    pub fn insert_new(&mut self, entry: &'a T) {
        self.maybe_grow();

        let hash = self.hash(entry);
        self.stats.record(|c| c.record_hint(hint(hash)));
        Self::place(&mut self.groups, &self.stats, hash, entry);
        self.count += 1;
    }

    /// Resizes the table to hold `entries` entries without growing.
    ///
    /// Always reallocates, and may shrink the table. Requests below the
    /// current length are raised to it.
    ///
    /// ```rust
    /// use h64::BytesStrategy;
    /// use h64::H64;
    ///
    /// let mut table: H64<'_, String, _> = H64::new(BytesStrategy);
    /// table.reserve(1000);
    /// assert!(table.capacity() * 67 / 100 >= 1000);
    /// ```
    pub fn reserve(&mut self, entries: usize) {
        self.resize(groups_for(entries.max(self.count)));
    }

    /// Shrinks the group array to the smallest size that holds the current
    /// entries below the growth threshold.
    pub fn shrink_to_fit(&mut self) {
        let mut group_count = MIN_GROUPS;
        while max_count(group_count) < self.count {
            group_count *= 2;
        }
        if group_count < self.groups.len() {
            self.resize(group_count);
        }
    }

    /// Forgets every entry and returns to the minimum group count.
    ///
    /// The entries themselves are untouched; they belong to the caller.
    pub fn clear(&mut self) {
        let groups = GroupArray::new(MIN_GROUPS);
        self.seed = self.seeding.derive(groups.addr());
        self.groups = groups;
        self.count = 0;
    }

    /// Returns the stored entry equal to `query`, if any.
    ///
    /// `query` only needs to hash and compare like the stored entry; it does
    /// not have to be the same object.
    #[inline]
    pub fn find(&self, query: &T) -> Option<&'a T> {
        if self.count == 0 {
            return None;
        }

        let hash = self.hash(query);
        let (pos, slot) = self.find_slot(query, hash)?;
        self.groups.as_slice()[pos].get(slot)
    }

    /// Returns `true` if an entry equal to `query` is stored.
    #[inline]
    pub fn contains(&self, query: &T) -> bool {
        self.find(query).is_some()
    }

    /// Removes an entry equal to `query` and hands its reference back.
    ///
    /// May shrink the table. Returns `None` if no such entry is stored.
    pub fn erase(&mut self, query: &T) -> Option<&'a T> {
        if self.count == 0 {
            return None;
        }

        let hash = self.hash(query);
        let (pos, slot) = self.find_slot(query, hash)?;
        let removed = self.groups.as_mut_slice()[pos].clear_at(slot);
        self.count -= 1;

        if self.count < min_count(self.groups.len()) && self.groups.len() > MIN_GROUPS {
            self.shrink();
        }

        removed
    }
}

impl<'a, T, H, E> H64<'a, T, FnStrategy<H, E>>
where
    H: Fn(&T, u64) -> u64,
    E: Fn(&T, &T) -> bool,
{
    /// Creates an empty table from a hash closure and an equality closure.
    ///
    /// ```rust
    /// use h64::H64;
    ///
    /// let values = [1u32, 2, 3];
    /// let mut table = H64::with_fns(
    ///     |v: &u32, seed: u64| h64::byte_hash(&v.to_le_bytes(), seed),
    ///     |a: &u32, b: &u32| a == b,
    /// );
    /// table.extend(&values);
    /// assert_eq!(table.find(&2), Some(&2));
    /// ```
    pub fn with_fns(hash: H, eq: E) -> Self {
        Self::new(FnStrategy::new(hash, eq))
    }
}

impl<'a, T, S> H64<'a, T, S> {
    /// Number of stored entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if no entries are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Total slots, seven per group.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.groups.len() * GROUP_SLOTS
    }

    /// Number of allocated groups. Always a power of two, at least 4.
    #[inline]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Fraction of slots in use.
    pub fn load_factor(&self) -> f64 {
        self.count as f64 / self.capacity() as f64
    }

    /// Seed currently passed to the hash strategy.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The hash and equality strategy the table was built with.
    #[inline]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Iterates over stored entries in physical order.
    ///
    /// The order is unrelated to insertion order and changes on resize.
    /// Call `iter` again to restart.
    pub fn iter(&self) -> Iter<'_, 'a, T> {
        Iter {
            groups: self.groups.as_slice(),
            current: None,
            slots: Default::default(),
            remaining: self.count,
        }
    }

    /// Snapshot of the diagnostic counters.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> crate::Stats {
        crate::Stats::new(
            self.stats.snapshot(),
            self.group_count(),
            self.count,
            self.load_factor(),
        )
    }

    /// Zeroes the diagnostic counters.
    #[cfg(feature = "stats")]
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Number of groups visited by a lookup of an entry with hash `hash`
    /// before it either matches `query` or stops. Test-only.
    #[cfg(test)]
    fn probe_length(&self, query: &T, hash: u64) -> usize
    where
        S: Strategy<T>,
    {
        let groups = self.groups.as_slice();
        let mut probes = 0;
        for pos in ProbeSeq::new(hash, groups.len()) {
            probes += 1;
            let group = &groups[pos];
            if group
                .match_hint(hint(hash))
                .any(|slot| group.get(slot).is_some_and(|e| self.strategy.eq(query, e)))
                || !group.was_full()
            {
                break;
            }
        }
        probes
    }
}

impl<'a, T, S> Default for H64<'a, T, S>
where
    S: Strategy<T> + Default,
{
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<T, S> Debug for H64<'_, T, S>
where
    T: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, T, S> Extend<&'a T> for H64<'a, T, S>
where
    S: Strategy<T>,
{
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        for entry in iter {
            self.insert(entry);
        }
    }
}

impl<'t, 'a, T, S> IntoIterator for &'t H64<'a, T, S> {
    type Item = &'a T;
    type IntoIter = Iter<'t, 'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of an [`H64`], in group/slot order.
///
/// Created by [`H64::iter`]. Cloning it yields an independent cursor at the
/// same position.
pub struct Iter<'t, 'a, T> {
    groups: &'t [Group<'a, T>],
    current: Option<&'t Group<'a, T>>,
    slots: crate::group::BitMask,
    remaining: usize,
}

impl<T> Clone for Iter<'_, '_, T> {
    fn clone(&self) -> Self {
        Self {
            groups: self.groups,
            current: self.current,
            slots: self.slots,
            remaining: self.remaining,
        }
    }
}

impl<'a, T> Iterator for Iter<'_, 'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(group) = self.current
                && let Some(slot) = self.slots.next()
            {
                let entry = group.get(slot);
                debug_assert!(entry.is_some());
                self.remaining -= 1;
                return entry;
            }

            let (group, rest) = self.groups.split_first()?;
            self.groups = rest;
            self.current = Some(group);
            self.slots = group.occupied();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, '_, T> {}

impl<T> FusedIterator for Iter<'_, '_, T> {}
