//! Diagnostic counters.
//!
//! With the `stats` feature a table counts probe lengths, hint quality and
//! how often a hint match is confirmed by the equality strategy. The counters
//! never influence table behavior. Without the feature the recorder is
//! zero-sized and every update compiles away.

#[cfg(feature = "stats")]
use core::cell::Cell;
#[cfg(feature = "stats")]
use core::fmt;

#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(not(feature = "stats"), allow(dead_code))]
struct ProbeCounters {
    operations: u64,
    probes: u64,
    max_probes: u64,
}

impl ProbeCounters {
    #[inline(always)]
    fn record(&mut self, probes: usize) {
        self.operations += 1;
        self.probes += probes as u64;
        self.max_probes = self.max_probes.max(probes as u64);
    }
}

#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(not(feature = "stats"), allow(dead_code))]
pub(crate) struct Counters {
    hint_sum: u64,
    hint_count: u64,
    find: ProbeCounters,
    insert: ProbeCounters,
    compare_count: u64,
    equal_count: u64,
}

impl Counters {
    /// A lookup that visited `probes` groups and ran the equality strategy
    /// `compares` times, the last of which succeeded if `hit`.
    #[inline(always)]
    pub(crate) fn record_find(&mut self, probes: usize, compares: u64, hit: bool) {
        self.find.record(probes);
        self.compare_count += compares;
        self.equal_count += hit as u64;
    }

    /// A placement that visited `probes` groups to find a free slot.
    #[inline(always)]
    pub(crate) fn record_insert(&mut self, probes: usize) {
        self.insert.record(probes);
    }

    #[inline(always)]
    pub(crate) fn record_hint(&mut self, hint: u8) {
        self.hint_sum += hint as u64;
        self.hint_count += 1;
    }
}

#[cfg(feature = "stats")]
pub(crate) struct Recorder(Cell<Counters>);

#[cfg(feature = "stats")]
impl Recorder {
    pub(crate) fn new() -> Self {
        Self(Cell::new(Counters::default()))
    }

    #[inline]
    pub(crate) fn record(&self, f: impl FnOnce(&mut Counters)) {
        let mut counters = self.0.get();
        f(&mut counters);
        self.0.set(counters);
    }

    pub(crate) fn snapshot(&self) -> Counters {
        self.0.get()
    }

    pub(crate) fn reset(&self) {
        self.0.set(Counters::default());
    }
}

#[cfg(not(feature = "stats"))]
pub(crate) struct Recorder;

#[cfg(not(feature = "stats"))]
impl Recorder {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Self
    }

    #[inline(always)]
    pub(crate) fn record(&self, _f: impl FnOnce(&mut Counters)) {}
}

#[cfg(feature = "stats")]
fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Probe-length summary for one kind of operation.
#[cfg(feature = "stats")]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeStats {
    /// Number of operations recorded.
    pub operations: u64,
    /// Mean number of groups visited per operation.
    pub average_probe_length: f64,
    /// Largest number of groups any single operation visited.
    pub max_probe_length: u64,
}

#[cfg(feature = "stats")]
impl ProbeCounters {
    fn summarize(self) -> ProbeStats {
        ProbeStats {
            operations: self.operations,
            average_probe_length: ratio(self.probes, self.operations),
            max_probe_length: self.max_probes,
        }
    }
}

/// A snapshot of a table's diagnostic counters.
///
/// Counters accumulate from table creation (or the last
/// [`reset_stats`](crate::H64::reset_stats)) and survive resizes.
#[cfg(feature = "stats")]
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    /// Groups currently allocated.
    pub group_count: usize,
    /// Live entries.
    pub len: usize,
    /// `len / (group_count * 7)`.
    pub load_factor: f64,
    /// Mean hint byte over all newly placed entries. A well-distributed hash
    /// keeps this close to 127.5.
    pub average_hint: f64,
    /// Fraction of hint matches the equality strategy confirmed.
    pub hit_rate: f64,
    /// Lookups, including those performed by insert and erase.
    pub find: ProbeStats,
    /// Placements, including reinsertions during resize.
    pub insert: ProbeStats,
}

#[cfg(feature = "stats")]
impl Stats {
    pub(crate) fn new(counters: Counters, group_count: usize, len: usize, load_factor: f64) -> Self {
        Self {
            group_count,
            len,
            load_factor,
            average_hint: ratio(counters.hint_sum, counters.hint_count),
            hit_rate: ratio(counters.equal_count, counters.compare_count),
            find: counters.find.summarize(),
            insert: counters.insert.summarize(),
        }
    }

    /// Pretty-prints the statistics to stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("{self}");
    }
}

#[cfg(feature = "stats")]
impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== H64 Statistics ===")?;
        writeln!(f, "groups: {}", self.group_count)?;
        writeln!(f, "count: {}", self.len)?;
        writeln!(f, "load factor: {:.4}", self.load_factor)?;
        writeln!(f, "avg hint: {:.2}", self.average_hint)?;
        writeln!(f, "hit rate: {:.4}", self.hit_rate)?;
        for (name, probes) in [("find", &self.find), ("insert", &self.insert)] {
            writeln!(f, "{name}:")?;
            writeln!(f, "  operations: {}", probes.operations)?;
            writeln!(f, "  avg probe length: {:.3}", probes.average_probe_length)?;
            writeln!(f, "  max probe length: {}", probes.max_probe_length)?;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "stats"))]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn recorder_accumulates() {
        let recorder = Recorder::new();
        recorder.record(|c| c.record_find(1, 2, true));
        recorder.record(|c| c.record_find(3, 0, false));
        recorder.record(|c| c.record_insert(2));
        recorder.record(|c| c.record_hint(100));
        recorder.record(|c| c.record_hint(200));

        let stats = Stats::new(recorder.snapshot(), 4, 1, 1.0 / 28.0);
        assert_eq!(stats.find.operations, 2);
        assert_eq!(stats.find.max_probe_length, 3);
        assert_eq!(stats.find.average_probe_length, 2.0);
        assert_eq!(stats.insert.operations, 1);
        assert_eq!(stats.hit_rate, 0.5);
        assert_eq!(stats.average_hint, 150.0);

        recorder.reset();
        let stats = Stats::new(recorder.snapshot(), 4, 0, 0.0);
        assert_eq!(stats.find.operations, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn dump_names_every_counter() {
        let stats = Stats::new(Counters::default(), 8, 0, 0.0);
        let dump = stats.to_string();
        for label in [
            "groups: 8",
            "count: 0",
            "load factor",
            "avg hint",
            "hit rate",
            "find:",
            "insert:",
            "max probe length",
        ] {
            assert!(dump.contains(label), "missing {label:?} in\n{dump}");
        }
    }
}
