//! # Interval Normalization
//!
//! Turns a raw, arbitrarily overlapping memory map into disjoint intervals.
//!
//! ## Entry Points
//!
//! | Function                        | Output                               | Storage          |
//! |---------------------------------|--------------------------------------|------------------|
//! | `find_free_ram_intervals`       | maximal free RAM runs                | none             |
//! | `find_free_ram_intervals_in`    | same, over several source arrays     | none             |
//! | `find_normalized_ranges`        | full partition, every kind           | `scratch_len(n)` |
//!
//! ## Free RAM Sweep
//!
//! ```text
//!  position  0   20  40  60  80
//!  reserved  RR    RR
//!  free RAM   FF FFFFFFFF
//!  periph                PPPP
//!  output      F FF  FFFF
//! ```
//!
//! Ranges are visited in `(address, end)` order while two intervals are
//! tracked: the free RAM `candidate` and the `non_ram` union. Because of the
//! sort order, a range that is lexicographically past the candidate stays past
//! it, so a candidate is final as soon as a disjoint free range shows up.
//!
//! ## Partition Sweep
//!
//! Every non-empty range contributes a start and an end event. Events are
//! sorted by position with ends before starts, then swept twice: once to
//! reject conflicting overlaps, once to emit merged pieces. Overlaps that are
//! not conflicts resolve as `extended > peripheral > reserved > free RAM`.

use core::mem::size_of;

use crate::error::{NormalizeError, NormalizeResult};
use crate::kind::MemoryKind;
use crate::range::MemoryRange;

/// Maximum number of source arrays `find_free_ram_intervals_in` merges
pub const MAX_SOURCES: usize = 16;

// =============================================================================
// SPAN
// =============================================================================

/// Untyped half-open interval used by the free RAM sweep
#[derive(Debug, Clone, Copy)]
struct Span {
    start: u64,
    end: u64,
}

impl Span {
    const EMPTY: Self = Self { start: 0, end: 0 };

    fn of(range: &MemoryRange) -> Self {
        Self {
            start: range.address,
            end: range.end(),
        }
    }

    fn is_empty(self) -> bool {
        self.start >= self.end
    }

    fn intersects(self, other: Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    /// Intersecting or adjacent
    fn touches(self, other: Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start <= other.end && other.start <= self.end
    }

    fn merge(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    fn free_ram(self) -> MemoryRange {
        MemoryRange::from_bounds(self.start, self.end, MemoryKind::FreeRam)
    }
}

// =============================================================================
// FREE RAM EXTRACTION
// =============================================================================

/// Visit the maximal free RAM intervals of `ranges`
///
/// Sorts `ranges` in place. Every kind other than `FreeRam` masks RAM.
/// `visit` returning `false` stops the sweep.
pub fn find_free_ram_intervals<F>(ranges: &mut [MemoryRange], visit: F)
where
    F: FnMut(MemoryRange) -> bool,
{
    ranges.sort_unstable_by_key(MemoryRange::sort_key);
    sweep_free_ram(ranges.iter().copied(), visit);
}

/// Visit the maximal free RAM intervals of several source arrays
///
/// Each source is sorted in place and the sources are merged on the fly, so
/// the result is the same as for their concatenation.
pub fn find_free_ram_intervals_in<S, F>(sources: &mut [S], visit: F)
where
    S: AsMut<[MemoryRange]> + AsRef<[MemoryRange]>,
    F: FnMut(MemoryRange) -> bool,
{
    assert!(
        sources.len() <= MAX_SOURCES,
        "at most {MAX_SOURCES} range sources are supported"
    );
    for source in sources.iter_mut() {
        source.as_mut().sort_unstable_by_key(MemoryRange::sort_key);
    }
    sweep_free_ram(MergedRanges::new(sources), visit);
}

fn sweep_free_ram<I, F>(ranges: I, mut visit: F)
where
    I: Iterator<Item = MemoryRange>,
    F: FnMut(MemoryRange) -> bool,
{
    let mut candidate = Span::EMPTY;
    let mut non_ram = Span::EMPTY;

    for range in ranges {
        if range.is_empty() {
            continue;
        }
        let mut current = Span::of(&range);

        if range.kind.is_free_ram() {
            // The head of an overlap with non_ram is already accounted for
            if current.intersects(non_ram) {
                current.start = current.start.max(non_ram.end);
                if current.is_empty() {
                    continue;
                }
            }

            if candidate.touches(current) {
                candidate = candidate.merge(current);
            } else {
                if !candidate.is_empty() && !visit(candidate.free_ram()) {
                    return;
                }
                candidate = current;
            }
        } else {
            if current.intersects(candidate) {
                let head = Span {
                    start: candidate.start,
                    end: current.start,
                };
                if !head.is_empty() && !visit(head.free_ram()) {
                    return;
                }
                candidate = Span {
                    start: current.end,
                    end: candidate.end,
                };
                if candidate.is_empty() {
                    candidate = Span::EMPTY;
                }
            }

            non_ram = if non_ram.touches(current) {
                non_ram.merge(current)
            } else {
                current
            };
        }
    }

    if !candidate.is_empty() {
        visit(candidate.free_ram());
    }
}

/// K-way merge of individually sorted sources in `(address, end)` order
struct MergedRanges<'a, S> {
    sources: &'a [S],
    cursors: [usize; MAX_SOURCES],
}

impl<'a, S: AsRef<[MemoryRange]>> MergedRanges<'a, S> {
    fn new(sources: &'a [S]) -> Self {
        Self {
            sources,
            cursors: [0; MAX_SOURCES],
        }
    }
}

impl<S: AsRef<[MemoryRange]>> Iterator for MergedRanges<'_, S> {
    type Item = MemoryRange;

    fn next(&mut self) -> Option<Self::Item> {
        let mut best: Option<(usize, MemoryRange)> = None;

        for (i, source) in self.sources.iter().enumerate() {
            if let Some(range) = source.as_ref().get(self.cursors[i]) {
                let better = match best {
                    Some((_, current)) => range.sort_key() < current.sort_key(),
                    None => true,
                };
                if better {
                    best = Some((i, *range));
                }
            }
        }

        let (i, range) = best?;
        self.cursors[i] += 1;
        Some(range)
    }
}

// =============================================================================
// FULL PARTITION
// =============================================================================

/// One boundary of an input range in the partition sweep
///
/// Two pointer-sized words; `scratch_len(n)` of them make up the `4 * n`
/// word scratch area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct SweepEvent {
    position: u64,
    /// `(input index << 1) | is_start`
    tag: usize,
}

impl SweepEvent {
    const fn start(position: u64, index: usize) -> Self {
        Self {
            position,
            tag: (index << 1) | 1,
        }
    }

    const fn end(position: u64, index: usize) -> Self {
        Self {
            position,
            tag: index << 1,
        }
    }

    const fn index(self) -> usize {
        self.tag >> 1
    }

    const fn is_start(self) -> bool {
        self.tag & 1 == 1
    }

    /// Ends sort before starts at the same position, so touching ranges never overlap
    const fn key(self) -> (u64, bool) {
        (self.position, self.is_start())
    }
}

/// Scratch events needed to partition `n` input ranges
#[inline]
pub const fn scratch_len(n: usize) -> usize {
    2 * n
}

/// Scratch bytes needed to partition `n` input ranges
#[inline]
pub const fn scratch_bytes(n: usize) -> usize {
    scratch_len(n) * size_of::<SweepEvent>()
}

/// Kinds covering the current sweep position
#[derive(Debug, Default)]
struct Coverage {
    free_ram: usize,
    reserved: usize,
    peripheral: usize,
    extended: usize,
    last_extended: Option<MemoryKind>,
}

impl Coverage {
    fn apply(&mut self, kind: MemoryKind, starts: bool) {
        let counter = match kind {
            MemoryKind::FreeRam => &mut self.free_ram,
            MemoryKind::Reserved => &mut self.reserved,
            MemoryKind::Peripheral => &mut self.peripheral,
            MemoryKind::Extended(_) => &mut self.extended,
            MemoryKind::PoolBookkeeping | MemoryKind::NullPointerRegion => return,
        };
        if starts {
            *counter += 1;
        } else {
            *counter -= 1;
        }

        if kind.is_extended() {
            self.last_extended = if self.extended > 0 { Some(kind) } else { None };
        }
    }

    fn non_ram(&self) -> Option<MemoryKind> {
        if self.reserved > 0 {
            Some(MemoryKind::Reserved)
        } else if self.peripheral > 0 {
            Some(MemoryKind::Peripheral)
        } else {
            None
        }
    }

    fn resolve(&self) -> Option<MemoryKind> {
        if self.extended > 0 {
            self.last_extended
        } else if self.peripheral > 0 {
            Some(MemoryKind::Peripheral)
        } else if self.reserved > 0 {
            Some(MemoryKind::Reserved)
        } else if self.free_ram > 0 {
            Some(MemoryKind::FreeRam)
        } else {
            None
        }
    }
}

/// Visit a disjoint, address-ordered partition of every input kind
///
/// `scratch` must hold at least `scratch_len(n)` events where `n` is the
/// total number of input ranges. Conflicts are detected before `visit` is
/// called for the first time. `visit` returning `false` stops the sweep.
pub fn find_normalized_ranges<S, F>(
    sources: &[S],
    scratch: &mut [SweepEvent],
    mut visit: F,
) -> NormalizeResult<()>
where
    S: AsRef<[MemoryRange]>,
    F: FnMut(MemoryRange) -> bool,
{
    let total: usize = sources.iter().map(|s| s.as_ref().len()).sum();
    let required = scratch_len(total);
    if scratch.len() < required {
        return Err(NormalizeError::ScratchTooSmall {
            required,
            provided: scratch.len(),
        });
    }

    let mut count = 0;
    let mut index = 0;
    for range in sources.iter().flat_map(|s| s.as_ref()) {
        if range.kind.is_internal() {
            return Err(NormalizeError::InternalKind {
                address: range.address,
                kind: range.kind,
            });
        }
        if !range.is_empty() {
            scratch[count] = SweepEvent::start(range.address, index);
            scratch[count + 1] = SweepEvent::end(range.end(), index);
            count += 2;
        }
        index += 1;
    }

    let events = &mut scratch[..count];
    events.sort_unstable_by_key(|event| event.key());

    check_conflicts(sources, events)?;
    emit_partition(sources, events, &mut visit);
    Ok(())
}

fn range_at<S: AsRef<[MemoryRange]>>(sources: &[S], mut index: usize) -> MemoryRange {
    for source in sources {
        let source = source.as_ref();
        if index < source.len() {
            return source[index];
        }
        index -= source.len();
    }
    unreachable!("sweep event refers past the input ranges")
}

fn check_conflicts<S: AsRef<[MemoryRange]>>(
    sources: &[S],
    events: &[SweepEvent],
) -> NormalizeResult<()> {
    let mut coverage = Coverage::default();

    for event in events {
        let kind = range_at(sources, event.index()).kind;
        if event.is_start() {
            let clash = match kind {
                MemoryKind::Extended(_) => coverage.last_extended.or(coverage.non_ram()),
                MemoryKind::Reserved | MemoryKind::Peripheral => coverage.last_extended,
                _ => None,
            };
            if let Some(first) = clash {
                return Err(NormalizeError::TypeConflict {
                    address: event.position,
                    first,
                    second: kind,
                });
            }
        }
        coverage.apply(kind, event.is_start());
    }

    Ok(())
}

fn emit_partition<S, F>(sources: &[S], events: &[SweepEvent], visit: &mut F)
where
    S: AsRef<[MemoryRange]>,
    F: FnMut(MemoryRange) -> bool,
{
    let mut coverage = Coverage::default();
    let mut pending: Option<MemoryRange> = None;
    let mut i = 0;

    while i < events.len() {
        let position = events[i].position;
        while i < events.len() && events[i].position == position {
            let kind = range_at(sources, events[i].index()).kind;
            coverage.apply(kind, events[i].is_start());
            i += 1;
        }

        let Some(next) = events.get(i).map(|event| event.position) else {
            break;
        };

        match coverage.resolve() {
            Some(kind) => {
                if let Some(run) = pending.filter(|run| run.kind == kind && run.end() == position) {
                    pending = Some(MemoryRange::from_bounds(run.address, next, kind));
                } else {
                    if let Some(run) = pending.take() {
                        if !visit(run) {
                            return;
                        }
                    }
                    pending = Some(MemoryRange::from_bounds(position, next, kind));
                }
            },
            None => {
                if let Some(run) = pending.take() {
                    if !visit(run) {
                        return;
                    }
                }
            },
        }
    }

    if let Some(run) = pending {
        visit(run);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const RAM: MemoryKind = MemoryKind::FreeRam;
    const RES: MemoryKind = MemoryKind::Reserved;
    const DEV: MemoryKind = MemoryKind::Peripheral;
    const KERNEL: MemoryKind = MemoryKind::KERNEL_IMAGE;

    fn r(start: u64, end: u64, kind: MemoryKind) -> MemoryRange {
        MemoryRange::from_bounds(start, end, kind)
    }

    fn free_ram(ranges: &[MemoryRange]) -> Vec<MemoryRange> {
        let mut input = ranges.to_vec();
        let mut out = Vec::new();
        find_free_ram_intervals(&mut input, |range| {
            out.push(range);
            true
        });
        out
    }

    fn partition(ranges: &[MemoryRange]) -> NormalizeResult<Vec<MemoryRange>> {
        let mut scratch = vec![SweepEvent::default(); scratch_len(ranges.len())];
        let mut out = Vec::new();
        find_normalized_ranges(&[ranges], &mut scratch, |range| {
            out.push(range);
            true
        })?;
        Ok(out)
    }

    #[test]
    fn test_overlapping_ram_merges() {
        assert_eq!(free_ram(&[r(0, 10, RAM), r(5, 15, RAM)]), vec![r(0, 15, RAM)]);
    }

    #[test]
    fn test_ram_masked_by_reserved_and_peripheral() {
        let input = [
            r(0, 10, RES),
            r(5, 15, RAM),
            r(20, 60, RAM),
            r(30, 35, RES),
            r(35, 40, RES),
            r(60, 80, DEV),
        ];
        assert_eq!(
            free_ram(&input),
            vec![r(10, 15, RAM), r(20, 30, RAM), r(40, 60, RAM)]
        );
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let input = [r(60, 80, DEV), r(20, 60, RAM), r(0, 10, RES), r(5, 15, RAM)];
        assert_eq!(free_ram(&input), vec![r(10, 15, RAM), r(20, 60, RAM)]);
    }

    #[test]
    fn test_adjacent_ram_merges_and_empty_skipped() {
        let input = [r(0, 10, RAM), r(10, 20, RAM), r(30, 30, RAM), r(40, 50, RAM)];
        assert_eq!(free_ram(&input), vec![r(0, 20, RAM), r(40, 50, RAM)]);
    }

    #[test]
    fn test_extended_kinds_mask_ram() {
        let input = [r(0, 100, RAM), r(20, 30, KERNEL)];
        assert_eq!(free_ram(&input), vec![r(0, 20, RAM), r(30, 100, RAM)]);
    }

    #[test]
    fn test_early_exit() {
        let mut input = [r(0, 10, RAM), r(20, 30, RAM), r(40, 50, RAM)];
        let mut seen = Vec::new();
        find_free_ram_intervals(&mut input, |range| {
            seen.push(range);
            false
        });
        assert_eq!(seen, vec![r(0, 10, RAM)]);
    }

    #[test]
    fn test_range_at_top_of_memory() {
        let input = [MemoryRange::new(u64::MAX - 0xfff, 0x2000, RAM)];
        assert_eq!(free_ram(&input), vec![r(u64::MAX - 0xfff, u64::MAX, RAM)]);
    }

    #[test]
    fn test_multiple_sources_match_concatenation() {
        let mut first = [r(20, 60, RAM), r(0, 10, RES)];
        let mut second = [r(30, 40, RES), r(5, 15, RAM)];
        let mut out = Vec::new();
        let mut sources: [&mut [MemoryRange]; 2] = [&mut first, &mut second];
        find_free_ram_intervals_in(&mut sources, |range| {
            out.push(range);
            true
        });

        let expected = free_ram(&[r(20, 60, RAM), r(0, 10, RES), r(30, 40, RES), r(5, 15, RAM)]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_partition_splits_ram_around_reserved() {
        let out = partition(&[r(0, 100, RAM), r(10, 20, RES)]).unwrap();
        assert_eq!(out, vec![r(0, 10, RAM), r(10, 20, RES), r(20, 100, RAM)]);
    }

    #[test]
    fn test_partition_extended_overrides_ram() {
        let out = partition(&[r(0, 100, RAM), r(20, 30, KERNEL), r(100, 120, DEV)]).unwrap();
        assert_eq!(
            out,
            vec![r(0, 20, RAM), r(20, 30, KERNEL), r(30, 100, RAM), r(100, 120, DEV)]
        );
    }

    #[test]
    fn test_partition_precedence_and_gaps() {
        let out = partition(&[r(0, 10, RES), r(5, 15, DEV), r(20, 30, RAM), r(30, 40, RAM)]).unwrap();
        assert_eq!(out, vec![r(0, 5, RES), r(5, 15, DEV), r(20, 40, RAM)]);
    }

    #[test]
    fn test_partition_touching_extended_ranges() {
        let other = MemoryKind::BOOT_DATA;
        let out = partition(&[r(0, 10, KERNEL), r(10, 20, other), r(20, 30, KERNEL)]).unwrap();
        assert_eq!(out, vec![r(0, 10, KERNEL), r(10, 20, other), r(20, 30, KERNEL)]);
    }

    #[test]
    fn test_partition_conflicts_do_not_visit() {
        let cases = [
            [r(0, 10, KERNEL), r(5, 15, MemoryKind::BOOT_DATA)],
            [r(0, 10, KERNEL), r(5, 15, KERNEL)],
            [r(0, 10, RES), r(9, 15, KERNEL)],
            [r(5, 15, KERNEL), r(0, 6, DEV)],
        ];
        for case in cases {
            let mut scratch = vec![SweepEvent::default(); scratch_len(case.len())];
            let mut visited = false;
            let result = find_normalized_ranges(&[&case[..]], &mut scratch, |_| {
                visited = true;
                true
            });
            assert!(matches!(result, Err(NormalizeError::TypeConflict { .. })), "{case:?}");
            assert!(!visited);
        }
    }

    #[test]
    fn test_partition_rejects_internal_kinds() {
        let result = partition(&[r(0, 10, RAM), r(0, 5, MemoryKind::PoolBookkeeping)]);
        assert_eq!(
            result,
            Err(NormalizeError::InternalKind {
                address: 0,
                kind: MemoryKind::PoolBookkeeping
            })
        );
    }

    #[test]
    fn test_partition_scratch_too_small() {
        let mut scratch = [SweepEvent::default(); 3];
        let input = [r(0, 10, RAM), r(20, 30, RAM)];
        let result = find_normalized_ranges(&[&input[..]], &mut scratch, |_| true);
        assert_eq!(
            result,
            Err(NormalizeError::ScratchTooSmall {
                required: 4,
                provided: 3
            })
        );
    }

    #[test]
    fn test_partition_early_exit() {
        let mut scratch = vec![SweepEvent::default(); 4];
        let input = [r(0, 10, RAM), r(20, 30, RES)];
        let mut seen = Vec::new();
        find_normalized_ranges(&[&input[..]], &mut scratch, |range| {
            seen.push(range);
            false
        })
        .unwrap();
        assert_eq!(seen, vec![r(0, 10, RAM)]);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_scratch_is_four_words_per_range() {
        assert_eq!(size_of::<SweepEvent>(), 2 * size_of::<usize>());
        assert_eq!(scratch_bytes(3), 3 * 4 * size_of::<usize>());
    }

    /// Every placement of two ranges over six units, for every pair of basic kinds
    #[test]
    fn test_exhaustive_two_range_patterns() {
        let kinds = [RAM, RES, DEV];
        for &a_kind in &kinds {
            for &b_kind in &kinds {
                for a_start in 0..6 {
                    for a_end in a_start..=6 {
                        for b_start in 0..6 {
                            for b_end in b_start..=6 {
                                let input = [r(a_start, a_end, a_kind), r(b_start, b_end, b_kind)];
                                check_agreement(&input);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Free RAM extraction must equal the free RAM pieces of the full partition
    fn check_agreement(input: &[MemoryRange]) {
        let parts = partition(input).unwrap();
        let ram: Vec<_> = parts.iter().copied().filter(|p| p.kind == RAM).collect();
        assert_eq!(free_ram(input), ram, "input {input:?}");

        for pair in parts.windows(2) {
            assert!(pair[0].end() <= pair[1].address, "overlap in {parts:?}");
            assert!(
                pair[0].end() < pair[1].address || pair[0].kind != pair[1].kind,
                "unmerged neighbours in {parts:?}"
            );
        }

        for unit in 0..64 {
            let covered_in = input.iter().any(|range| range.contains(unit));
            let covered_out = parts.iter().filter(|range| range.contains(unit)).count();
            assert_eq!(covered_out, usize::from(covered_in), "unit {unit} in {input:?}");
        }
    }

    fn basic_range() -> impl Strategy<Value = MemoryRange> {
        (0u64..48, 0u64..16, 0usize..3).prop_map(|(start, len, kind)| {
            r(start, start + len, [RAM, RES, DEV][kind])
        })
    }

    proptest! {
        #[test]
        fn prop_free_ram_matches_partition(input in prop::collection::vec(basic_range(), 0..12)) {
            check_agreement(&input);
        }
    }
}
