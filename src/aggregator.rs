use crate::grid::SlotGrid;
use crate::participant::Participant;
use crate::slot::{Available, DaySlot, Slot, SlotWindow, WindowScore, Windowed};
use core::fmt::Display;
use itertools::Itertools;
use log::{debug, info, trace, warn};
use num::{Integer, ToPrimitive};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

/// How many windows a duration query reports.
pub const TOP_WINDOWS: usize = 3;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum AggregationError {
    #[error("A slot grid needs at least one slot")]
    EmptyGrid,
    #[error("Cannot fit a window of {duration} slots into {slots} available slots")]
    InvalidDuration { duration: i64, slots: usize },
    #[error("Day {day} is outside of the {days} configured days")]
    DayOutOfRange { day: usize, days: usize },
    #[error("Slot {slot} is outside of the {slots} configured slots")]
    SlotOutOfRange { slot: usize, slots: usize },
    #[error("A day is required when {days} days are configured")]
    DayRequired { days: usize },
}

/// Per-round availability of every known participant, and who has
/// submitted so far.
///
/// All operations are synchronous and in memory. Anything that mutates takes
/// `&mut self`, so a completion check and the reset that follows it cannot
/// interleave with another event.
#[derive(Clone, Debug)]
pub struct Aggregator {
    grid: SlotGrid,
    table: BTreeMap<String, Participant>,
    submitted: HashSet<String>,
    /// Who completed the last round, until anything else happens.
    concluded_by: Option<String>,
}

impl Aggregator {
    pub fn new(grid: SlotGrid) -> Result<Aggregator, AggregationError> {
        grid.validate()?;
        Ok(Aggregator {
            grid,
            table: BTreeMap::new(),
            submitted: HashSet::new(),
            concluded_by: None,
        })
    }

    /// Constructs an Aggregator with an empty entry for everyone on the roster.
    ///
    /// # Examples
    /// ```
    /// use treffpunkt::{aggregator::Aggregator, grid::SlotGrid};
    ///
    /// let aggregator = Aggregator::with_roster(SlotGrid::default(), vec!["ana", "ben"]).unwrap();
    ///
    /// assert_eq!(aggregator.participant_count(), 2);
    /// assert_eq!(aggregator.selections("ana").map(|days| days.len()), Some(5));
    /// ```
    pub fn with_roster<I, S>(grid: SlotGrid, roster: I) -> Result<Aggregator, AggregationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut aggregator = Aggregator::new(grid)?;
        for id in roster {
            aggregator.register(id.as_ref());
        }
        debug!(
            "Initialized availability for {} participants",
            aggregator.table.len()
        );
        Ok(aggregator)
    }

    pub fn grid(&self) -> &SlotGrid {
        &self.grid
    }

    /// Adds `id` with empty selections. Known participants are left untouched.
    pub fn register(&mut self, id: &str) -> &mut Participant {
        let days = self.grid.day_count();
        self.table
            .entry(id.to_string())
            .or_insert_with(|| Participant::new(id, days))
    }

    /// Like `register`, but for events from someone missing from the roster.
    fn participant_mut(&mut self, id: &str) -> &mut Participant {
        if !self.table.contains_key(id) {
            info!("Registering late participant {}", id);
        }
        self.register(id)
    }

    pub fn participant_count(&self) -> usize {
        self.table.len()
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.table.values()
    }

    /// Per-day selection sets for `id`, for highlighting the picked buttons.
    pub fn selections(&self, id: &str) -> Option<&[BTreeSet<usize>]> {
        self.table.get(id).map(Participant::selections)
    }

    /// Marks `slot` (on `day`, for grids that have days) as available for `id`.
    /// Selecting twice is the same as selecting once. Returns the participant's
    /// selections after the update.
    ///
    /// # Examples
    /// ```
    /// use treffpunkt::{aggregator::Aggregator, grid::SlotGrid};
    ///
    /// let mut aggregator = Aggregator::new(SlotGrid::default()).unwrap();
    ///
    /// let days = aggregator.record_selection("ana", Some(1), 2).unwrap();
    /// assert!(days[1].contains(&2));
    ///
    /// assert!(aggregator.record_selection("ana", Some(7), 0).is_err());
    /// ```
    pub fn record_selection(
        &mut self,
        id: &str,
        day: Option<usize>,
        slot: usize,
    ) -> Result<&[BTreeSet<usize>], AggregationError> {
        let at = self.checked(id, day, slot)?;
        self.concluded_by = None;
        let participant = self.participant_mut(id);
        if participant.select(at) {
            trace!("{} selected day {} slot {}", id, at.day, at.slot);
        }
        Ok(participant.selections())
    }

    /// Unmarks a previous selection. Unknown participants are registered,
    /// same as for a selection.
    pub fn record_deselection(
        &mut self,
        id: &str,
        day: Option<usize>,
        slot: usize,
    ) -> Result<&[BTreeSet<usize>], AggregationError> {
        let at = self.checked(id, day, slot)?;
        self.concluded_by = None;
        let participant = self.participant_mut(id);
        if participant.deselect(at) {
            trace!("{} deselected day {} slot {}", id, at.day, at.slot);
        }
        Ok(participant.selections())
    }

    /// Flips a selection, returning whether it is selected afterwards.
    pub fn toggle_selection(
        &mut self,
        id: &str,
        day: Option<usize>,
        slot: usize,
    ) -> Result<bool, AggregationError> {
        let at = self.checked(id, day, slot)?;
        self.concluded_by = None;
        let participant = self.participant_mut(id);
        let selected = if participant.is_selected(at) {
            !participant.deselect(at)
        } else {
            participant.select(at)
        };
        trace!("{} toggled day {} slot {} to {}", id, at.day, at.slot, selected);
        Ok(selected)
    }

    fn checked(
        &self,
        id: &str,
        day: Option<usize>,
        slot: usize,
    ) -> Result<DaySlot, AggregationError> {
        self.grid.resolve(day, slot).map_err(|e| {
            warn!("Rejected selection from {}: {}", id, e);
            e
        })
    }

    /// Records that `id` is done selecting. Returns whether every one of the
    /// `expected` participants has now submitted.
    ///
    /// A repeated submit from whoever just completed the previous round, with
    /// no selection since, is ignored.
    ///
    /// # Examples
    /// ```
    /// use treffpunkt::{aggregator::Aggregator, grid::SlotGrid};
    ///
    /// let mut aggregator = Aggregator::with_roster(SlotGrid::default(), vec!["ana", "ben"]).unwrap();
    ///
    /// assert!(!aggregator.record_submission("ana", 2));
    /// assert!(!aggregator.record_submission("ana", 2));
    /// assert_eq!(aggregator.submitted_count(), 1);
    /// assert!(aggregator.record_submission("ben", 2));
    /// ```
    pub fn record_submission(&mut self, id: &str, expected: usize) -> bool {
        if self.concluded_by.as_deref() == Some(id) {
            debug!("Ignoring repeated submit from {}", id);
            return false;
        }
        self.concluded_by = None;
        self.participant_mut(id);
        if self.submitted.insert(id.to_string()) {
            debug!(
                "{} submitted ({} of {})",
                id,
                self.submitted.len(),
                expected
            );
        }
        self.submitted.len() == expected
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.len()
    }

    pub fn has_submitted(&self, id: &str) -> bool {
        self.submitted.contains(id)
    }

    /// The participant whose submit completed the last round, while a repeat
    /// of that submit would still be ignored.
    pub fn concluded_by(&self) -> Option<&str> {
        self.concluded_by.as_deref()
    }

    /// Number of participants a round waits for: everyone on `roster` plus
    /// anyone registered who is not on it.
    ///
    /// # Examples
    /// ```
    /// use treffpunkt::{aggregator::Aggregator, grid::SlotGrid};
    ///
    /// let mut aggregator = Aggregator::with_roster(SlotGrid::default(), vec!["ana", "ben"]).unwrap();
    /// aggregator.record_selection("late", Some(0), 0).unwrap();
    ///
    /// assert_eq!(aggregator.expected_count(&["ana", "ben"]), 3);
    /// assert_eq!(aggregator.expected_count(&["ana", "ben", "cy"]), 4);
    /// ```
    pub fn expected_count<S: AsRef<str>>(&self, roster: &[S]) -> usize {
        let roster: HashSet<&str> = roster.iter().map(|id| id.as_ref()).collect();
        roster.len()
            + self
                .table
                .keys()
                .filter(|id| !roster.contains(id.as_str()))
                .count()
    }

    /// Slots that each of the `expected` participants picked on at least one
    /// day, in grid order.
    ///
    /// Every registered participant must have picked the slot, and there must
    /// be exactly `expected` of them; an extra registrant never stands in for
    /// someone missing.
    ///
    /// # Examples
    /// ```
    /// use treffpunkt::{aggregator::Aggregator, grid::SlotGrid};
    ///
    /// let mut aggregator = Aggregator::new(SlotGrid::default()).unwrap();
    /// aggregator.record_selection("ana", Some(0), 1).unwrap();
    /// aggregator.record_selection("ben", Some(3), 1).unwrap();
    /// aggregator.record_selection("ben", Some(3), 2).unwrap();
    ///
    /// let common = aggregator.compute_universal_availability(2);
    /// assert_eq!(common.len(), 1);
    /// assert_eq!(common[0].label, "10:00 AM");
    /// ```
    pub fn compute_universal_availability(&self, expected: usize) -> Vec<Slot> {
        let common = self
            .grid
            .slots
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                self.table.len() == expected
                    && self
                        .table
                        .values()
                        .all(|participant| participant.is_available_at(*index))
            })
            .map(|(index, label)| Slot::new(index, label))
            .collect_vec();

        debug!(
            "{} of {} slots suit all {} participants",
            common.len(),
            self.grid.slot_count(),
            expected
        );
        common
    }

    /// Scores every window of `duration` consecutive slots by how many
    /// participants picked all of its slots, and returns the best three.
    ///
    /// Day boundaries are ignored: a participant's selections are flattened
    /// across days before windows are checked. Equal scores keep window order.
    ///
    /// # Errors
    /// `AggregationError::InvalidDuration` when `duration` is below one or
    /// longer than the grid.
    ///
    /// # Examples
    /// ```
    /// use treffpunkt::{aggregator::{AggregationError, Aggregator}, grid::SlotGrid};
    ///
    /// let grid = SlotGrid::new(vec!["9", "10", "11", "12"], Vec::<String>::new()).unwrap();
    /// let mut aggregator = Aggregator::new(grid).unwrap();
    /// for slot in 1..4 {
    ///     aggregator.record_selection("ana", None, slot).unwrap();
    /// }
    /// aggregator.record_selection("ben", None, 2).unwrap();
    /// aggregator.record_selection("ben", None, 3).unwrap();
    ///
    /// let ranked = aggregator.rank_duration_windows(2).unwrap();
    /// assert_eq!(
    ///     ranked.iter().map(|w| (w.start.label.as_str(), w.count)).collect::<Vec<_>>(),
    ///     vec![("11", 2), ("10", 1), ("9", 0)]
    /// );
    ///
    /// assert_eq!(
    ///     aggregator.rank_duration_windows(-1),
    ///     Err(AggregationError::InvalidDuration { duration: -1, slots: 4 })
    /// );
    /// ```
    pub fn rank_duration_windows<N>(
        &self,
        duration: N,
    ) -> Result<Vec<WindowScore>, AggregationError>
    where
        N: Integer + ToPrimitive + Display + Copy,
    {
        let duration = self.window_duration(duration)?;
        let windows = (0..self.grid.slot_count()).windowed(duration);
        let availability = self.table.values().map(Participant::flattened).collect_vec();

        #[cfg(feature = "rayon")]
        let counts: Vec<usize> = windows
            .par_iter()
            .map(|&window| Self::count_covering(&availability, window))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let counts: Vec<usize> = windows
            .iter()
            .map(|&window| Self::count_covering(&availability, window))
            .collect();

        let ranked = windows
            .into_iter()
            .zip(counts)
            .sorted_by(|(_, a), (_, b)| b.cmp(a))
            .take(TOP_WINDOWS)
            .filter_map(|(window, count)| {
                self.grid.slot(window.start).map(|start| WindowScore {
                    start,
                    window,
                    count,
                })
            })
            .collect_vec();

        debug!(
            "Best windows of {} slots: {}",
            duration,
            ranked.iter().join(", ")
        );
        Ok(ranked)
    }

    fn count_covering(availability: &[BTreeSet<usize>], window: SlotWindow) -> usize {
        availability
            .iter()
            .filter(|slots| slots.covers(window))
            .count()
    }

    fn window_duration<N>(&self, duration: N) -> Result<usize, AggregationError>
    where
        N: Integer + ToPrimitive + Display + Copy,
    {
        let slots = self.grid.slot_count();
        match duration.to_usize() {
            Some(length) if length >= 1 && length <= slots => Ok(length),
            _ => {
                warn!("Rejected window duration {} for {} slots", duration, slots);
                Err(AggregationError::InvalidDuration {
                    duration: duration.to_i64().unwrap_or(i64::MAX),
                    slots,
                })
            }
        }
    }

    /// Empties every participant's selections and forgets all submissions.
    /// Participants stay registered.
    pub fn reset_round(&mut self) {
        self.table.values_mut().for_each(Participant::clear);
        self.submitted.clear();
        self.concluded_by = None;
        info!("Reset availability for {} participants", self.table.len());
    }

    /// Records a submission and, if that completes the round, computes the
    /// common slots and resets, all in one step.
    ///
    /// Returns `None` while the round is still collecting.
    ///
    /// # Examples
    /// ```
    /// use treffpunkt::{aggregator::Aggregator, grid::SlotGrid};
    ///
    /// let mut aggregator = Aggregator::with_roster(SlotGrid::default(), vec!["ana", "ben"]).unwrap();
    /// aggregator.record_selection("ana", Some(0), 0).unwrap();
    /// aggregator.record_selection("ben", Some(4), 0).unwrap();
    ///
    /// assert_eq!(aggregator.conclude_submission("ana", 2), None);
    ///
    /// let common = aggregator.conclude_submission("ben", 2).unwrap();
    /// assert_eq!(common.len(), 1);
    /// assert_eq!(aggregator.submitted_count(), 0);
    /// ```
    pub fn conclude_submission(&mut self, id: &str, expected: usize) -> Option<Vec<Slot>> {
        if !self.record_submission(id, expected) {
            return None;
        }

        let common = self.compute_universal_availability(expected);
        info!(
            "All {} participants submitted, {} common slots",
            expected,
            common.len()
        );
        self.reset_round();
        self.concluded_by = Some(id.to_string());
        Some(common)
    }

    /// `conclude_submission`, waiting for everyone on `roster` as well as any
    /// late joiners, including `id` itself.
    pub fn conclude_roster_submission<S: AsRef<str>>(
        &mut self,
        id: &str,
        roster: &[S],
    ) -> Option<Vec<Slot>> {
        self.participant_mut(id);
        let expected = self.expected_count(roster);
        self.conclude_submission(id, expected)
    }
}

#[cfg(test)]
mod tests {
    use super::{AggregationError, Aggregator};
    use crate::grid::SlotGrid;

    fn flat(slots: usize) -> SlotGrid {
        SlotGrid::new(
            (0..slots).map(|s| format!("{}:00", 9 + s)).collect::<Vec<String>>(),
            Vec::<String>::new(),
        )
        .unwrap()
    }

    #[test]
    fn reselecting_is_idempotent() {
        let mut aggregator = Aggregator::new(SlotGrid::default()).unwrap();
        aggregator.record_selection("a", Some(2), 1).unwrap();
        let once = aggregator.selections("a").map(|days| days.to_vec());

        aggregator.record_selection("a", Some(2), 1).unwrap();

        assert_eq!(aggregator.selections("a").map(|days| days.to_vec()), once);
    }

    #[test]
    fn late_participants_are_registered() {
        let mut aggregator = Aggregator::with_roster(SlotGrid::default(), vec!["a"]).unwrap();

        aggregator.record_selection("late", Some(0), 0).unwrap();
        assert_eq!(aggregator.participant_count(), 2);

        aggregator.record_submission("later", 3);
        assert_eq!(aggregator.participant_count(), 3);
    }

    #[test]
    fn grid_variant_requires_day() {
        let mut aggregator = Aggregator::new(SlotGrid::default()).unwrap();

        assert_eq!(
            aggregator.record_selection("a", None, 0),
            Err(AggregationError::DayRequired { days: 5 })
        );
        assert_eq!(
            aggregator.record_selection("a", Some(0), 9),
            Err(AggregationError::SlotOutOfRange { slot: 9, slots: 3 })
        );
        assert_eq!(aggregator.participant_count(), 0);
    }

    #[test]
    fn toggle_and_deselect() {
        let mut aggregator = Aggregator::new(flat(3)).unwrap();

        assert_eq!(aggregator.toggle_selection("a", None, 1), Ok(true));
        assert_eq!(aggregator.toggle_selection("a", None, 1), Ok(false));
        assert_eq!(aggregator.toggle_selection("a", None, 2), Ok(true));

        let days = aggregator.record_deselection("a", None, 2).unwrap();
        assert!(days[0].is_empty());
    }

    #[test]
    fn reset_keeps_participants() {
        let mut aggregator =
            Aggregator::with_roster(SlotGrid::default(), vec!["a", "b"]).unwrap();
        aggregator.record_selection("a", Some(1), 1).unwrap();
        aggregator.record_selection("c", Some(4), 2).unwrap();
        aggregator.record_submission("a", 3);

        aggregator.reset_round();

        assert_eq!(aggregator.submitted_count(), 0);
        assert_eq!(aggregator.participant_count(), 3);
        assert!(aggregator
            .participants()
            .all(|p| p.selections().len() == 5 && !p.has_selections()));
    }

    #[test]
    fn universal_availability_needs_every_participant() {
        let mut aggregator = Aggregator::with_roster(flat(3), vec!["a", "b"]).unwrap();
        aggregator.record_selection("a", None, 0).unwrap();
        aggregator.record_selection("a", None, 2).unwrap();
        aggregator.record_selection("b", None, 2).unwrap();

        let common = aggregator.compute_universal_availability(2);
        assert_eq!(common.iter().map(|s| s.index).collect::<Vec<_>>(), vec![2]);

        // A third expected participant who never showed up.
        assert!(aggregator.compute_universal_availability(3).is_empty());
    }

    #[test]
    fn invalid_durations() {
        let aggregator = Aggregator::new(flat(5)).unwrap();

        assert_eq!(
            aggregator.rank_duration_windows(0),
            Err(AggregationError::InvalidDuration {
                duration: 0,
                slots: 5
            })
        );
        assert_eq!(
            aggregator.rank_duration_windows(6_u8),
            Err(AggregationError::InvalidDuration {
                duration: 6,
                slots: 5
            })
        );
        assert_eq!(
            aggregator.rank_duration_windows(-3_i32),
            Err(AggregationError::InvalidDuration {
                duration: -3,
                slots: 5
            })
        );
        assert!(aggregator.rank_duration_windows(5_u64).is_ok());
    }

    #[test]
    fn ranking_is_stable_and_capped() {
        let mut aggregator = Aggregator::new(flat(6)).unwrap();
        aggregator.record_selection("a", None, 4).unwrap();
        aggregator.record_selection("a", None, 5).unwrap();

        let ranked = aggregator.rank_duration_windows(1).unwrap();

        assert_eq!(
            ranked
                .iter()
                .map(|w| (w.window.start, w.count))
                .collect::<Vec<_>>(),
            vec![(4, 1), (5, 1), (0, 0)]
        );
    }

    #[test]
    fn windows_span_days() {
        let mut aggregator = Aggregator::new(SlotGrid::default()).unwrap();
        aggregator.record_selection("a", Some(0), 0).unwrap();
        aggregator.record_selection("a", Some(3), 1).unwrap();

        let ranked = aggregator.rank_duration_windows(2).unwrap();

        assert_eq!(ranked[0].window.start, 0);
        assert_eq!(ranked[0].count, 1);
    }

    #[test]
    fn conclusion_happens_once() {
        let mut aggregator =
            Aggregator::with_roster(flat(3), vec!["a", "b", "c"]).unwrap();
        for id in ["a", "b", "c"].iter() {
            aggregator.record_selection(id, None, 1).unwrap();
        }

        assert_eq!(aggregator.conclude_submission("a", 3), None);
        assert_eq!(aggregator.conclude_submission("b", 3), None);

        let concluded = aggregator.conclude_submission("c", 3);
        assert_eq!(
            concluded.map(|slots| slots.iter().map(|s| s.index).collect::<Vec<_>>()),
            Some(vec![1])
        );

        // The same click arriving again is dropped.
        assert_eq!(aggregator.conclude_submission("c", 3), None);
        assert_eq!(aggregator.submitted_count(), 0);
        assert_eq!(aggregator.concluded_by(), Some("c"));

        // Anyone else submitting opens the next round.
        assert_eq!(aggregator.conclude_submission("a", 3), None);
        assert_eq!(aggregator.concluded_by(), None);
        assert_eq!(aggregator.conclude_submission("c", 3), None);
        assert_eq!(aggregator.submitted_count(), 2);
    }

    #[test]
    fn single_participant_concludes_once() {
        let mut aggregator = Aggregator::with_roster(flat(3), vec!["a"]).unwrap();
        aggregator.record_selection("a", None, 0).unwrap();

        assert_eq!(
            aggregator
                .conclude_submission("a", 1)
                .map(|slots| slots.iter().map(|s| s.index).collect::<Vec<_>>()),
            Some(vec![0])
        );
        assert_eq!(aggregator.conclude_submission("a", 1), None);
        assert_eq!(aggregator.conclude_submission("a", 1), None);

        // A fresh pick starts a real new round.
        aggregator.record_selection("a", None, 2).unwrap();
        assert_eq!(
            aggregator
                .conclude_submission("a", 1)
                .map(|slots| slots.iter().map(|s| s.index).collect::<Vec<_>>()),
            Some(vec![2])
        );
    }

    #[test]
    fn late_joiner_never_stands_in() {
        let mut aggregator =
            Aggregator::with_roster(SlotGrid::default(), vec!["a", "b"]).unwrap();
        aggregator.record_selection("a", Some(0), 0).unwrap();
        aggregator.record_selection("x", Some(0), 0).unwrap();
        aggregator.record_selection("b", Some(0), 2).unwrap();

        assert_eq!(aggregator.expected_count(&["a", "b"]), 3);
        assert!(aggregator.compute_universal_availability(2).is_empty());
        assert!(aggregator.compute_universal_availability(3).is_empty());

        aggregator.record_selection("b", Some(1), 0).unwrap();
        assert_eq!(
            aggregator
                .compute_universal_availability(3)
                .iter()
                .map(|s| s.index)
                .collect::<Vec<_>>(),
            vec![0]
        );
    }
}
