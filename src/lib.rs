pub mod aggregator;
pub mod grid;
pub mod participant;
pub mod round;
pub mod slot;

pub use aggregator::{AggregationError, Aggregator};
pub use grid::SlotGrid;
pub use participant::Participant;
pub use round::{Announcement, AnnouncementSink, EventCreationSink, Roster, Round, RoundError};
pub use slot::{DaySlot, Slot, SlotWindow, WindowScore};

#[cfg(test)]
mod tests {

    fn single_day(slots: usize) -> crate::grid::SlotGrid {
        crate::grid::SlotGrid::new(
            (0..slots).map(|s| format!("slot {}", s)).collect::<Vec<String>>(),
            vec!["Monday"],
        )
        .unwrap()
    }

    #[test]
    fn everyone_shares_one_slot() {
        use crate::aggregator::Aggregator;

        let mut aggregator =
            Aggregator::with_roster(single_day(3), vec!["a", "b", "c"]).unwrap();
        aggregator.record_selection("a", Some(0), 1).unwrap();
        aggregator.record_selection("b", Some(0), 1).unwrap();
        aggregator.record_selection("c", Some(0), 0).unwrap();
        aggregator.record_selection("c", Some(0), 1).unwrap();

        assert_eq!(
            aggregator
                .compute_universal_availability(3)
                .into_iter()
                .map(|slot| slot.index)
                .collect::<Vec<_>>(),
            vec![1]
        );
    }

    #[test]
    fn nobody_shares_a_slot() {
        use crate::aggregator::Aggregator;

        let mut aggregator =
            Aggregator::with_roster(single_day(3), vec!["a", "b", "c"]).unwrap();
        aggregator.record_selection("a", Some(0), 1).unwrap();
        aggregator.record_selection("b", Some(0), 1).unwrap();
        aggregator.record_selection("c", Some(0), 0).unwrap();

        assert_eq!(aggregator.compute_universal_availability(3), vec![]);
    }

    #[test]
    fn windows_inside_availability() {
        use crate::aggregator::Aggregator;

        let mut aggregator = Aggregator::new(single_day(5)).unwrap();
        for slot in 0..3 {
            aggregator.record_selection("a", Some(0), slot).unwrap();
        }

        let counts = aggregator
            .rank_duration_windows(2)
            .unwrap()
            .into_iter()
            .map(|score| (score.window.start, score.count))
            .collect::<Vec<_>>();

        // Windows at 2 and 3 tie at zero; only the first of them makes the cut.
        assert_eq!(counts, vec![(0, 1), (1, 1), (2, 0)]);
    }

    #[test]
    fn rejects_unusable_durations() {
        use crate::aggregator::{AggregationError, Aggregator};

        let aggregator = Aggregator::new(single_day(5)).unwrap();

        assert!(matches!(
            aggregator.rank_duration_windows(0),
            Err(AggregationError::InvalidDuration { .. })
        ));
        assert!(matches!(
            aggregator.rank_duration_windows(6),
            Err(AggregationError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn double_submit_concludes_once() {
        use crate::grid::SlotGrid;
        use crate::round::{Announcement, EventCreationSink, Round};
        use crate::slot::Slot;

        struct NoCalendar;

        impl EventCreationSink for NoCalendar {
            type Error = std::fmt::Error;

            fn create_event(&mut self, _: &Slot, _: usize) -> Result<(), Self::Error> {
                Err(std::fmt::Error)
            }
        }

        let roster = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut round = Round::start(
            SlotGrid::default(),
            roster,
            Vec::<Announcement>::new(),
            NoCalendar,
        )
        .unwrap();

        for id in ["a", "b", "c"].iter() {
            round.slot_selected(id, Some(3), 0).unwrap();
        }

        assert!(!round.submitted("a"));
        assert!(!round.submitted("b"));
        assert!(round.submitted("c"));
        assert!(!round.submitted("c"));

        assert_eq!(round.announcer().len(), 1);
        assert_eq!(
            round.announcer()[0].to_string(),
            "Everyone is available at: 09:00 AM"
        );
    }

    #[test]
    fn ranking_properties() {
        use crate::aggregator::Aggregator;

        let mut aggregator = Aggregator::new(crate::grid::SlotGrid::default()).unwrap();
        let picks = [("a", 0, 0), ("a", 1, 1), ("b", 2, 1), ("c", 4, 2), ("b", 3, 2)];
        for (id, day, slot) in picks.iter() {
            aggregator.record_selection(id, Some(*day), *slot).unwrap();
        }

        for duration in 1..=3 {
            let ranked = aggregator.rank_duration_windows(duration).unwrap();

            assert!(ranked.len() <= 3);
            assert!(ranked.windows(2).all(|pair| {
                pair[0].count > pair[1].count
                    || (pair[0].count == pair[1].count
                        && pair[0].window.start < pair[1].window.start)
            }));
        }
    }
}
