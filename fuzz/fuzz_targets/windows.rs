#![no_main]
use libfuzzer_sys::fuzz_target;
use treffpunkt::{AggregationError, Aggregator, DaySlot, SlotGrid};

fuzz_target!(|data: (SlotGrid, Vec<(u8, DaySlot)>, i16)| {
    let (grid, picks, duration) = data;
    let slots = grid.slot_count();
    let mut aggregator = Aggregator::new(grid.clone()).unwrap();

    for (participant, at) in picks {
        aggregator
            .record_selection(
                &participant.to_string(),
                Some(at.day % grid.day_count()),
                at.slot % slots,
            )
            .unwrap();
    }

    match aggregator.rank_duration_windows(duration) {
        Ok(ranked) => {
            assert!(duration >= 1 && duration as usize <= slots);
            assert!(!ranked.is_empty() && ranked.len() <= 3, "At most three windows");
            assert!(
                ranked.windows(2).all(|pair| pair[0].count > pair[1].count
                    || (pair[0].count == pair[1].count
                        && pair[0].window.start < pair[1].window.start)),
                "Windows should be sorted by count, then by start"
            );

            for score in ranked.iter() {
                assert_eq!(score.window.duration, duration as usize);
                assert!(score.window.end() <= slots);
                assert_eq!(score.start.index, score.window.start);

                let covering = aggregator
                    .participants()
                    .filter(|p| {
                        let available = p.flattened();
                        score.window.slots().all(|slot| available.contains(&slot))
                    })
                    .count();
                assert_eq!(score.count, covering, "Miscounted window {}", score.window);
            }
        }
        Err(AggregationError::InvalidDuration { .. }) => {
            assert!(duration < 1 || duration as usize > slots)
        }
        Err(e) => panic!("Unexpected error: {}", e),
    }
});
