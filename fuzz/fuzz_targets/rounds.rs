#![no_main]
use libfuzzer_sys::fuzz_target;
use treffpunkt::{slot::Available, Aggregator, SlotGrid};

fuzz_target!(|data: (SlotGrid, u8, Vec<(u8, Option<u8>, u8, u8)>)| {
    #[cfg(feature = "log")]
    let _ = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.target(),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .chain(std::io::stdout())
        .apply();

    let (grid, roster_size, events) = data;
    let expected = usize::from(roster_size) % 8 + 1;
    let roster = (0..expected).map(|p| p.to_string()).collect::<Vec<_>>();
    let mut aggregator = Aggregator::with_roster(grid, &roster).unwrap();

    for (participant, day, slot, action) in events {
        let id = &roster[usize::from(participant) % expected];
        let day = day.map(usize::from);
        let slot = usize::from(slot);

        match action % 3 {
            0 => {
                let before = aggregator.selections(id).map(|days| days.to_vec());
                if aggregator.record_selection(id, day, slot).is_ok() {
                    let once = aggregator.selections(id).map(|days| days.to_vec());
                    assert!(aggregator.record_selection(id, day, slot).is_ok());
                    assert_eq!(
                        once,
                        aggregator.selections(id).map(|days| days.to_vec()),
                        "Selecting twice should match selecting once"
                    );
                } else {
                    assert_eq!(
                        before,
                        aggregator.selections(id).map(|days| days.to_vec()),
                        "Rejected selections should not change anything"
                    );
                }
            }
            1 => {
                let _ = aggregator.toggle_selection(id, day, slot);
            }
            _ => {
                let submitted = aggregator.submitted_count();
                let repeated = aggregator.concluded_by() == Some(id.as_str());
                let counted = usize::from(!repeated && !aggregator.has_submitted(id));
                let predicted = aggregator.compute_universal_availability(expected);

                for slot in predicted.iter() {
                    assert!(
                        aggregator.participants().all(|p| p.is_available_at(slot.index)),
                        "Slot {} reported as common but somebody is missing",
                        slot
                    );
                }

                match aggregator.conclude_submission(id, expected) {
                    Some(common) => {
                        assert_eq!(submitted + counted, expected);
                        assert_eq!(common, predicted);
                        assert_eq!(aggregator.submitted_count(), 0);
                        assert_eq!(aggregator.participant_count(), expected);
                        assert!(aggregator.participants().all(|p| !p.has_selections()));
                    }
                    None => {
                        assert_eq!(aggregator.submitted_count(), submitted + counted);
                        if repeated {
                            assert_eq!(aggregator.concluded_by(), Some(id.as_str()));
                        }
                    }
                }
            }
        }
    }
});
