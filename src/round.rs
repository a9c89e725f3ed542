use crate::aggregator::{AggregationError, Aggregator};
use crate::grid::SlotGrid;
use crate::slot::{Slot, WindowScore};
use core::fmt::{self, Display};
use itertools::Itertools;
use log::{info, warn};
use num::{Integer, ToPrimitive};
#[cfg(feature = "serde")]
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

/// Supplies the current non-bot participants.
pub trait Roster {
    fn participants(&self) -> Vec<String>;

    fn count(&self) -> usize {
        self.participants().len()
    }
}

impl Roster for Vec<String> {
    fn participants(&self) -> Vec<String> {
        self.clone()
    }

    fn count(&self) -> usize {
        self.len()
    }
}

/// Receives the results meant for the channel.
pub trait AnnouncementSink {
    fn announce(&mut self, announcement: &Announcement);
}

impl AnnouncementSink for Vec<Announcement> {
    fn announce(&mut self, announcement: &Announcement) {
        self.push(announcement.clone());
    }
}

/// Turns a chosen slot into a calendar event. Mapping the slot label to
/// concrete timestamps is up to the implementor.
pub trait EventCreationSink {
    type Error: std::error::Error + 'static;

    fn create_event(&mut self, start: &Slot, duration: usize) -> Result<(), Self::Error>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Announcement {
    CommonSlots(Vec<Slot>),
    NoCommonSlot,
    RankedWindows(Vec<WindowScore>),
}

impl Display for Announcement {
    /// # Examples
    /// ```
    /// use treffpunkt::round::Announcement;
    /// use treffpunkt::slot::Slot;
    ///
    /// let common = Announcement::CommonSlots(vec![Slot::new(0, "09:00 AM"), Slot::new(2, "11:00 AM")]);
    /// assert_eq!(common.to_string(), "Everyone is available at: 09:00 AM, 11:00 AM");
    /// assert_eq!(Announcement::NoCommonSlot.to_string(), "No common time found.");
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Announcement::CommonSlots(slots) => {
                write!(f, "Everyone is available at: {}", slots.iter().join(", "))
            }
            Announcement::NoCommonSlot => f.write_str("No common time found."),
            Announcement::RankedWindows(windows) => {
                f.write_str("Best times:")?;
                for (rank, window) in windows.iter().enumerate() {
                    write!(f, "\n{}. {}", rank + 1, window)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum RoundError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error("Could not create the event: {0}")]
    EventCreation(#[source] E),
    #[error("Nobody is available for {duration} consecutive slots")]
    NoWindow { duration: usize },
}

/// Wires an Aggregator to the chat platform: roster lookups, announcements
/// and event creation. One event is handled to completion before the next.
pub struct Round<R, A, C> {
    aggregator: Aggregator,
    roster: R,
    announcer: A,
    creator: C,
}

impl<R, A, C> Round<R, A, C>
where
    R: Roster,
    A: AnnouncementSink,
    C: EventCreationSink,
{
    /// Builds the availability table from the roster as it is right now.
    pub fn start(
        grid: SlotGrid,
        roster: R,
        announcer: A,
        creator: C,
    ) -> Result<Round<R, A, C>, AggregationError> {
        let aggregator = Aggregator::with_roster(grid, roster.participants())?;
        info!(
            "Collecting availability from {} participants",
            aggregator.participant_count()
        );
        Ok(Round {
            aggregator,
            roster,
            announcer,
            creator,
        })
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn announcer(&self) -> &A {
        &self.announcer
    }

    pub fn creator(&self) -> &C {
        &self.creator
    }

    /// A slot button was clicked. Returns the selections to highlight.
    pub fn slot_selected(
        &mut self,
        id: &str,
        day: Option<usize>,
        slot: usize,
    ) -> Result<&[BTreeSet<usize>], AggregationError> {
        self.aggregator.record_selection(id, day, slot)
    }

    /// The submit button was clicked. When this was the last outstanding
    /// submission the common slots are announced and the round starts over.
    ///
    /// The round waits for everyone on the roster and for anyone who joined
    /// since. Returns whether the round concluded.
    pub fn submitted(&mut self, id: &str) -> bool {
        let roster = self.roster.participants();
        match self.aggregator.conclude_roster_submission(id, &roster) {
            Some(common) if common.is_empty() => {
                self.announcer.announce(&Announcement::NoCommonSlot);
                true
            }
            Some(common) => {
                self.announcer.announce(&Announcement::CommonSlots(common));
                true
            }
            None => false,
        }
    }

    /// Someone asked for the best times to hold an event `duration` slots long.
    pub fn duration_requested<N>(
        &mut self,
        duration: N,
    ) -> Result<Vec<WindowScore>, AggregationError>
    where
        N: Integer + ToPrimitive + Display + Copy,
    {
        let ranked = self.aggregator.rank_duration_windows(duration)?;
        self.announcer.announce(&Announcement::RankedWindows(ranked.clone()));
        Ok(ranked)
    }

    /// Creates an event at the start of the best window of `duration` slots.
    pub fn create_best_event<N>(&mut self, duration: N) -> Result<Slot, RoundError<C::Error>>
    where
        N: Integer + ToPrimitive + Display + Copy,
    {
        let best = self
            .aggregator
            .rank_duration_windows(duration)?
            .into_iter()
            .next()
            .filter(|best| best.count > 0);

        match best {
            Some(best) => {
                self.creator
                    .create_event(&best.start, best.window.duration)
                    .map_err(RoundError::EventCreation)?;
                info!(
                    "Created event at {} for {} slots with {} participants",
                    best.start, best.window.duration, best.count
                );
                Ok(best.start)
            }
            None => {
                let duration = duration.to_usize().unwrap_or_default();
                warn!("No window of {} slots has anyone available", duration);
                Err(RoundError::NoWindow { duration })
            }
        }
    }
}
