use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One bookable unit of time: its position in the grid plus its display label.
/// Labels are opaque, nothing here parses them into timestamps.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Slot {
    pub index: usize,
    pub label: String,
}

impl Slot {
    pub fn new(index: usize, label: &str) -> Slot {
        Slot {
            index,
            label: label.to_string(),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// A slot qualified by the day it was picked on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct DaySlot {
    pub day: usize,
    pub slot: usize,
}

impl DaySlot {
    pub fn new(day: usize, slot: usize) -> DaySlot {
        DaySlot { day, slot }
    }
}

/// Contiguous run of `duration` slots beginning at `start`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotWindow {
    pub start: usize,
    pub duration: usize,
}

impl SlotWindow {
    pub fn new(start: usize, duration: usize) -> SlotWindow {
        SlotWindow { start, duration }
    }

    /// Exclusive end of the window.
    pub fn end(self) -> usize {
        self.start + self.duration
    }

    pub fn slots(self) -> Range<usize> {
        self.start..self.end()
    }
}

impl fmt::Display for SlotWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

/// A window together with how many participants can make all of it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindowScore {
    /// The slot the window starts on, used as its label.
    pub start: Slot,
    pub window: SlotWindow,
    pub count: usize,
}

impl fmt::Display for WindowScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} available)", self.start, self.count)
    }
}

pub trait Available {
    fn is_available_at(&self, slot: usize) -> bool;

    /// Every slot of `window` is available.
    fn covers(&self, window: SlotWindow) -> bool {
        window.slots().all(|slot| self.is_available_at(slot))
    }
}

impl Available for BTreeSet<usize> {
    /// # Examples
    /// ```
    /// use std::collections::BTreeSet;
    /// use treffpunkt::slot::{Available, SlotWindow};
    ///
    /// let free: BTreeSet<usize> = vec![0, 1, 2].into_iter().collect();
    ///
    /// assert!(free.covers(SlotWindow::new(0, 2)));
    /// assert!(free.covers(SlotWindow::new(1, 2)));
    /// assert!(!free.covers(SlotWindow::new(2, 2)));
    /// ```
    fn is_available_at(&self, slot: usize) -> bool {
        self.contains(&slot)
    }
}

pub trait Windowed {
    fn windowed(self, duration: usize) -> Vec<SlotWindow>;
}

impl Windowed for Range<usize> {
    /// Splits a range of slot indices into every window of `duration`
    /// consecutive slots, in order of their start.
    ///
    /// # Example
    /// ```
    /// use treffpunkt::slot::{SlotWindow, Windowed};
    ///
    /// assert_eq!(
    ///     (0..4).windowed(3),
    ///     vec![SlotWindow::new(0, 3), SlotWindow::new(1, 3)]
    /// );
    /// assert!((0..2).windowed(3).is_empty());
    /// assert!((0..2).windowed(0).is_empty());
    /// ```
    fn windowed(self, duration: usize) -> Vec<SlotWindow> {
        if duration == 0 || self.len() < duration {
            return vec![];
        }

        (self.start..=self.end - duration)
            .map(|start| SlotWindow::new(start, duration))
            .collect()
    }
}
