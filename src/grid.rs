use crate::aggregator::AggregationError;
use crate::slot::{DaySlot, Slot};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const DEFAULT_SLOTS: [&str; 3] = ["09:00 AM", "10:00 AM", "11:00 AM"];
const DEFAULT_DAYS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

/// The fixed, ordered time slots participants can pick from, optionally
/// qualified by an ordered list of days.
///
/// A grid without days is the flat variant: it behaves as a single unlabeled
/// day and selections are made with `day = None`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotGrid {
    pub slots: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub days: Vec<String>,
}

impl Default for SlotGrid {
    fn default() -> Self {
        SlotGrid {
            slots: DEFAULT_SLOTS.iter().map(|s| s.to_string()).collect(),
            days: DEFAULT_DAYS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

#[cfg(feature = "arbitrary")]
impl<'a> arbitrary::Arbitrary<'a> for SlotGrid {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let slots = u.int_in_range(1..=24_u8)?;
        let days = u.int_in_range(0..=7_u8)?;
        Ok(SlotGrid {
            slots: (0..slots).map(|s| format!("{:02}:00", s)).collect(),
            days: (0..days).map(|d| format!("Day {}", d + 1)).collect(),
        })
    }
}

impl SlotGrid {
    /// Constructs a grid from slot labels and day labels.
    ///
    /// # Examples
    /// ```
    /// use treffpunkt::grid::SlotGrid;
    ///
    /// let flat = SlotGrid::new(vec!["Morning", "Noon"], Vec::<String>::new()).unwrap();
    /// assert_eq!(flat.slot_count(), 2);
    /// assert_eq!(flat.day_count(), 1);
    /// assert!(flat.is_flat());
    ///
    /// assert!(SlotGrid::new(Vec::<String>::new(), vec!["Monday"]).is_err());
    /// ```
    pub fn new<S, D>(slots: Vec<S>, days: Vec<D>) -> Result<Self, AggregationError>
    where
        S: Into<String>,
        D: Into<String>,
    {
        let grid = SlotGrid {
            slots: slots.into_iter().map(Into::into).collect(),
            days: days.into_iter().map(Into::into).collect(),
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Deserialized grids skip `new`, so the aggregator checks again.
    pub fn validate(&self) -> Result<(), AggregationError> {
        if self.slots.is_empty() {
            Err(AggregationError::EmptyGrid)
        } else {
            Ok(())
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of selection sets each participant carries. The flat variant
    /// still has one.
    pub fn day_count(&self) -> usize {
        self.days.len().max(1)
    }

    pub fn is_flat(&self) -> bool {
        self.days.is_empty()
    }

    pub fn day_label(&self, day: usize) -> Option<&str> {
        self.days.get(day).map(String::as_str)
    }

    /// Labelled slot at `index`, if it exists.
    pub fn slot(&self, index: usize) -> Option<Slot> {
        self.slots.get(index).map(|label| Slot::new(index, label))
    }

    pub fn check_slot(&self, slot: usize) -> Result<usize, AggregationError> {
        if slot < self.slot_count() {
            Ok(slot)
        } else {
            Err(AggregationError::SlotOutOfRange {
                slot,
                slots: self.slot_count(),
            })
        }
    }

    /// Grid variants need an explicit day. Flat grids accept `None` or `0`.
    pub fn check_day(&self, day: Option<usize>) -> Result<usize, AggregationError> {
        match day {
            None if self.is_flat() => Ok(0),
            None => Err(AggregationError::DayRequired {
                days: self.days.len(),
            }),
            Some(day) if day < self.day_count() => Ok(day),
            Some(day) => Err(AggregationError::DayOutOfRange {
                day,
                days: self.day_count(),
            }),
        }
    }

    /// Checks both indices against the grid.
    ///
    /// # Examples
    /// ```
    /// use treffpunkt::{grid::SlotGrid, slot::DaySlot};
    ///
    /// let grid = SlotGrid::default();
    /// assert_eq!(grid.resolve(Some(4), 2), Ok(DaySlot::new(4, 2)));
    /// assert!(grid.resolve(Some(5), 0).is_err());
    /// assert!(grid.resolve(Some(0), 3).is_err());
    /// assert!(grid.resolve(None, 0).is_err());
    /// ```
    pub fn resolve(&self, day: Option<usize>, slot: usize) -> Result<DaySlot, AggregationError> {
        Ok(DaySlot::new(self.check_day(day)?, self.check_slot(slot)?))
    }
}
