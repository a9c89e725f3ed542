use crate::slot::{Available, DaySlot};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Participant {
    pub id: String,
    /// One set of selected slot indices per configured day.
    selections: Vec<BTreeSet<usize>>,
}

impl Participant {
    /// Constructs a Participant with nothing selected on any of `day_count` days.
    pub fn new(id: &str, day_count: usize) -> Participant {
        Participant {
            id: id.to_string(),
            selections: vec![BTreeSet::new(); day_count.max(1)],
        }
    }

    pub fn selections(&self) -> &[BTreeSet<usize>] {
        &self.selections
    }

    /// Marks `at` as available. Returns `false` if it already was.
    ///
    /// Callers check `at` against the grid first; a day beyond the
    /// participant's sets is ignored.
    pub fn select(&mut self, at: DaySlot) -> bool {
        self.selections
            .get_mut(at.day)
            .map_or(false, |day| day.insert(at.slot))
    }

    /// Unmarks `at`. Returns `false` if it was not selected.
    pub fn deselect(&mut self, at: DaySlot) -> bool {
        self.selections
            .get_mut(at.day)
            .map_or(false, |day| day.remove(&at.slot))
    }

    pub fn is_selected(&self, at: DaySlot) -> bool {
        self.selections
            .get(at.day)
            .map_or(false, |day| day.contains(&at.slot))
    }

    /// Union of the selections over all days.
    ///
    /// # Examples
    /// ```
    /// use treffpunkt::participant::Participant;
    /// use treffpunkt::slot::DaySlot;
    ///
    /// let mut participant = Participant::new("1", 2);
    /// participant.select(DaySlot::new(0, 3));
    /// participant.select(DaySlot::new(1, 1));
    /// participant.select(DaySlot::new(1, 3));
    ///
    /// assert_eq!(participant.flattened().into_iter().collect::<Vec<_>>(), vec![1, 3]);
    /// ```
    pub fn flattened(&self) -> BTreeSet<usize> {
        self.selections.iter().flatten().copied().collect()
    }

    pub fn has_selections(&self) -> bool {
        self.selections.iter().any(|day| !day.is_empty())
    }

    /// Empties every day, keeping one set per day.
    pub fn clear(&mut self) {
        self.selections.iter_mut().for_each(BTreeSet::clear);
    }
}

impl Available for Participant {
    /// A slot counts if it was picked on any day.
    fn is_available_at(&self, slot: usize) -> bool {
        self.selections.iter().any(|day| day.contains(&slot))
    }
}
