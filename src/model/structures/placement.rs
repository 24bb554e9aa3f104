use crate::model::constants::PLACEMENT_SCORES;
use std::convert::TryFrom;
use strum_macros::{Display, EnumIter};

/// A finishing position at a 4-player table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, Display)]
#[repr(u8)]
pub enum Placement {
    First = 1,
    Second = 2,
    Third = 3,
    Fourth = 4
}

impl Placement {
    /// Zero-based position, used to index [`PLACEMENT_SCORES`]
    pub fn index(self) -> usize {
        self as usize - 1
    }

    pub fn score(self) -> f64 {
        PLACEMENT_SCORES[self.index()]
    }
}

impl TryFrom<i32> for Placement {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Placement::First),
            2 => Ok(Placement::Second),
            3 => Ok(Placement::Third),
            4 => Ok(Placement::Fourth),
            _ => Err(())
        }
    }
}
