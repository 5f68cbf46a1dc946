use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::EnumIter;

/// Approval state of a map as stored in `osu_beatmaps.approved`.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
#[repr(i8)]
pub enum RankedStatus {
    Graveyard = -2,
    WorkInProgress = -1,
    Pending = 0,
    Ranked = 1,
    Approved = 2,
    Qualified = 3,
    Loved = 4
}

impl RankedStatus {
    pub const MIN_ACCEPTED: RankedStatus = RankedStatus::Ranked;
    pub const MAX_ACCEPTED: RankedStatus = RankedStatus::Approved;

    /// Only ranked and approved maps contribute to a rating.
    pub fn is_accepted(&self) -> bool {
        (Self::MIN_ACCEPTED..=Self::MAX_ACCEPTED).contains(self)
    }
}

impl TryFrom<i32> for RankedStatus {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            -2 => Ok(RankedStatus::Graveyard),
            -1 => Ok(RankedStatus::WorkInProgress),
            0 => Ok(RankedStatus::Pending),
            1 => Ok(RankedStatus::Ranked),
            2 => Ok(RankedStatus::Approved),
            3 => Ok(RankedStatus::Qualified),
            4 => Ok(RankedStatus::Loved),
            _ => Err(())
        }
    }
}
