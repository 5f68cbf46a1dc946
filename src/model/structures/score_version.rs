use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;

/// Scoring rule version of a map. Selects which hit objects count towards
/// the accuracy sub-score of the standard calculator.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ScoreVersion {
    #[default]
    V1 = 1,
    V2 = 2
}

impl ScoreVersion {
    /// Unknown versions fall back to the legacy rules.
    pub fn from_raw(v: i32) -> Self {
        ScoreVersion::try_from(v).unwrap_or_default()
    }
}

impl TryFrom<i32> for ScoreVersion {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(ScoreVersion::V1),
            2 => Ok(ScoreVersion::V2),
            _ => Err(())
        }
    }
}
