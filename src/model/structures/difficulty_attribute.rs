use strum_macros::{EnumCount, EnumIter, EnumString};

/// Named difficulty attributes stored per (map, mods) in
/// `osu_beatmap_difficulty_attribs`. The discriminant doubles as the index
/// into an attribute vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, EnumCount)]
#[repr(u8)]
pub enum DifficultyAttribute {
    #[strum(serialize = "Aim")]
    Aim = 0,
    #[strum(serialize = "Speed")]
    Speed,
    #[strum(serialize = "OD")]
    OverallDifficulty,
    #[strum(serialize = "AR")]
    ApproachRate,
    #[strum(serialize = "Max combo")]
    MaxCombo,
    #[strum(serialize = "Strain")]
    Strain,
    #[strum(serialize = "Hit window 300")]
    HitWindow300,
    #[strum(serialize = "Score multiplier")]
    ScoreMultiplier,
    #[strum(serialize = "Flashlight")]
    Flashlight,
    #[strum(serialize = "Slider factor")]
    SliderFactor,
    #[strum(serialize = "Speed note count")]
    SpeedNoteCount
}

impl DifficultyAttribute {
    pub fn index(&self) -> usize {
        *self as usize
    }
}
