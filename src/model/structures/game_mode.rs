use serde_repr::{Deserialize_repr, Serialize_repr};
use std::{convert::TryFrom, fmt};
use strum_macros::{EnumIter, EnumString};

/// The game variant a processor instance is responsible for.
///
/// Parsing accepts the same aliases the operators have always used on the
/// command line (`osu!`, `standard`, `fruits`, `ctb`, ...), case insensitively.
#[derive(
    Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumString
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum GameMode {
    #[strum(serialize = "osu", serialize = "osu!", serialize = "standard", serialize = "std")]
    Osu = 0,
    #[strum(serialize = "taiko", serialize = "osu!taiko")]
    Taiko = 1,
    #[strum(
        serialize = "catch",
        serialize = "osu!catch",
        serialize = "fruits",
        serialize = "ctb",
        serialize = "catchthebeat",
        serialize = "catch the beat"
    )]
    Catch = 2,
    #[strum(serialize = "mania", serialize = "osu!mania")]
    Mania = 3
}

impl GameMode {
    /// Suffix appended to per-variant table names, e.g. `osu_scores_taiko_high`.
    pub fn suffix(&self) -> &'static str {
        match self {
            GameMode::Osu => "",
            GameMode::Taiko => "_taiko",
            GameMode::Catch => "_fruits",
            GameMode::Mania => "_mania"
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GameMode::Osu => "osu!",
            GameMode::Taiko => "osu!taiko",
            GameMode::Catch => "osu!catch",
            GameMode::Mania => "osu!mania"
        }
    }

    /// Short identifier used in structured log fields.
    pub fn tag(&self) -> &'static str {
        match self {
            GameMode::Osu => "osu",
            GameMode::Taiko => "taiko",
            GameMode::Catch => "catch_the_beat",
            GameMode::Mania => "osu_mania"
        }
    }

    pub fn last_score_id_key(&self) -> String {
        format!("pp_last_score_id{}", self.suffix())
    }

    pub fn last_player_id_key(&self) -> String {
        format!("pp_last_user_id{}", self.suffix())
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i32> for GameMode {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(GameMode::Osu),
            1 => Ok(GameMode::Taiko),
            2 => Ok(GameMode::Catch),
            3 => Ok(GameMode::Mania),
            _ => Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::structures::game_mode::GameMode;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_convert_osu() {
        assert_eq!(GameMode::try_from(0), Ok(GameMode::Osu));
    }

    #[test]
    fn test_convert_taiko() {
        assert_eq!(GameMode::try_from(1), Ok(GameMode::Taiko));
    }

    #[test]
    fn test_convert_catch() {
        assert_eq!(GameMode::try_from(2), Ok(GameMode::Catch));
    }

    #[test]
    fn test_convert_mania() {
        assert_eq!(GameMode::try_from(3), Ok(GameMode::Mania));
    }

    #[test]
    fn test_convert_invalid() {
        assert_eq!(GameMode::try_from(4), Err(()));
    }

    #[test]
    fn test_enumerate() {
        let modes = GameMode::iter().collect::<Vec<_>>();
        assert_eq!(
            modes,
            vec![GameMode::Osu, GameMode::Taiko, GameMode::Catch, GameMode::Mania]
        );
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(GameMode::from_str("osu!"), Ok(GameMode::Osu));
        assert_eq!(GameMode::from_str("Standard"), Ok(GameMode::Osu));
        assert_eq!(GameMode::from_str("osu!taiko"), Ok(GameMode::Taiko));
        assert_eq!(GameMode::from_str("fruits"), Ok(GameMode::Catch));
        assert_eq!(GameMode::from_str("CTB"), Ok(GameMode::Catch));
        assert_eq!(GameMode::from_str("mania"), Ok(GameMode::Mania));
        assert!(GameMode::from_str("piano").is_err());
    }

    #[test]
    fn test_watermark_keys() {
        assert_eq!(GameMode::Osu.last_score_id_key(), "pp_last_score_id");
        assert_eq!(GameMode::Catch.last_score_id_key(), "pp_last_score_id_fruits");
        assert_eq!(GameMode::Mania.last_player_id_key(), "pp_last_user_id_mania");
    }
}
