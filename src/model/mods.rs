use serde::{Deserialize, Serialize};
use std::{
    fmt,
    ops::{BitAnd, BitOr}
};

/// Legacy modifier bitmask as stored in `enabled_mods`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mods(pub u32);

impl Mods {
    pub const NOMOD: Mods = Mods(0);
    pub const NO_FAIL: Mods = Mods(1 << 0);
    pub const EASY: Mods = Mods(1 << 1);
    pub const TOUCH_DEVICE: Mods = Mods(1 << 2);
    pub const HIDDEN: Mods = Mods(1 << 3);
    pub const HARD_ROCK: Mods = Mods(1 << 4);
    pub const SUDDEN_DEATH: Mods = Mods(1 << 5);
    pub const DOUBLE_TIME: Mods = Mods(1 << 6);
    pub const RELAX: Mods = Mods(1 << 7);
    pub const HALF_TIME: Mods = Mods(1 << 8);
    pub const NIGHTCORE: Mods = Mods(1 << 9);
    pub const FLASHLIGHT: Mods = Mods(1 << 10);
    pub const AUTOPLAY: Mods = Mods(1 << 11);
    pub const SPUN_OUT: Mods = Mods(1 << 12);
    pub const AUTOPILOT: Mods = Mods(1 << 13);
    pub const PERFECT: Mods = Mods(1 << 14);
    pub const KEY4: Mods = Mods(1 << 15);
    pub const KEY5: Mods = Mods(1 << 16);
    pub const KEY6: Mods = Mods(1 << 17);
    pub const KEY7: Mods = Mods(1 << 18);
    pub const KEY8: Mods = Mods(1 << 19);
    pub const FADE_IN: Mods = Mods(1 << 20);
    pub const RANDOM: Mods = Mods(1 << 21);
    pub const CINEMA: Mods = Mods(1 << 22);
    pub const TARGET: Mods = Mods(1 << 23);
    pub const KEY9: Mods = Mods(1 << 24);
    pub const KEY10: Mods = Mods(1 << 25);
    pub const KEY1: Mods = Mods(1 << 26);
    pub const KEY3: Mods = Mods(1 << 27);
    pub const KEY2: Mods = Mods(1 << 28);

    pub const KEY_MODS: Mods = Mods(
        Self::KEY1.0
            | Self::KEY2.0
            | Self::KEY3.0
            | Self::KEY4.0
            | Self::KEY5.0
            | Self::KEY6.0
            | Self::KEY7.0
            | Self::KEY8.0
            | Self::KEY9.0
            | Self::KEY10.0
    );

    /// Mods that change difficulty attributes. Everything else only affects
    /// scoring and is stripped before a difficulty lookup.
    pub const DIFFICULTY_RELEVANT: Mods = Mods(
        Self::DOUBLE_TIME.0 | Self::HALF_TIME.0 | Self::HARD_ROCK.0 | Self::EASY.0 | Self::FLASHLIGHT.0 | Self::KEY_MODS.0
    );

    /// Mods that make a play worth nothing.
    pub const UNRANKED_ASSISTS: Mods = Mods(Self::RELAX.0 | Self::AUTOPILOT.0 | Self::AUTOPLAY.0);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: Mods) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(&self, other: Mods) -> bool {
        self.0 & other.0 != 0
    }

    pub fn difficulty_relevant(&self) -> Mods {
        *self & Self::DIFFICULTY_RELEVANT
    }

    pub fn is_unranked_assist(&self) -> bool {
        self.intersects(Self::UNRANKED_ASSISTS)
    }
}

impl From<i32> for Mods {
    fn from(v: i32) -> Self {
        Mods(v as u32)
    }
}

impl BitOr for Mods {
    type Output = Mods;

    fn bitor(self, rhs: Self) -> Self::Output {
        Mods(self.0 | rhs.0)
    }
}

impl BitAnd for Mods {
    type Output = Mods;

    fn bitand(self, rhs: Self) -> Self::Output {
        Mods(self.0 & rhs.0)
    }
}

const ACRONYMS: [(Mods, &str); 29] = [
    (Mods::NO_FAIL, "NF"),
    (Mods::EASY, "EZ"),
    (Mods::TOUCH_DEVICE, "TD"),
    (Mods::HIDDEN, "HD"),
    (Mods::HARD_ROCK, "HR"),
    (Mods::SUDDEN_DEATH, "SD"),
    (Mods::DOUBLE_TIME, "DT"),
    (Mods::RELAX, "RX"),
    (Mods::HALF_TIME, "HT"),
    (Mods::NIGHTCORE, "NC"),
    (Mods::FLASHLIGHT, "FL"),
    (Mods::AUTOPLAY, "AT"),
    (Mods::SPUN_OUT, "SO"),
    (Mods::AUTOPILOT, "AP"),
    (Mods::PERFECT, "PF"),
    (Mods::KEY4, "4K"),
    (Mods::KEY5, "5K"),
    (Mods::KEY6, "6K"),
    (Mods::KEY7, "7K"),
    (Mods::KEY8, "8K"),
    (Mods::FADE_IN, "FI"),
    (Mods::RANDOM, "RD"),
    (Mods::CINEMA, "CN"),
    (Mods::TARGET, "TP"),
    (Mods::KEY9, "9K"),
    (Mods::KEY10, "10K"),
    (Mods::KEY1, "1K"),
    (Mods::KEY3, "3K"),
    (Mods::KEY2, "2K")
];

impl fmt::Display for Mods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("NM");
        }

        // Nightcore and perfect always come with their weaker counterpart set
        let mut shown = *self;
        if shown.contains(Mods::NIGHTCORE) {
            shown = Mods(shown.0 & !Mods::DOUBLE_TIME.0);
        }
        if shown.contains(Mods::PERFECT) {
            shown = Mods(shown.0 & !Mods::SUDDEN_DEATH.0);
        }

        for (flag, acronym) in ACRONYMS.iter() {
            if shown.contains(*flag) {
                f.write_str(acronym)?;
            }
        }

        Ok(())
    }
}
