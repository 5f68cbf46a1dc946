pub mod aggregate;
pub mod beatmap;
pub mod constants;
pub mod difficulty_cache;
pub mod mods;
pub mod performance;
pub mod score;
pub mod structures;
