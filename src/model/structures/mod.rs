pub mod difficulty_attribute;
pub mod game_mode;
pub mod ranked_status;
pub mod score_version;
