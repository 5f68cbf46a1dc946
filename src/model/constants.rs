// Rating fold
pub const RATING_WEIGHT_DECAY: f64 = 0.95;
pub const BONUS_RATING_CAP: f64 = 417.0 - 1.0 / 3.0;
pub const BONUS_RATING_DECAY: f64 = 0.9994;
pub const ACCURACY_NORMALIZATION: f64 = 20.0;

// Write-back thresholds
pub const SCORE_VALUE_EPSILON: f64 = 0.001;
pub const PLAYER_RATING_EPSILON: f64 = 0.01;

// Notable events
pub const NOTABLE_EVENT_RATING_FRACTION: f64 = 1.0 / 21.5;
pub const NOTABLE_EVENT_MINIMUM_DELTA: f64 = 5.0;

// Monitoring
pub const MAX_SCORES_PER_POLL: i64 = 1000;
pub const SCORE_WATERMARK_STORE_STEP: u64 = 100;
pub const STALL_CHECK_INTERVAL_MS: u64 = 100;
pub const MAP_LOOP_IDLE_SLEEP_MS: u64 = 100;
pub const SCORE_LOOP_IDLE_SLEEP_MS: u64 = 1;

// Bulk processing
pub const PLAYERS_PER_PARTITION: i64 = 10_000;
pub const BULK_BATCH_THRESHOLD: usize = 10_000;
pub const DIFFICULTY_LOAD_STEP: i32 = 10_000;
pub const DIFFICULTY_LOAD_THREADS: usize = 16;
pub const DRAIN_POLL_INTERVAL_MS: u64 = 10;
