pub mod active;
pub mod update_batch;
pub mod worker_pool;
