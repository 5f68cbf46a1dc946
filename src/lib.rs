pub mod args;
pub mod config;
pub mod database;
pub mod model;
pub mod processor;
pub mod threading;
pub mod utils;
