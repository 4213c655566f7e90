pub mod codec;
pub mod config;
pub mod discovery;
pub mod models;
pub mod provider;
pub mod store;
pub mod tracker;
pub mod utils;
pub mod wallet;
