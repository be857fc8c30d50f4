pub mod config;
pub mod fetch;
pub mod models;
pub mod notify;
pub mod parsers;
pub mod storage;
pub mod telegram;
pub mod tracker;
pub mod utils;
