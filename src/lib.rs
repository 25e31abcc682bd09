#![forbid(unsafe_code)]

pub mod batch;
pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod formats;
pub mod logging;
pub mod queries;
pub mod result_store;
pub mod scrape;
pub mod search;
pub mod terms;
