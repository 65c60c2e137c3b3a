//! Scrapes a forum "prices paid" thread into a flat price sheet, inferring
//! canonical make, model, color, condition and purchase country along the way.

pub mod config;
pub mod error;
pub mod extractor;
pub mod inference;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod scraper;
pub mod storage;
pub mod utils;
