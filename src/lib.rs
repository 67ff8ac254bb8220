pub mod analysis;
pub mod channel;
pub mod config;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod timefmt;
pub mod timing;
pub mod types;
pub mod validity;
