pub mod models;
pub mod report;
pub mod streak;
