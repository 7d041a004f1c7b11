pub mod activity_repository;
pub mod backend_client;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod event_log;
pub mod reflection_repository;
pub mod storage;
