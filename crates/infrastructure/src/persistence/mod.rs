pub mod event_store;
pub mod repository;
