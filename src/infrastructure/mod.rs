pub mod calendar_gateway;
pub mod config;
pub mod distraction_repository;
pub mod error;
pub mod event_mapper;
pub mod storage;
pub mod task_repository;
