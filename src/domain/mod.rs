pub mod error;
pub mod event;
pub mod model;
pub mod reconciler;
pub mod repository;
