pub mod eventbus;
pub mod notice;
pub mod service;
pub mod state;
pub mod subscription;
