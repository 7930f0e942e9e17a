pub mod agents;
pub mod app;
pub mod config;
pub mod domain;
pub mod engine;
pub mod image_chain;
pub mod paths;
pub mod phases;
pub mod pipeline;
pub mod service;
pub mod session_store;
pub mod state;
pub mod state_machine;
pub mod strategy;
pub mod structured_logger;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;
