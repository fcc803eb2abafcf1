// Crate root library declaration and module exports.
pub mod cli;
pub mod clock;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod model;
pub mod notify;
pub mod storage;
pub mod store;
pub mod system;
