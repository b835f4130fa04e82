//! Side-effecting operations: document loading, configuration, processes and sessions.

pub mod config;
pub mod document;
pub mod process;
pub mod session;
