//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Errors: Error taxonomy for startup and command execution
//! - Messaging: Parsing, permissions, pending replies, command dispatch
//! - Services: Lifecycle orchestration, debug-log sink
//! - State: Process-wide bot state

pub mod errors;
pub mod messaging;
pub mod services;
pub mod state;
