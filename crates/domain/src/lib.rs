//! Shared types for the Skypearls concierge workspace: the error type,
//! configuration, the conversational data model, and streaming events.

pub mod config;
pub mod error;
pub mod lead;
pub mod message;
pub mod state;
pub mod stream;
pub mod text;
pub mod trace;
