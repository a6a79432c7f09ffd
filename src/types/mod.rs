//! # types
//!
//! The data model: database, messages, signals, nodes and the value and
//! error types flowing through the codec.

pub mod attributes;
pub mod bus;
pub mod conversion;
pub mod database;
pub mod errors;
pub mod message;
pub mod node;
pub mod signal;
pub mod value;
