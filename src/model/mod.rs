//! Core data model types for fetched messages and their parts.

pub mod message;
pub mod part;
