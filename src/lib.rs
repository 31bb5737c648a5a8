//! `gmail-attachments` — download Gmail attachments to disk.
//!
//! This crate provides the selection-and-materialization pipeline: paged
//! message search, date/subject/filename filtering, MIME part extraction,
//! collision-free file layout, and a PDF rendering of the message body for
//! messages that have nothing else to save.

pub mod auth;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod gmail;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod stats;
