//! Payload parsing: header lookups and part-tree extraction.

pub mod extract;
pub mod header;
