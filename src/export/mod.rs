//! Writing selected content to disk: naming, collision handling, layout.

pub mod materialize;
pub mod sanitize;
