//! Library surface of the training CLI: the blocks-world demo domain,
//! the naive query matcher, and the YAML settings.

#![forbid(unsafe_code)]

pub mod blocks;
pub mod config;
pub mod matcher;
