//! Library half of the `backdate` CLI: config discovery and merging.

pub mod config;
