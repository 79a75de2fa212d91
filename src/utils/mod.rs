//! Shared helpers for paths and socket files

pub mod path;
pub mod socket;
