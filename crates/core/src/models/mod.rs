//! Data models for Scaffolding rooms

mod member;

pub use member::*;
