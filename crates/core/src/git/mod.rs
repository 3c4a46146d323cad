//! Repository access for mergemine.

pub mod client;

pub use client::{GitRepo, StagedEntry};
