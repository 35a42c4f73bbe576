//! History metadata integration suite
//!
//! Drives the public `histmeta` surface the way an embedding application
//! would.

#[path = "../common/mod.rs"]
mod common;

mod basics;
mod concurrency;
mod durability;
mod normalization;
