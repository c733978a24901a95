// src/lib.rs

//! postwatch: incremental board monitor
//!
//! Watches per-author post listings and reports every genuinely new post
//! exactly once, without replaying a backlog on first contact.

pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
