// src/lib.rs

//! feedstore: concurrent feed fetching into a per-source item store

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
