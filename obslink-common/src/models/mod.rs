// File: src/models/mod.rs

pub mod choice;
pub mod config;
pub mod output;
pub mod scene;
pub mod source;
pub mod status;
