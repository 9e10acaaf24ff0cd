// Causal Guessr backend: guess the real-world event behind a time-series chart.

pub mod api;
pub mod cache;
pub mod config;
pub mod diversity;
pub mod error;
pub mod game;
pub mod llm;
pub mod metrics;
pub mod puzzles;
pub mod render;
pub mod seeds;
pub mod sources;
