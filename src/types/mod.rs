//! Core types for the chunking engine.

mod block;
mod chunk;
mod config;
mod document;
mod unit;

pub use block::{Block, BlockKind};
pub use chunk::Chunk;
pub use config::EngineConfig;
pub use document::{Document, ParseMode};
pub use unit::Unit;
