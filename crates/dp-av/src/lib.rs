//! # dp-av
//!
//! Audio/video tooling for the packaging pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Poster extraction** ([`generate_poster`]) -- pick a representative
//!   frame from a master video and write it as a still image.

pub mod command;
pub mod poster;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use poster::{find_poster_source, generate_poster, POSTER_FILE_NAME};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
