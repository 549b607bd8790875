//! Concierge: a conversational assistant for a residential community.
//!
//! Concierge answers resident questions over HTTP, grounding its replies in the
//! community's event calendar and remembering each conversation for a day. It
//! also hosts a small "guess the year" game and can text a daily digest of
//! today's events.
//!
//! # Architecture
//!
//! - **Storage**: SQLite for event records and conversation transcripts,
//!   [sqlite-vec](https://github.com/asg017/sqlite-vec) for the event vector index
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions)
//! - **Generation**: Hosted text-generation endpoint (Hugging Face inference API)
//! - **Transport**: JSON over HTTP (axum)
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: database initialization, schema, migrations, and health checks
//! - [`embedding`]: text-to-vector pipeline via ONNX Runtime
//! - [`events`]: event loading, indexing, and similarity search
//! - [`conversation`]: per-session transcripts with expiry
//! - [`prompt`]: prompt assembly for chat and game requests
//! - [`game`]: guess-the-year game sessions
//! - [`inference`]: text-generation client
//! - [`notify`]: daily SMS digest
//! - [`server`]: HTTP routes and startup

pub mod config;
pub mod conversation;
pub mod db;
pub mod embedding;
pub mod events;
pub mod game;
pub mod inference;
pub mod notify;
pub mod prompt;
pub mod server;
