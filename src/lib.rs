// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) parses flags and hands the resulting settings to `ui`.
//
// Module responsibilities:
// - `api`: Blocking client for the Telegram Bot API (getUpdates,
//   sendMessage, sendPhoto, sendVideo) and its response records.
// - `config`: Command line flags and their validation into `Settings`.
// - `error`: The error type returned by `api` and `watcher`.
// - `ui`: Runs one mode and prints the outcome.
// - `watcher`: Arms on a sentinel file and uploads new `.jpg` files.
pub mod api;
pub mod config;
pub mod error;
pub mod ui;
pub mod watcher;

pub use error::{Error, Result};
