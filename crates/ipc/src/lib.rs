//! Embedded request surface: newline-delimited JSON over stdin/stdout.
//!
//! Each input line is a request `{ "id", "method", "params" }`. Requests
//! run concurrently; log lines are pushed as `{ "event": "log", "id",
//! "line" }` while a request runs, and each request gets exactly one
//! `{ "id", "result" }` or `{ "id", "error": { "kind", "message" } }`.

pub mod protocol;
pub mod server;

pub use server::serve;
