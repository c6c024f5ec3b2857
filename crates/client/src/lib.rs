//! Client code for reducer.
//!
//! This crate provides the remote fetch pipeline and the processors that turn
//! canonical source text into minified output. Both are shared by the server
//! and the CLI.

pub mod fetch;
pub mod minify;

pub use fetch::{FetchClient, FetchConfig, FetchResponse, Fetcher};
pub use minify::{
    CssProcessor, Diagnostic, Diagnostics, JsProcessor, LessProcessor, Processed, Processor, Severity, Transform,
};
