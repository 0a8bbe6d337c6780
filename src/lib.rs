//! Streaming HTTP file server
//!
//! Lists, views, uploads and deletes files under one root directory and
//! serves downloads with byte ranges, `If-Modified-Since` revalidation and
//! chunked streaming that stops when the client disconnects.

pub mod config;
pub mod error;
pub mod fs;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod transfer;
