//! Request handler module
//!
//! Routes requests to the listing and viewer pages, downloads, uploads,
//! deletes and page assets.

pub mod files;
pub mod pages;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
