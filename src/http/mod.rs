//! HTTP protocol layer module
//!
//! Range parsing, conditional-request dates, content types and response
//! builders, independent of the routes that use them.

pub mod cache;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::parse_range_header;
pub use response::{
    build_404_response, build_405_response, build_413_response, build_503_response,
    build_html_response, build_redirect_response, build_text_response, build_transfer_response,
    HttpResponse, ResponseBody,
};
