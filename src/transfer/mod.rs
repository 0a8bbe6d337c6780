//! File transfer module
//!
//! The byte-range serving engine: cancellation, chunked streaming and the
//! download decision table.

pub mod cancel;
pub mod orchestrator;
pub mod stream;

pub use cancel::CancellationSignal;
pub use orchestrator::{plan_transfer, TransferPlan, TransferRequest};
pub use stream::{open_chunk_stream, ChunkStream, CHUNK_SIZE};
