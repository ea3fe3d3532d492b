//! Upload module for the chunked blob upload session

pub mod chunked;

pub use chunked::{ChunkWindow, UploadSession, UploadState, chunk_count};
