//! Chunked upload session state
//!
//! A blob push moves through `Idle -> SessionStarted -> Uploading(offset) -> Finalized`.
//! The session value carries the current upload location and the next byte
//! offset, so the loop driving it never keeps protocol state of its own.

use crate::digest::ContentDigest;
use crate::error::{Phase, RegistryError, Result};
use std::ops::Range;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    SessionStarted { location: Url },
    Uploading { location: Url, offset: u64 },
    Finalized { digest: ContentDigest },
}

/// Byte window `[start, end)` of one PATCH
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    pub start: u64,
    pub end: u64,
}

impl ChunkWindow {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Inclusive `Content-Range` value for the bytes of this window
    ///
    /// `None` for an empty window: `0-0` would claim one byte.
    pub fn content_range(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(format!("{}-{}", self.start, self.end - 1))
        }
    }
}

/// Number of PATCH requests needed for `blob_len` bytes
///
/// An empty blob still takes one zero-length chunk.
pub fn chunk_count(blob_len: u64, chunk_size: u64) -> u64 {
    if blob_len == 0 {
        1
    } else {
        blob_len.div_ceil(chunk_size)
    }
}

#[derive(Debug, Clone)]
pub struct UploadSession {
    state: UploadState,
    default_chunk_size: u64,
    chunk_size: u64,
    min_chunk_size: u64,
}

impl UploadSession {
    pub fn new(default_chunk_size: u64) -> Self {
        Self {
            state: UploadState::Idle,
            default_chunk_size,
            chunk_size: default_chunk_size,
            min_chunk_size: 0,
        }
    }

    /// Record the registry-assigned session
    ///
    /// The effective chunk size becomes the larger of the registry minimum
    /// and the client default.
    pub fn start(&mut self, location: Url, min_chunk_size: u64) -> Result<()> {
        if self.state != UploadState::Idle {
            return Err(self.invalid_transition(Phase::StartSession, "session already started"));
        }
        self.min_chunk_size = min_chunk_size;
        self.chunk_size = min_chunk_size.max(self.default_chunk_size).max(1);
        self.state = UploadState::SessionStarted { location };
        Ok(())
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn min_chunk_size(&self) -> u64 {
        self.min_chunk_size
    }

    /// Target of the next PATCH or of the finalize PUT
    pub fn location(&self) -> Option<&Url> {
        match &self.state {
            UploadState::SessionStarted { location } | UploadState::Uploading { location, .. } => {
                Some(location)
            }
            UploadState::Idle | UploadState::Finalized { .. } => None,
        }
    }

    /// Bytes acknowledged so far
    pub fn offset(&self) -> u64 {
        match &self.state {
            UploadState::Uploading { offset, .. } => *offset,
            _ => 0,
        }
    }

    /// Window of the next chunk of a `blob_len`-byte blob, or `None` once all bytes are sent
    pub fn next_window(&self, blob_len: u64) -> Option<ChunkWindow> {
        match &self.state {
            UploadState::SessionStarted { .. } if blob_len == 0 => Some(ChunkWindow { start: 0, end: 0 }),
            UploadState::SessionStarted { .. } | UploadState::Uploading { .. } => {
                let start = self.offset();
                if start >= blob_len {
                    None
                } else {
                    Some(ChunkWindow {
                        start,
                        end: (start + self.chunk_size).min(blob_len),
                    })
                }
            }
            UploadState::Idle | UploadState::Finalized { .. } => None,
        }
    }

    /// Advance past `window`, continuing at the location the registry returned
    pub fn record_chunk(&mut self, window: ChunkWindow, next_location: Url) -> Result<()> {
        if self.location().is_none() {
            return Err(self.invalid_transition(Phase::UploadChunk, "no active session"));
        }
        if window.start != self.offset() {
            return Err(self.invalid_transition(
                Phase::UploadChunk,
                &format!("chunk starts at {} but session is at {}", window.start, self.offset()),
            ));
        }
        self.state = UploadState::Uploading {
            location: next_location,
            offset: window.end,
        };
        Ok(())
    }

    /// URL of the closing PUT: the current location with `digest` appended to its query
    pub fn finalize_url(&self, digest: &ContentDigest) -> Result<Url> {
        let mut url = self
            .location()
            .cloned()
            .ok_or_else(|| self.invalid_transition(Phase::FinalizeUpload, "no active session"))?;
        url.query_pairs_mut().append_pair("digest", &digest.to_string());
        Ok(url)
    }

    pub fn finish(&mut self, digest: ContentDigest) -> Result<()> {
        if self.location().is_none() {
            return Err(self.invalid_transition(Phase::FinalizeUpload, "no active session"));
        }
        self.state = UploadState::Finalized { digest };
        Ok(())
    }

    fn invalid_transition(&self, phase: Phase, reason: &str) -> RegistryError {
        RegistryError::protocol(phase, None, format!("invalid upload state {:?}: {}", self.state, reason))
    }
}
