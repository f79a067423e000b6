// SPDX-License-Identifier: GPL-2.0-or-later

use std::path::PathBuf;
use thiserror::Error;

/// Error kind exposed at the HTTP boundary. The HTTP layer matches on
/// `kind()` alone and never on the inner variant, so a new inner error
/// never requires touching the HTTP layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Corrupt,
    Io,
    Internal,
}

#[derive(Debug, Error)]
pub enum SegmentIndexError {
    #[error("unknown path: {0}")]
    UnknownPath(String),

    #[error("no segments overlap the requested window")]
    NoSegments,

    #[error("read directory {0}: {1}")]
    ReadDir(PathBuf, std::io::Error),
}

#[derive(Debug, Error)]
pub enum SegmentReaderError {
    #[error("read segment: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse box tree: {0}")]
    Read(#[from] mp4::read::ReadError),

    #[error("missing required box: {0}")]
    MissingBox(&'static str),

    #[error("moof without a paired mdat")]
    MoofWithoutMdat,

    #[error("trun entry references bytes past the end of mdat")]
    MdatTooShort,

    #[error("integer overflow while parsing {0}")]
    Overflow(&'static str),
}

#[derive(Debug, Error)]
pub enum TrimmerError {
    #[error("segment has no samples")]
    EmptySegment,

    #[error("first sample of the segment is not a sync sample")]
    LeadingSampleNotSync,

    #[error("tick arithmetic overflow")]
    Overflow,
}

#[derive(Debug, Error)]
pub enum ConcatenatorError {
    #[error("tick arithmetic overflow")]
    Overflow,
}

#[derive(Debug, Error)]
pub enum MuxError {
    #[error("mp4 box error: {0}")]
    Mp4(#[from] mp4::Mp4Error),

    #[error("integer overflow while muxing")]
    Overflow,

    #[error("write: {0}")]
    Write(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template is missing a %Y token")]
    MissingYear,

    #[error("unsupported token width in template")]
    UnsupportedWidth,

    #[error("filename does not match the configured template")]
    NoMatch,
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    SegmentIndex(#[from] SegmentIndexError),

    #[error(transparent)]
    SegmentReader(#[from] SegmentReaderError),

    #[error(transparent)]
    Trimmer(#[from] TrimmerError),

    #[error(transparent)]
    Concatenator(#[from] ConcatenatorError),

    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlaybackError::BadRequest(_) | PlaybackError::Template(_) => ErrorKind::BadRequest,
            PlaybackError::SegmentIndex(
                SegmentIndexError::UnknownPath(_) | SegmentIndexError::NoSegments,
            ) => ErrorKind::NotFound,
            PlaybackError::SegmentIndex(SegmentIndexError::ReadDir(..))
            | PlaybackError::SegmentReader(SegmentReaderError::Io(_))
            | PlaybackError::Mux(MuxError::Write(_)) => ErrorKind::Io,
            PlaybackError::SegmentReader(_)
            | PlaybackError::Trimmer(TrimmerError::LeadingSampleNotSync) => ErrorKind::Corrupt,
            PlaybackError::Trimmer(_)
            | PlaybackError::Concatenator(_)
            | PlaybackError::Mux(_)
            | PlaybackError::Internal(_) => ErrorKind::Internal,
        }
    }
}
