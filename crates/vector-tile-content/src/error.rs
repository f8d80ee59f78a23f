use std::sync::Arc;

use thiserror::Error;
use vctr::VctrError;

use crate::content::ContentState;

/// Why a fetch did not produce bytes. Cloneable so it can be handed to every
/// waiter on a tile's readiness.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request for {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("request for {url} failed: {source}")]
    Io {
        url: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("request for {url} was canceled")]
    Canceled { url: String },
}

impl FetchError {
    pub fn io(url: impl Into<String>, source: std::io::Error) -> Self {
        FetchError::Io {
            url: url.into(),
            source: Arc::new(source),
        }
    }
}

/// Terminal failure of a tile's content.
#[derive(Debug, Clone, Error)]
pub enum ContentError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to parse tile payload: {0}")]
    Parse(#[source] Arc<VctrError>),

    #[error("content was destroyed before it became ready")]
    Destroyed,

    #[error("content cannot be initialized in state {0:?}")]
    InvalidState(ContentState),

    #[error("failed to spawn request continuation: {0}")]
    Spawn(String),
}

impl From<VctrError> for ContentError {
    fn from(e: VctrError) -> Self {
        ContentError::Parse(Arc::new(e))
    }
}

/// Coarse classification used by the owning tileset to decide what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FetchFailed,
    ParseFailed,
    DestroyedDuringFetch,
    InvalidState,
    ExecutorUnavailable,
}

impl ContentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContentError::Fetch(_) => ErrorKind::FetchFailed,
            ContentError::Parse(_) => ErrorKind::ParseFailed,
            ContentError::Destroyed => ErrorKind::DestroyedDuringFetch,
            ContentError::InvalidState(_) => ErrorKind::InvalidState,
            ContentError::Spawn(_) => ErrorKind::ExecutorUnavailable,
        }
    }
}
