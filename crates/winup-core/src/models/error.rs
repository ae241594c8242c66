use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::models::{SourceAction, SourceId};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    NotInstalled,
    UnsupportedCapability,
    InvalidInput,
    ParseFailure,
    Timeout,
    ProcessFailure,
    StorageFailure,
    Internal,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CoreError {
    pub source: Option<SourceId>,
    pub action: Option<SourceAction>,
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(
        source: Option<SourceId>,
        action: Option<SourceAction>,
        kind: CoreErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            action,
            kind,
            message: message.into(),
        }
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.source {
            Some(source) => write!(f, "{:?} ({source}): {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl Error for CoreError {}
