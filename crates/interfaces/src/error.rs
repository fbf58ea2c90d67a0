use std::fmt;

/// The class of an infrastructure fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The world-state or block storage failed.
    Storage,
    /// The state trie is missing nodes or is internally inconsistent.
    TrieConsistency,
    /// Data needed to process the block is not available locally.
    DataUnavailable,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage => f.write_str("storage"),
            Self::TrieConsistency => f.write_str("trie consistency"),
            Self::DataUnavailable => f.write_str("data unavailable"),
        }
    }
}

/// A failure of the node's own infrastructure while looking at a block.
///
/// These say nothing about the block itself, so a block that ran into one must never be marked
/// bad.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("{kind} fault: {message}")]
pub struct InfrastructureFault {
    kind: FaultKind,
    message: String,
}

impl InfrastructureFault {
    /// Creates a new fault of the given kind.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Storage fault.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Storage, message)
    }

    /// Trie consistency fault.
    pub fn trie_consistency(message: impl Into<String>) -> Self {
        Self::new(FaultKind::TrieConsistency, message)
    }

    /// Missing data fault.
    pub fn data_unavailable(message: impl Into<String>) -> Self {
        Self::new(FaultKind::DataUnavailable, message)
    }

    /// The fault class.
    pub const fn kind(&self) -> FaultKind {
        self.kind
    }

    /// The fault message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
