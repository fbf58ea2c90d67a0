use crate::InfrastructureFault;
use fathom_primitives::{BlockHash, SealedBlock, SealedHeader};

/// Result alias for [`ProviderError`].
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Bundled errors variants thrown by the block store.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ProviderError {
    /// The underlying storage failed.
    #[error(transparent)]
    Fault(#[from] InfrastructureFault),
    /// A block was expected in the store but its body is missing.
    #[error("block body missing for {0}")]
    MissingBody(BlockHash),
}

/// Read access to blocks that were stored locally.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait BlockReader: Send + Sync {
    /// Returns the stored block with the given hash, if any.
    fn block_by_hash(&self, hash: BlockHash) -> ProviderResult<Option<SealedBlock>>;

    /// Returns the stored header with the given hash, if any.
    fn header(&self, hash: &BlockHash) -> ProviderResult<Option<SealedHeader>>;

    /// Returns `true` if a header with this hash is stored.
    fn is_known(&self, hash: &BlockHash) -> ProviderResult<bool> {
        Ok(self.header(hash)?.is_some())
    }
}
