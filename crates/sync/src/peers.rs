use fathom_primitives::BlockNumber;

/// Describes which peers may be evicted for trailing behind the local chain.
///
/// Peers whose head is below `minimum_head_for_peer` count as trailing, at most
/// `max_trailing_peers` of them are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrailingPeerRequirements {
    /// Lowest head a peer needs to not count as trailing.
    pub minimum_head_for_peer: BlockNumber,
    /// Number of trailing peers to keep.
    pub max_trailing_peers: usize,
}

impl TrailingPeerRequirements {
    /// No peer is ever considered trailing.
    pub const UNRESTRICTED: Self =
        Self { minimum_head_for_peer: 0, max_trailing_peers: usize::MAX };

    /// Creates new requirements.
    pub const fn new(minimum_head_for_peer: BlockNumber, max_trailing_peers: usize) -> Self {
        Self { minimum_head_for_peer, max_trailing_peers }
    }

    /// Returns `true` if a peer with the given head is trailing.
    pub const fn is_trailing(&self, peer_head: BlockNumber) -> bool {
        peer_head < self.minimum_head_for_peer
    }

    /// Returns `true` if no peer can be evicted.
    pub const fn is_unrestricted(&self) -> bool {
        self.minimum_head_for_peer == 0 || self.max_trailing_peers == usize::MAX
    }
}

impl Default for TrailingPeerRequirements {
    fn default() -> Self {
        Self::UNRESTRICTED
    }
}
