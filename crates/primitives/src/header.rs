use crate::{block::BlockNumHash, constants::EMPTY_OMMER_ROOT_HASH, EMPTY_ROOT_HASH};
use alloy_primitives::{keccak256, Address, BlockNumber, Bloom, Bytes, B256, B64, U256};
use alloy_rlp::{length_of_length, Encodable};
use bytes::BufMut;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Block header
///
/// Only the fields that exist up to and including Shanghai are modelled, which is everything
/// `engine_newPayloadV1` and `engine_newPayloadV2` can carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// The Keccak 256-bit hash of the parent block's header, in its entirety; formally Hp.
    pub parent_hash: B256,
    /// The Keccak 256-bit hash of the ommers list portion of this block; formally Ho.
    pub ommers_hash: B256,
    /// The 160-bit address to which all fees collected from the successful mining of this block
    /// be transferred; formally Hc.
    pub beneficiary: Address,
    /// The Keccak 256-bit hash of the root node of the state trie, after all transactions are
    /// executed and finalisations applied; formally Hr.
    pub state_root: B256,
    /// The Keccak 256-bit hash of the root node of the trie structure populated with each
    /// transaction in the transactions list portion of the block; formally Ht.
    pub transactions_root: B256,
    /// The Keccak 256-bit hash of the root node of the trie structure populated with the receipts
    /// of each transaction in the transactions list portion of the block; formally He.
    pub receipts_root: B256,
    /// The Keccak 256-bit hash of the withdrawals list portion of this block.
    pub withdrawals_root: Option<B256>,
    /// The Bloom filter composed from indexable information (logger address and log topics)
    /// contained in each log entry from the receipt of each transaction in the transactions list;
    /// formally Hb.
    pub logs_bloom: Bloom,
    /// A scalar value corresponding to the difficulty level of this block. Zero after the merge.
    pub difficulty: U256,
    /// A scalar value equal to the number of ancestor blocks; formally Hi.
    pub number: BlockNumber,
    /// A scalar value equal to the current limit of gas expenditure per block; formally Hl.
    pub gas_limit: u64,
    /// A scalar value equal to the total gas used in transactions in this block; formally Hg.
    pub gas_used: u64,
    /// A scalar value equal to the reasonable output of Unix's time() at this block's inception;
    /// formally Hs.
    pub timestamp: u64,
    /// The previous randao value after the merge, the PoW mix hash before.
    pub mix_hash: B256,
    /// Zero after the merge.
    pub nonce: u64,
    /// EIP-1559 base fee.
    pub base_fee_per_gas: Option<u64>,
    /// An arbitrary byte array containing data relevant to this block; formally Hx.
    pub extra_data: Bytes,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            parent_hash: Default::default(),
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            beneficiary: Default::default(),
            state_root: EMPTY_ROOT_HASH,
            transactions_root: EMPTY_ROOT_HASH,
            receipts_root: EMPTY_ROOT_HASH,
            logs_bloom: Default::default(),
            difficulty: Default::default(),
            number: 0,
            gas_limit: 0,
            gas_used: 0,
            timestamp: 0,
            extra_data: Default::default(),
            mix_hash: Default::default(),
            nonce: 0,
            base_fee_per_gas: None,
            withdrawals_root: None,
        }
    }
}

impl Header {
    /// Returns the parent block's number and hash.
    pub const fn parent_num_hash(&self) -> BlockNumHash {
        BlockNumHash { number: self.number.saturating_sub(1), hash: self.parent_hash }
    }

    /// Checks if the header is empty - has no transactions and no ommers
    pub fn is_empty(&self) -> bool {
        self.transactions_root == EMPTY_ROOT_HASH &&
            self.ommers_hash == EMPTY_OMMER_ROOT_HASH &&
            self.withdrawals_root.map_or(true, |root| root == EMPTY_ROOT_HASH)
    }

    /// Heavy function that will calculate hash of data and will *not* save the change to
    /// metadata. Use [`Header::seal_slow`] and unlock if you need the hash to be persistent.
    pub fn hash_slow(&self) -> B256 {
        let mut out = Vec::<u8>::with_capacity(self.length());
        self.encode(&mut out);
        keccak256(&out)
    }

    /// Calculate hash and seal the Header so that it can't be changed.
    pub fn seal_slow(self) -> SealedHeader {
        let hash = self.hash_slow();
        SealedHeader::new(self, hash)
    }

    fn header_payload_length(&self) -> usize {
        let mut length = 0;
        length += self.parent_hash.length();
        length += self.ommers_hash.length();
        length += self.beneficiary.length();
        length += self.state_root.length();
        length += self.transactions_root.length();
        length += self.receipts_root.length();
        length += self.logs_bloom.length();
        length += self.difficulty.length();
        length += U256::from(self.number).length();
        length += U256::from(self.gas_limit).length();
        length += U256::from(self.gas_used).length();
        length += self.timestamp.length();
        length += self.extra_data.length();
        length += self.mix_hash.length();
        length += B64::new(self.nonce.to_be_bytes()).length();

        if let Some(base_fee) = self.base_fee_per_gas {
            length += U256::from(base_fee).length();
        } else if self.withdrawals_root.is_some() {
            // the withdrawals root can't be placed without a base fee slot
            length += 1;
        }

        if let Some(root) = self.withdrawals_root {
            length += root.length();
        }

        length
    }
}

impl Encodable for Header {
    fn encode(&self, out: &mut dyn BufMut) {
        let list_header =
            alloy_rlp::Header { list: true, payload_length: self.header_payload_length() };
        list_header.encode(out);

        self.parent_hash.encode(out);
        self.ommers_hash.encode(out);
        self.beneficiary.encode(out);
        self.state_root.encode(out);
        self.transactions_root.encode(out);
        self.receipts_root.encode(out);
        self.logs_bloom.encode(out);
        self.difficulty.encode(out);
        U256::from(self.number).encode(out);
        U256::from(self.gas_limit).encode(out);
        U256::from(self.gas_used).encode(out);
        self.timestamp.encode(out);
        self.extra_data.encode(out);
        self.mix_hash.encode(out);
        B64::new(self.nonce.to_be_bytes()).encode(out);

        if let Some(ref base_fee) = self.base_fee_per_gas {
            U256::from(*base_fee).encode(out);
        } else if self.withdrawals_root.is_some() {
            out.put_u8(alloy_rlp::EMPTY_STRING_CODE);
        }

        if let Some(ref root) = self.withdrawals_root {
            root.encode(out);
        }
    }

    fn length(&self) -> usize {
        let mut length = 0;
        length += self.header_payload_length();
        length += length_of_length(length);
        length
    }
}

/// A [`Header`] that is sealed at a precalculated hash.
///
/// The hash is taken as given: a header received from the consensus layer carries the hash the
/// sender claims, use [`SealedHeader::has_valid_hash`] to check it against the fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SealedHeader {
    header: Header,
    hash: B256,
}

impl SealedHeader {
    /// Creates the sealed header with the given hash.
    #[inline]
    pub const fn new(header: Header, hash: B256) -> Self {
        Self { header, hash }
    }

    /// Returns the sealed header's hash.
    #[inline]
    pub const fn hash(&self) -> B256 {
        self.hash
    }

    /// Returns the wrapped header.
    #[inline]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the block number and hash.
    pub const fn num_hash(&self) -> BlockNumHash {
        BlockNumHash { number: self.header.number, hash: self.hash }
    }

    /// Recomputes the hash from the header fields and compares it with the sealed one.
    pub fn has_valid_hash(&self) -> bool {
        self.header.hash_slow() == self.hash
    }

    /// Extract the raw header that can be modified.
    pub fn unseal(self) -> Header {
        self.header
    }

    /// Splits the sealed header into its components.
    pub fn split(self) -> (Header, B256) {
        (self.header, self.hash)
    }
}

impl Deref for SealedHeader {
    type Target = Header;

    fn deref(&self) -> &Self::Target {
        &self.header
    }
}
