use alloy_rlp::Encodable;
use fathom_primitives::{
    proofs, Address, Bytes, Header, SealedBlock, SealedHeader, TransactionEnvelope, B256, U256,
};
use rand::{thread_rng, Rng};

/// Returns a random 32 byte hash.
pub fn random_hash() -> B256 {
    B256::random()
}

/// Generates a range of random [SealedHeader]s.
///
/// The parent hash of the first header in the result will be equal to `head`, each following
/// header links to its predecessor and is one second younger.
pub fn random_header_range(rng: std::ops::Range<u64>, head: B256) -> Vec<SealedHeader> {
    let mut headers = Vec::with_capacity(rng.end.saturating_sub(rng.start) as usize);
    for idx in rng {
        headers.push(random_header(
            idx,
            Some(headers.last().map(|h: &SealedHeader| h.hash()).unwrap_or(head)),
        ));
    }
    headers
}

/// Generate a random [SealedHeader] with a correct hash.
///
/// The timestamp is derived from the number so children are always younger than their parents.
pub fn random_header(number: u64, parent: Option<B256>) -> SealedHeader {
    let header = Header {
        number,
        parent_hash: parent.unwrap_or_default(),
        beneficiary: Address::random(),
        state_root: random_hash(),
        timestamp: 1_700_000_000 + number * 12,
        gas_limit: 30_000_000,
        base_fee_per_gas: Some(7),
        mix_hash: random_hash(),
        ..Default::default()
    };
    header.seal_slow()
}

/// Encodes a signed pre EIP-155 legacy transfer with random nonce, recipient and signature.
pub fn random_legacy_tx_bytes() -> Bytes {
    let mut rng = thread_rng();
    let mut fields = Vec::new();
    rng.gen::<u64>().encode(&mut fields);
    1_000_000_000u128.encode(&mut fields);
    21_000u64.encode(&mut fields);
    Address::random().encode(&mut fields);
    U256::from(rng.gen::<u64>()).encode(&mut fields);
    Bytes::new().encode(&mut fields);
    rng.gen_range(27u64..=28).encode(&mut fields);
    U256::from(rng.gen_range(1..u64::MAX)).encode(&mut fields);
    U256::from(rng.gen_range(1..u64::MAX)).encode(&mut fields);

    let mut raw = Vec::new();
    alloy_rlp::Header { list: true, payload_length: fields.len() }.encode(&mut raw);
    raw.extend_from_slice(&fields);
    raw.into()
}

/// Generates a signed legacy transaction with random content.
pub fn random_legacy_tx() -> TransactionEnvelope {
    TransactionEnvelope::decode_enveloped(random_legacy_tx_bytes())
        .expect("generated legacy transactions decode")
}

/// Generate a random [SealedBlock] with `tx_count` transactions, a matching transactions root
/// and a correct hash.
pub fn random_block(number: u64, parent: Option<B256>, tx_count: usize) -> SealedBlock {
    let body: Vec<_> = (0..tx_count).map(|_| random_legacy_tx()).collect();
    let (mut header, _) = random_header(number, parent).split();
    header.transactions_root = proofs::calculate_transaction_root(&body);
    SealedBlock::new(header.seal_slow(), body, None)
}

/// Generates a chain of `len` linked blocks on top of `head`, starting at number `start`.
pub fn random_block_range(start: u64, len: u64, head: B256) -> Vec<SealedBlock> {
    let mut blocks: Vec<SealedBlock> = Vec::with_capacity(len as usize);
    for number in start..start + len {
        let parent = blocks.last().map(|b| b.hash()).unwrap_or(head);
        blocks.push(random_block(number, Some(parent), 1));
    }
    blocks
}
