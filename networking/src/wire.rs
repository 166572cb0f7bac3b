use serde::{Deserialize, Serialize};

use containers::{Block, Hash32, Transaction};

/// Wire name of the peer request/reply protocol. Payloads on both sides are
/// CBOR-encoded `NetworkRequest`/`NetworkResponse` values.
pub const RPC_PROTOCOL: &str = "/chainsync/req/1";

/// Requests served by a peer's `NetworkService`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkRequest {
    LastBlockHeight,
    GetRangeOfBlocks { from: u64, to: u64 },
    Mempool,
    GetMempoolTxs { items: Vec<Hash32> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkResponse {
    LastBlockHeight(LastBlockHeightReply),
    GetRangeOfBlocks(GetRangeOfBlocksReply),
    Mempool(InvMessage),
    GetMempoolTxs(GetMempoolTxsReply),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastBlockHeightReply {
    pub height: u64,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRangeOfBlocksReply {
    pub blocks: Vec<Block>,
    /// Heights inside the requested range the peer could not serve.
    pub failed_block_heights: Vec<u64>,
    pub error: Option<String>,
}

/// Transaction hashes a peer advertises without payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvMessage {
    pub inventory: Vec<InvItem>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvItem {
    pub hash: Hash32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMempoolTxsReply {
    pub transactions: Vec<Transaction>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use containers::{from_cbor, to_cbor};

    #[test]
    fn test_request_round_trip() {
        let request = NetworkRequest::GetRangeOfBlocks { from: 1, to: 1000 };
        let bytes = to_cbor(&request).unwrap();
        let decoded: NetworkRequest = from_cbor(&bytes).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_response_round_trip() {
        let response = NetworkResponse::Mempool(InvMessage {
            inventory: vec![InvItem {
                hash: Hash32([5; 32]),
            }],
        });
        let bytes = to_cbor(&response).unwrap();
        let decoded: NetworkResponse = from_cbor(&bytes).unwrap();
        assert_eq!(decoded, response);
    }
}
