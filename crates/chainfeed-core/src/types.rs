//! Ledger domain payloads shared by the feed and the HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A ledger block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    pub previous_hash: String,
    pub hash: String,
    #[serde(default)]
    pub data: Value,
    pub nonce: u64,
    pub difficulty: u32,
    #[serde(default)]
    pub validator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    pub txid: String,
    pub vout: u32,
    pub signature: String,
    pub pub_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutput {
    pub value: u64,
    pub pub_key_hash: String,
}

/// A ledger transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub inputs: Vec<TransactionInput>,
    #[serde(default)]
    pub outputs: Vec<TransactionOutput>,
    pub time: String,
}

/// Chain height summary returned by `GET /info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainInfo {
    pub length: u64,
    pub latest: u64,
}

/// A connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub id: String,
    pub address: String,
    pub last_seen: String,
}

/// Balance for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub address: String,
    pub balance: u64,
}

/// Node acknowledgement for `POST /send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub status: String,
    pub txid: String,
}

/// `GET /peers` body: either a bare array or `{"peers": [...]}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PeerList {
    Bare(Vec<Value>),
    Wrapped { peers: Vec<Value> },
}

impl PeerList {
    pub fn into_vec(self) -> Vec<Value> {
        match self {
            Self::Bare(peers) | Self::Wrapped { peers } => peers,
        }
    }
}
