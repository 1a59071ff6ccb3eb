//! Transaction records as fetched from the node RPC collaborator
//!
//! `TransactionRecord` is immutable once fetched and cached by txid for the
//! lifetime of one traversal session. Inputs are a tagged sum type so every
//! consumption site matches exhaustively on coinbase vs outpoint.

use serde::{Deserialize, Serialize};

/// One transaction as seen by the traversal engines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub txid: String,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub block_height: Option<u64>,
    pub block_time: Option<i64>,
    pub confirmations: Option<u64>,
}

/// A transaction input: either the coinbase marker or a prior-output reference
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxInput {
    Coinbase,
    Outpoint {
        txid: String,
        vout: u32,
        /// Resolved previous output, present when the node returned
        /// prevout-annotated data (getrawtransaction verbosity 2)
        prevout: Option<PrevOut>,
    },
}

/// Resolved previous output attached to an input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrevOut {
    pub value_sats: u64,
    pub address: Option<String>,
    pub script_type: String,
}

/// A transaction output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    pub value_sats: u64,
    pub address: Option<String>,
    pub script_type: String,
}

/// Answer from the node's UTXO-set lookup (gettxout)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutputStatus {
    Unspent {
        value_sats: u64,
        confirmations: u64,
    },
    Spent,
}

impl TransactionRecord {
    /// True when any input carries the coinbase marker
    pub fn is_coinbase(&self) -> bool {
        self.inputs.iter().any(|i| matches!(i, TxInput::Coinbase))
    }

    /// Sum of all output values in satoshis
    pub fn total_output_sats(&self) -> u64 {
        self.outputs.iter().map(|o| o.value_sats).sum()
    }

    /// Addresses appearing on resolved inputs (for change detection)
    pub fn input_addresses(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .filter_map(|i| match i {
                TxInput::Outpoint {
                    prevout: Some(p), ..
                } => p.address.as_deref(),
                _ => None,
            })
            .collect()
    }

    /// Script types appearing on resolved inputs
    pub fn input_script_types(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .filter_map(|i| match i {
                TxInput::Outpoint {
                    prevout: Some(p), ..
                } => Some(p.script_type.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Resolved input values as (input index, sats) pairs
    pub fn input_values(&self) -> Vec<(usize, u64)> {
        self.inputs
            .iter()
            .enumerate()
            .filter_map(|(idx, i)| match i {
                TxInput::Outpoint {
                    prevout: Some(p), ..
                } if p.value_sats > 0 => Some((idx, p.value_sats)),
                _ => None,
            })
            .collect()
    }

    /// Index of the input that spends the given outpoint, if present
    pub fn input_index_spending(&self, txid: &str, vout: u32) -> Option<usize> {
        self.inputs.iter().position(|i| match i {
            TxInput::Outpoint {
                txid: prev_txid,
                vout: prev_vout,
                ..
            } => prev_txid == txid && *prev_vout == vout,
            TxInput::Coinbase => false,
        })
    }
}

impl OutputStatus {
    pub fn is_unspent(&self) -> bool {
        matches!(self, OutputStatus::Unspent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outpoint(txid: &str, vout: u32, value: u64, address: Option<&str>) -> TxInput {
        TxInput::Outpoint {
            txid: txid.to_string(),
            vout,
            prevout: Some(PrevOut {
                value_sats: value,
                address: address.map(|a| a.to_string()),
                script_type: "witness_v0_keyhash".to_string(),
            }),
        }
    }

    fn record(inputs: Vec<TxInput>, outputs: Vec<u64>) -> TransactionRecord {
        TransactionRecord {
            txid: "tx".to_string(),
            inputs,
            outputs: outputs
                .into_iter()
                .map(|v| TxOutput {
                    value_sats: v,
                    address: None,
                    script_type: "witness_v0_keyhash".to_string(),
                })
                .collect(),
            block_height: Some(800_000),
            block_time: Some(1_700_000_000),
            confirmations: Some(10),
        }
    }

    #[test]
    fn test_coinbase_detection() {
        let cb = record(vec![TxInput::Coinbase], vec![625_000_000]);
        assert!(cb.is_coinbase());

        let normal = record(vec![outpoint("aa", 0, 1000, None)], vec![900]);
        assert!(!normal.is_coinbase());
    }

    #[test]
    fn test_total_output_sats() {
        let tx = record(vec![TxInput::Coinbase], vec![100, 200, 300]);
        assert_eq!(tx.total_output_sats(), 600);
    }

    #[test]
    fn test_input_addresses_skip_unresolved() {
        let tx = record(
            vec![
                outpoint("aa", 0, 1000, Some("addr1")),
                TxInput::Outpoint {
                    txid: "bb".to_string(),
                    vout: 1,
                    prevout: None,
                },
            ],
            vec![900],
        );
        assert_eq!(tx.input_addresses(), vec!["addr1"]);
    }

    #[test]
    fn test_input_index_spending() {
        let tx = record(
            vec![outpoint("aa", 0, 1000, None), outpoint("bb", 3, 2000, None)],
            vec![2900],
        );
        assert_eq!(tx.input_index_spending("bb", 3), Some(1));
        assert_eq!(tx.input_index_spending("bb", 4), None);
        assert_eq!(tx.input_index_spending("cc", 0), None);
    }

    #[test]
    fn test_output_status_roundtrip() {
        let unspent = OutputStatus::Unspent {
            value_sats: 5000,
            confirmations: 3,
        };
        assert!(unspent.is_unspent());
        assert!(!OutputStatus::Spent.is_unspent());

        let json = serde_json::to_string(&unspent).unwrap();
        let back: OutputStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unspent);
    }
}
