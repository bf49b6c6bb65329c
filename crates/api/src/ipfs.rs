//! IPFS gateway client for LazyOracle report trees.
//!
//! Reports are published as OpenZeppelin `StandardMerkleTree` dumps: the
//! flattened tree (root at index 0, children of `i` at `2i+1` and `2i+2`)
//! plus the leaf values with their tree positions. Proofs are rebuilt from
//! the flattened array; pairs are hashed in sorted order.

use alloy::primitives::{keccak256, Address, B256, U256};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, instrument};

/// Raw tree dump as served by the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTree {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub leaf_encoding: Vec<String>,
    pub tree: Vec<B256>,
    pub values: Vec<ReportTreeValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTreeValue {
    pub value: Vec<serde_json::Value>,
    pub tree_index: usize,
}

/// One vault's entry in the report tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultLeaf {
    pub vault: Address,
    pub total_value: U256,
    pub cumulative_lido_fees: U256,
    pub liability_shares: U256,
    pub max_liability_shares: U256,
    pub slashing_reserve: U256,
    pub tree_index: usize,
}

fn parse_u256(value: &serde_json::Value) -> Result<U256> {
    match value {
        serde_json::Value::String(s) => U256::from_str(s.trim()).context("invalid uint in report leaf"),
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .context("non-integer number in report leaf"),
        other => anyhow::bail!("unexpected report leaf field: {other}"),
    }
}

fn hash_pair(a: B256, b: B256) -> B256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo.as_slice());
    buf[32..].copy_from_slice(hi.as_slice());
    keccak256(buf)
}

/// Fold `proof` onto `leaf`, returning the implied root.
pub fn process_proof(leaf: B256, proof: &[B256]) -> B256 {
    proof.iter().fold(leaf, |acc, sibling| hash_pair(acc, *sibling))
}

impl ReportTree {
    pub fn root(&self) -> Option<B256> {
        self.tree.first().copied()
    }

    /// Locate the leaf for `vault`, parsing its fields.
    pub fn find_vault(&self, vault: Address) -> Result<Option<VaultLeaf>> {
        for entry in &self.values {
            let Some(first) = entry.value.first().and_then(|v| v.as_str()) else {
                continue;
            };
            let Ok(address) = Address::from_str(first) else {
                continue;
            };
            if address != vault {
                continue;
            }
            if entry.value.len() < 6 {
                anyhow::bail!("report leaf for {vault} has {} fields", entry.value.len());
            }
            return Ok(Some(VaultLeaf {
                vault,
                total_value: parse_u256(&entry.value[1])?,
                cumulative_lido_fees: parse_u256(&entry.value[2])?,
                liability_shares: parse_u256(&entry.value[3])?,
                max_liability_shares: parse_u256(&entry.value[4])?,
                slashing_reserve: parse_u256(&entry.value[5])?,
                tree_index: entry.tree_index,
            }));
        }
        Ok(None)
    }

    /// Sibling path from leaf `tree_index` up to the root.
    pub fn proof(&self, tree_index: usize) -> Result<Vec<B256>> {
        let len = self.tree.len();
        // leaves occupy the second half of the array
        if tree_index >= len || 2 * tree_index + 1 < len {
            anyhow::bail!("tree index {tree_index} is not a leaf of a {len}-node tree");
        }

        let mut proof = Vec::new();
        let mut index = tree_index;
        while index > 0 {
            let sibling = if index % 2 == 1 { index + 1 } else { index - 1 };
            let node = self
                .tree
                .get(sibling)
                .copied()
                .with_context(|| format!("sibling {sibling} missing from tree"))?;
            proof.push(node);
            index = (index - 1) / 2;
        }
        Ok(proof)
    }
}

#[derive(Debug, Clone)]
pub struct IpfsClient {
    client: reqwest::Client,
    base_url: String,
}

impl IpfsClient {
    /// `base_url` is the gateway prefix the CID is appended to,
    /// e.g. `https://ipfs.io/ipfs`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    #[instrument(skip(self))]
    pub async fn fetch_report_tree(&self, cid: &str) -> Result<ReportTree> {
        let url = format!("{}/{}", self.base_url, cid);
        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("IPFS fetch failed for {cid}"))?;

        let tree: ReportTree = response.json().await?;
        debug!(
            cid = cid,
            format = %tree.format,
            nodes = tree.tree.len(),
            leaves = tree.values.len(),
            "Fetched report tree"
        );
        Ok(tree)
    }
}
