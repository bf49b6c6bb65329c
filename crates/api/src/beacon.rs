//! Beacon node REST API client.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::validators::{u64_from_str_or_num, PendingPartialWithdrawal};

pub const SLOTS_PER_EPOCH: u64 = 32;

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct HeaderData {
    header: SignedHeader,
}

#[derive(Debug, Deserialize)]
struct SignedHeader {
    message: HeaderMessage,
}

#[derive(Debug, Deserialize)]
struct HeaderMessage {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    slot: u64,
}

#[derive(Debug, Clone)]
pub struct BeaconNodeClient {
    client: reqwest::Client,
    base_url: String,
}

impl BeaconNodeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Head state's pending partial withdrawal queue.
    #[instrument(skip(self))]
    pub async fn get_pending_partial_withdrawals(&self) -> Result<Vec<PendingPartialWithdrawal>> {
        let url = format!(
            "{}/eth/v1/beacon/states/head/pending_partial_withdrawals",
            self.base_url
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .context("pending_partial_withdrawals request failed")?;

        let body: DataResponse<Vec<PendingPartialWithdrawal>> = response.json().await?;
        debug!(count = body.data.len(), "Fetched pending partial withdrawals");
        Ok(body.data)
    }

    pub async fn get_head_slot(&self) -> Result<u64> {
        let url = format!("{}/eth/v1/beacon/headers/head", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .context("head header request failed")?;

        let body: DataResponse<HeaderData> = response.json().await?;
        Ok(body.data.header.message.slot)
    }

    pub async fn get_current_epoch(&self) -> Result<u64> {
        Ok(self.get_head_slot().await? / SLOTS_PER_EPOCH)
    }
}
