//! Staking GraphQL API client for validator balances.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::validators::ValidatorBalance;

const ACTIVE_VALIDATORS_QUERY: &str = r#"
query AllValidatorsByLargestBalance {
  allHeadValidators(condition: { state: ACTIVE }, orderBy: BALANCE_DESC) {
    nodes {
      balance
      effectiveBalance
      publicKey
      validatorIndex
      activationEpoch
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidatorsData {
    all_head_validators: Option<Nodes<ValidatorBalance>>,
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct StakingApiClient {
    client: reqwest::Client,
    url: String,
    /// Optional bearer token for authenticated endpoints
    auth_token: Option<String>,
}

impl StakingApiClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Active validators, largest balance first.
    #[instrument(skip(self))]
    pub async fn get_active_validators(&self) -> Result<Vec<ValidatorBalance>> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&json!({ "query": ACTIVE_VALIDATORS_QUERY }));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await?
            .error_for_status()
            .context("staking API request failed")?;
        let body: GraphQlResponse<ValidatorsData> = response.json().await?;
        let validators = parse_validators(body)?;

        info!(validator_count = validators.len(), "Fetched active validators");
        Ok(validators)
    }
}

fn parse_validators(body: GraphQlResponse<ValidatorsData>) -> Result<Vec<ValidatorBalance>> {
    if let Some(err) = body.errors.first() {
        anyhow::bail!("staking API error: {}", err.message);
    }
    let data = body.data.context("staking API returned no data")?;
    Ok(data
        .all_head_validators
        .map(|page| page.nodes)
        .unwrap_or_default())
}
