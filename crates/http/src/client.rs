//! reqwest-backed implementation of [`SheetsRpc`] against the Sheets v4 REST API.

use crate::credentials::CredentialProvider;
use crate::rpc::{CellMatrix, SheetProperties, SheetsRpc, StructuralOp, ValueInput, ValueRender};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;
use testledger_core::{CellRange, LedgerError, LedgerResult};
use tracing::debug;

/// HTTP client for one authenticated account.
///
/// A bearer token is requested from the credential provider for every call,
/// so a provider that refreshes expiring tokens keeps long runs authorized.
pub struct HttpSheetsRpc {
    client: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

#[derive(Debug, Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: String,
    major_dimension: &'static str,
    values: &'a CellMatrix,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

impl HttpSheetsRpc {
    /// Constructs a client for `base_url` authenticating through `credentials`.
    ///
    /// The underlying client uses a 30-second timeout and bypasses system proxy lookup.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Config` if `base_url` is not a valid base URL, or
    /// `LedgerError::Remote` if building the HTTP client fails.
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialProvider>) -> LedgerResult<Self> {
        Self::with_timeout(base_url, credentials, 30)
    }

    /// Constructs a client with a custom per-request timeout in seconds.
    pub fn with_timeout(
        base_url: &str,
        credentials: Arc<dyn CredentialProvider>,
        timeout_secs: u64,
    ) -> LedgerResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| LedgerError::Config(format!("invalid API base URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(LedgerError::Config(format!(
                "API base URL cannot be a base: {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .no_proxy()
            .build()
            .map_err(|e| LedgerError::Remote(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in the constructor
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn values_url(&self, document_id: &str, range: &CellRange) -> Url {
        let range = range.to_string();
        self.endpoint(&["v4", "spreadsheets", document_id, "values", range.as_str()])
    }
}

/// Turn a non-success response into `LedgerError::Remote`.
fn check_status(response: Response) -> LedgerResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(LedgerError::Remote(format!(
            "HTTP {} - {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )))
    }
}

fn cell_text(value: JsonValue) -> String {
    match value {
        JsonValue::String(s) => s,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn op_request(op: &StructuralOp) -> JsonValue {
    match op {
        StructuralOp::InsertColumns {
            sheet_id,
            start_index,
            count,
            inherit_from_before,
        } => json!({
            "insertDimension": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": "COLUMNS",
                    "startIndex": start_index,
                    "endIndex": start_index + count,
                },
                "inheritFromBefore": inherit_from_before,
            }
        }),
    }
}

#[async_trait]
impl SheetsRpc for HttpSheetsRpc {
    async fn get_range(
        &self,
        document_id: &str,
        range: &CellRange,
        render: ValueRender,
    ) -> LedgerResult<CellMatrix> {
        debug!(document_id, %range, "get range");
        let token = self.credentials.access_token().await?;
        let response = self
            .client
            .get(self.values_url(document_id, range))
            .bearer_auth(token.secret())
            .query(&[("valueRenderOption", render.as_api_str())])
            .send()
            .await
            .map_err(|e| LedgerError::Remote(e.to_string()))?;

        let body: ValueRangeResponse = check_status(response)?
            .json()
            .await
            .map_err(|e| LedgerError::Remote(format!("Failed to parse JSON: {e}")))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn set_range(
        &self,
        document_id: &str,
        range: &CellRange,
        values: CellMatrix,
        input: ValueInput,
    ) -> LedgerResult<()> {
        debug!(document_id, %range, rows = values.len(), "set range");
        let body = ValueRangeBody {
            range: range.to_string(),
            major_dimension: "ROWS",
            values: &values,
        };

        let token = self.credentials.access_token().await?;
        let response = self
            .client
            .put(self.values_url(document_id, range))
            .bearer_auth(token.secret())
            .query(&[("valueInputOption", input.as_api_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Remote(e.to_string()))?;

        check_status(response)?;
        Ok(())
    }

    async fn get_metadata(&self, document_id: &str) -> LedgerResult<Vec<SheetProperties>> {
        debug!(document_id, "get metadata");
        let token = self.credentials.access_token().await?;
        let response = self
            .client
            .get(self.endpoint(&["v4", "spreadsheets", document_id]))
            .bearer_auth(token.secret())
            .query(&[("fields", "sheets.properties(sheetId,title)")])
            .send()
            .await
            .map_err(|e| LedgerError::Remote(e.to_string()))?;

        let body: SpreadsheetResponse = check_status(response)?
            .json()
            .await
            .map_err(|e| LedgerError::Remote(format!("Failed to parse JSON: {e}")))?;

        Ok(body.sheets.into_iter().map(|s| s.properties).collect())
    }

    async fn batch_update(&self, document_id: &str, ops: Vec<StructuralOp>) -> LedgerResult<()> {
        debug!(document_id, ops = ops.len(), "batch update");
        let requests: Vec<JsonValue> = ops.iter().map(op_request).collect();
        let batch_path = format!("{document_id}:batchUpdate");

        let token = self.credentials.access_token().await?;
        let response = self
            .client
            .post(self.endpoint(&["v4", "spreadsheets", batch_path.as_str()]))
            .bearer_auth(token.secret())
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| LedgerError::Remote(e.to_string()))?;

        check_status(response)?;
        Ok(())
    }
}
