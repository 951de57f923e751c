//! Client for the external spreadsheet metadata provider.
//!
//! Two independent read paths: file metadata (modified time + last editor)
//! from the drive API, and the ordered tab list from the sheets API. Both
//! are keyed by the spreadsheet id and never retried.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Modification metadata for one spreadsheet, as reported by the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetMetadata {
    pub modified_time: Option<String>,
    pub last_user: Option<String>,
    pub last_user_email: Option<String>,
}

/// Why a provider call produced no data. Callers degrade all of these to
/// "no metadata", but the kind is kept so future retry logic can tell
/// permanent conditions from transient ones.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
    #[error("spreadsheet not found")]
    NotFound,
    #[error("permission denied by provider")]
    PermissionDenied,
    #[error("provider returned HTTP {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed provider response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait SpreadsheetProvider: Send + Sync {
    /// Fetch modification metadata for a spreadsheet id.
    async fn file_metadata(&self, sheet_id: &str) -> Result<SheetMetadata, ProviderErrorKind>;

    /// Fetch the ordered list of tab titles for a spreadsheet id.
    async fn tab_titles(&self, sheet_id: &str) -> Result<Vec<String>, ProviderErrorKind>;
}

// --- Wire types ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    modified_time: Option<String>,
    last_modifying_user: Option<DriveUser>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DriveUser {
    display_name: Option<String>,
    email_address: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize, Debug)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize, Debug)]
struct SheetProperties {
    title: String,
}

/// `reqwest`-backed implementation against the Google drive/sheets v3/v4
/// REST surface. Constructed once at startup and injected.
pub struct GoogleSheetsApi {
    client: Client,
    drive_api_url: String,
    sheets_api_url: String,
    api_key: String,
}

impl GoogleSheetsApi {
    pub fn new(drive_api_url: &str, sheets_api_url: &str, api_key: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap(); // Should not fail with default settings
        Self {
            client,
            drive_api_url: drive_api_url.trim_end_matches('/').to_string(),
            sheets_api_url: sheets_api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn classify_status(status: StatusCode) -> ProviderErrorKind {
        match status {
            StatusCode::NOT_FOUND => ProviderErrorKind::NotFound,
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => ProviderErrorKind::PermissionDenied,
            other => ProviderErrorKind::Http(other.as_u16()),
        }
    }
}

#[async_trait]
impl SpreadsheetProvider for GoogleSheetsApi {
    async fn file_metadata(&self, sheet_id: &str) -> Result<SheetMetadata, ProviderErrorKind> {
        let url = format!(
            "{}/files/{}?fields=modifiedTime,lastModifyingUser(displayName,emailAddress)&key={}",
            self.drive_api_url, sheet_id, self.api_key
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderErrorKind::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::classify_status(response.status()));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| ProviderErrorKind::Decode(e.to_string()))?;

        Ok(SheetMetadata {
            modified_time: file.modified_time,
            last_user: file
                .last_modifying_user
                .as_ref()
                .and_then(|u| u.display_name.clone()),
            last_user_email: file
                .last_modifying_user
                .as_ref()
                .and_then(|u| u.email_address.clone()),
        })
    }

    async fn tab_titles(&self, sheet_id: &str) -> Result<Vec<String>, ProviderErrorKind> {
        let url = format!(
            "{}/spreadsheets/{}?fields=sheets.properties.title&key={}",
            self.sheets_api_url, sheet_id, self.api_key
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderErrorKind::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::classify_status(response.status()));
        }

        let spreadsheet: Spreadsheet = response
            .json()
            .await
            .map_err(|e| ProviderErrorKind::Decode(e.to_string()))?;

        Ok(spreadsheet
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }
}
