//! Microsoft Graph wire types.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Subset of a `driveItem` resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItemResponse {
    pub id: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub last_modified_date_time: Option<DateTime<Utc>>,
}

impl DriveItemResponse {
    /// Modification time in nanoseconds since the Unix epoch.
    #[must_use]
    pub fn modified_ns(&self) -> Option<i128> {
        self.last_modified_date_time
            .and_then(|t| t.timestamp_nanos_opt())
            .map(i128::from)
    }
}

/// Client-credentials token grant.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

const fn default_expires_in() -> i64 {
    3600
}

/// OAuth error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Graph error envelope, `{"error": {"code", "message"}}`.
#[derive(Debug, Deserialize)]
pub struct GraphErrorResponse {
    pub error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_item_parsing() {
        let json = r#"{
            "id": "01XYZ",
            "size": 52431,
            "lastModifiedDateTime": "2024-03-01T10:15:30Z",
            "parentReference": {"driveId": "b!abc"}
        }"#;
        let item: DriveItemResponse = serde_json::from_str(json).unwrap();
        assert_eq!(item.size, Some(52431));
        assert_eq!(item.modified_ns(), Some(1_709_288_130_000_000_000));
    }

    #[test]
    fn test_drive_item_without_metadata() {
        let item: DriveItemResponse = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert!(item.size.is_none());
        assert!(item.modified_ns().is_none());
    }

    #[test]
    fn test_token_response_default_expiry() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc", "token_type": "Bearer"}"#).unwrap();
        assert_eq!(token.expires_in, 3600);
    }

    #[test]
    fn test_graph_error_parsing() {
        let json = r#"{"error": {"code": "itemNotFound", "message": "The resource could not be found."}}"#;
        let err: GraphErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(err.error.code, "itemNotFound");
    }
}
