//! Inventory backend client
//!
//! Queries the stock-taking backend for product metadata, probes its health
//! endpoint and posts ledger exports.
//!
//! # API Reference
//! - `GET {domain}/api/health`
//! - `GET {domain}/api/product?productName={code}`
//! - `POST {domain}/api/copy-scan-result` with `{ "items": [{ "value", "count" }] }`
//!
//! Every request carries the `authorization` (API key) and `branch` headers.

use async_trait::async_trait;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tally_common::{ApiConfig, Error, LookupResult, ProductInfo, Result, ScanEntry};
use tracing::{debug, warn};

/// Default timeout for backend requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepts what browsers' `atob` accepts: optional padding, loose trailing bits
const IMAGE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Operations the scan controller needs from the inventory backend
///
/// Implemented by [`LookupClient`] over HTTP; tests substitute fakes.
#[async_trait]
pub trait InventoryBackend: Send + Sync {
    /// Look up one scanned code; failures come back as [`LookupResult::Failed`]
    async fn lookup(&self, config: &ApiConfig, code: &str) -> LookupResult;

    /// One health probe request; `Ok` iff the backend answered with success
    async fn check_health(&self, config: &ApiConfig) -> Result<()>;

    /// Post the ledger contents to the backend
    async fn export_scan_result(&self, config: &ApiConfig, items: &[ScanEntry]) -> Result<()>;
}

/// HTTP implementation of [`InventoryBackend`]
#[derive(Debug, Clone)]
pub struct LookupClient {
    http_client: Client,
}

impl LookupClient {
    /// Create a client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }

    fn with_credentials(builder: RequestBuilder, config: &ApiConfig) -> RequestBuilder {
        builder
            .header("authorization", config.api_key.as_str())
            .header("branch", config.branch.as_str())
    }

    /// Fetch and normalize product metadata
    ///
    /// # Errors
    /// [`Error::Network`] if the request fails, the status is not 2xx or the
    /// body is not the expected JSON.
    pub async fn fetch_product(&self, config: &ApiConfig, code: &str) -> Result<ProductInfo> {
        let url = format!("{}/api/product", config.base_url());
        debug!(code = %code, url = %url, "Looking up product");

        let response = Self::with_credentials(self.http_client.get(&url), config)
            .query(&[("productName", code)])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Product request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!(
                "Product lookup returned status {}",
                status
            )));
        }

        let body: ProductResponse = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Malformed product response: {}", e)))?;

        Ok(body.into_product_info())
    }
}

#[async_trait]
impl InventoryBackend for LookupClient {
    async fn lookup(&self, config: &ApiConfig, code: &str) -> LookupResult {
        match self.fetch_product(config, code).await {
            Ok(info) => LookupResult::Found(info),
            Err(e) => {
                warn!(code = %code, error = %e, "Product lookup failed");
                LookupResult::failed(format!("Lookup failed, please contact an administrator ({})", e))
            }
        }
    }

    async fn check_health(&self, config: &ApiConfig) -> Result<()> {
        let url = format!("{}/api/health", config.base_url());

        let response = Self::with_credentials(self.http_client.get(&url), config)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Health request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Network(format!("Health check returned status {}", status)))
        }
    }

    async fn export_scan_result(&self, config: &ApiConfig, items: &[ScanEntry]) -> Result<()> {
        let url = format!("{}/api/copy-scan-result", config.base_url());

        let response = Self::with_credentials(self.http_client.post(&url), config)
            .json(&ExportRequest { items })
            .send()
            .await
            .map_err(|e| Error::Network(format!("Export request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            debug!(items = items.len(), "Scan result exported");
            Ok(())
        } else {
            Err(Error::Network(format!("Export returned status {}", status)))
        }
    }
}

/// Check that an embedded image payload decodes
///
/// Accepts bare base64 or a `data:image/<type>;base64,` URL. Whitespace inside
/// the payload is ignored.
pub fn validate_embedded_image(payload: &str) -> Result<()> {
    if payload.is_empty() {
        return Err(Error::Validation("Empty image payload".to_string()));
    }

    let data = strip_data_url_prefix(payload);
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    IMAGE_ENGINE
        .decode(cleaned.as_bytes())
        .map(|_| ())
        .map_err(|e| Error::Validation(format!("Malformed image payload: {}", e)))
}

fn strip_data_url_prefix(payload: &str) -> &str {
    if let Some(rest) = payload.strip_prefix("data:image/") {
        if let Some(pos) = rest.find(";base64,") {
            let subtype = &rest[..pos];
            if !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphabetic() || c == '+') {
                return &rest[pos + ";base64,".len()..];
            }
        }
    }
    payload
}

// ============================================================================
// Backend wire types
// ============================================================================

#[derive(Serialize)]
struct ExportRequest<'a> {
    items: &'a [ScanEntry],
}

/// Product response body
///
/// `price` and `isWarning` are taken leniently: a value of the wrong JSON
/// type reads as absent instead of failing the whole lookup.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductResponse {
    product_name: Option<String>,
    price: Option<serde_json::Value>,
    base64: Option<String>,
    is_warning: Option<serde_json::Value>,
    #[serde(rename = "linkPostFB")]
    link_post_fb: Option<String>,
}

impl ProductResponse {
    fn into_product_info(self) -> ProductInfo {
        let image = self.base64.filter(|payload| !payload.is_empty()).and_then(|payload| {
            match validate_embedded_image(&payload) {
                Ok(()) => Some(payload),
                Err(e) => {
                    debug!(error = %e, "Dropping malformed product image");
                    None
                }
            }
        });

        ProductInfo {
            product_name: self.product_name,
            price: self.price.as_ref().and_then(serde_json::Value::as_f64),
            image,
            is_warning: self
                .is_warning
                .as_ref()
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
            link_url: self.link_post_fb.filter(|url| !url.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn parse(body: serde_json::Value) -> ProductInfo {
        serde_json::from_value::<ProductResponse>(body)
            .unwrap()
            .into_product_info()
    }

    #[test]
    fn test_validate_bare_base64() {
        assert!(validate_embedded_image(PNG_1X1).is_ok());
    }

    #[test]
    fn test_validate_data_url() {
        let url = format!("data:image/png;base64,{}", PNG_1X1);
        assert!(validate_embedded_image(&url).is_ok());

        let svg = "data:image/svg+xml;base64,PHN2Zz48L3N2Zz4=";
        assert!(validate_embedded_image(svg).is_ok());
    }

    #[test]
    fn test_validate_tolerates_missing_padding_and_whitespace() {
        assert!(validate_embedded_image("PHN2Zz48L3N2Zz4").is_ok());
        assert!(validate_embedded_image("PHN2 Zz48\nL3N2Zz4=").is_ok());
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(matches!(
            validate_embedded_image("not*base64!"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(validate_embedded_image(""), Err(Error::Validation(_))));
        // Prefix with an invalid subtype is not stripped, so the colon fails decoding
        assert!(validate_embedded_image("data:image/p-n-g;base64,AAAA").is_err());
    }

    #[test]
    fn test_response_normalization() {
        let info = parse(json!({
            "productName": "Nhan bac 925",
            "price": 250000,
            "base64": format!("data:image/png;base64,{}", PNG_1X1),
            "isWarning": true,
            "linkPostFB": "https://facebook.com/post/1"
        }));

        assert_eq!(info.product_name.as_deref(), Some("Nhan bac 925"));
        assert_eq!(info.price, Some(250000.0));
        assert!(info.image.is_some());
        assert!(info.is_warning);
        assert_eq!(info.link_url.as_deref(), Some("https://facebook.com/post/1"));
    }

    #[test]
    fn test_malformed_image_downgraded_to_none() {
        let info = parse(json!({
            "productName": "Vong tay",
            "base64": "%%%not-an-image%%%"
        }));
        assert_eq!(info.product_name.as_deref(), Some("Vong tay"));
        assert!(info.image.is_none());
    }

    #[test]
    fn test_lenient_fields() {
        let info = parse(json!({
            "price": "12.000",
            "isWarning": "yes",
            "base64": "",
            "linkPostFB": ""
        }));
        assert!(info.price.is_none());
        assert!(!info.is_warning);
        assert!(info.image.is_none());
        assert!(info.link_url.is_none());
    }

    #[test]
    fn test_empty_body_object() {
        let info = parse(json!({}));
        assert_eq!(info, ProductInfo::default());
    }

    #[test]
    fn test_client_construction() {
        assert!(LookupClient::new(DEFAULT_TIMEOUT).is_ok());
    }
}
