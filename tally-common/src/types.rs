//! Shared data model
//!
//! Types exchanged between the scan engine, the presentation API and the
//! event stream.

use serde::{Deserialize, Serialize};

/// One distinct scanned code and how many times it was scanned in a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    /// Decoded scan payload, stored exactly as delivered
    pub value: String,
    /// Repeat count (always >= 1)
    pub count: u32,
}

impl ScanEntry {
    /// Create a fresh entry with count 1
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            count: 1,
        }
    }

    /// Render as `value` or `value x count`
    pub fn render(&self) -> String {
        if self.count > 1 {
            format!("{} x {}", self.value, self.count)
        } else {
            self.value.clone()
        }
    }
}

/// Inventory backend connection settings
///
/// Persisted by the settings store; consumed read-only by the lookup client
/// and the health gate.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://inventory.example.com`
    #[serde(default)]
    pub domain: String,
    /// Branch identifier sent in the `branch` header
    #[serde(default)]
    pub branch: String,
    /// Key sent in the `authorization` header
    #[serde(default)]
    pub api_key: String,
}

impl ApiConfig {
    pub fn new(
        domain: impl Into<String>,
        branch: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            branch: branch.into(),
            api_key: api_key.into(),
        }
    }

    /// Product lookups only need a domain
    pub fn is_lookup_configured(&self) -> bool {
        !self.domain.trim().is_empty()
    }

    /// Names of the fields a health probe requires but which are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.domain.trim().is_empty() {
            missing.push("domain");
        }
        if self.branch.trim().is_empty() {
            missing.push("branch");
        }
        if self.api_key.trim().is_empty() {
            missing.push("api_key");
        }
        missing
    }

    /// Domain, branch and key all present
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Domain without surrounding whitespace or trailing slashes
    pub fn base_url(&self) -> &str {
        self.domain.trim().trim_end_matches('/')
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("domain", &self.domain)
            .field("branch", &self.branch)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

/// Backend reachability as last observed by the health gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// No probe has completed yet
    Unknown,
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Unknown => write!(f, "unknown"),
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Product metadata returned by a successful lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_name: Option<String>,
    /// Price in minor currency units (Vietnamese dong)
    pub price: Option<f64>,
    /// Embedded image (data URL or bare base64), validated before it gets here
    pub image: Option<String>,
    /// Item requires special handling; triggers the escalation cue
    #[serde(default)]
    pub is_warning: bool,
    pub link_url: Option<String>,
}

impl ProductInfo {
    /// One-line caption: `<name> - Price: <price>`
    pub fn summary_line(&self) -> String {
        let name = self
            .product_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("Unknown Product");
        let price = self.price.map(format_vnd).unwrap_or_else(|| "N/A".to_string());
        format!("{} - Price: {}", name, price)
    }
}

/// Outcome of looking up one scanned code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupResult {
    Found(ProductInfo),
    /// Lookup failed; `message` is shown to the operator
    Failed { message: String },
}

impl LookupResult {
    pub fn failed(message: impl Into<String>) -> Self {
        LookupResult::Failed {
            message: message.into(),
        }
    }

    /// True when the backend flagged the item for special handling
    pub fn is_warning(&self) -> bool {
        matches!(self, LookupResult::Found(info) if info.is_warning)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            LookupResult::Failed { message } => Some(message),
            LookupResult::Found(_) => None,
        }
    }
}

/// Format an amount as Vietnamese dong, e.g. `125000.0` → `125.000 ₫`
///
/// Dong has no minor unit in display, so the amount is rounded.
pub fn format_vnd(amount: f64) -> String {
    if !amount.is_finite() {
        return "N/A".to_string();
    }
    let rounded = amount.round();
    let digits = format!("{}", rounded.abs() as u64);

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{}{}\u{a0}₫", sign, grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_render() {
        assert_eq!(ScanEntry::new("A1").render(), "A1");
        let entry = ScanEntry {
            value: "A1".to_string(),
            count: 3,
        };
        assert_eq!(entry.render(), "A1 x 3");
    }

    #[test]
    fn test_missing_fields() {
        let config = ApiConfig::new("https://api.example.com", "", "  ");
        assert_eq!(config.missing_fields(), vec!["branch", "api_key"]);
        assert!(!config.is_complete());
        assert!(config.is_lookup_configured());

        assert!(!ApiConfig::default().is_lookup_configured());
        assert!(ApiConfig::new("d", "b", "k").is_complete());
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let config = ApiConfig::new(" https://api.example.com/ ", "b", "k");
        assert_eq!(config.base_url(), "https://api.example.com");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ApiConfig::new("d", "b", "secret-key");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_format_vnd() {
        assert_eq!(format_vnd(0.0), "0\u{a0}₫");
        assert_eq!(format_vnd(999.0), "999\u{a0}₫");
        assert_eq!(format_vnd(125000.0), "125.000\u{a0}₫");
        assert_eq!(format_vnd(1234567.4), "1.234.567\u{a0}₫");
        assert_eq!(format_vnd(-5000.0), "-5.000\u{a0}₫");
    }

    #[test]
    fn test_summary_line() {
        let info = ProductInfo {
            product_name: Some("Nhan bac".to_string()),
            price: Some(250000.0),
            ..Default::default()
        };
        assert_eq!(info.summary_line(), "Nhan bac - Price: 250.000\u{a0}₫");
        assert_eq!(
            ProductInfo::default().summary_line(),
            "Unknown Product - Price: N/A"
        );
    }

    #[test]
    fn test_lookup_result_serialization_is_tagged() {
        let failed = LookupResult::failed("backend down");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], "backend down");

        let found = LookupResult::Found(ProductInfo {
            is_warning: true,
            ..Default::default()
        });
        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json["status"], "found");
        assert_eq!(json["is_warning"], true);
        assert!(found.is_warning());
        assert!(found.error_message().is_none());
    }
}
