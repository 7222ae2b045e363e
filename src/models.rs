use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hard cap applied to `limit` before any upstream feed call.
pub const MAX_IMPORT_LIMIT: u32 = 100;
pub const DEFAULT_IMPORT_LIMIT: u32 = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct BulkImportRequest {
    #[serde(default)]
    pub feed_type: String,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub skip_similar: bool,
}

impl BulkImportRequest {
    pub fn clamped_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_IMPORT_LIMIT)
            .clamp(1, MAX_IMPORT_LIMIT)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FeedType {
    Mixed,
    Bestselling,
    NewArrival,
    Promotion,
    Choice,
}

impl FeedType {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "mixed" => Some(FeedType::Mixed),
            "bestselling" | "best-selling" => Some(FeedType::Bestselling),
            "new-arrival" | "new_arrival" => Some(FeedType::NewArrival),
            "promotion" => Some(FeedType::Promotion),
            "choice" => Some(FeedType::Choice),
            _ => None,
        }
    }

    /// Upstream feed name. `Mixed` has no single feed; the client fans out
    /// over the concrete ones.
    pub fn feed_name(&self) -> Option<&'static str> {
        match self {
            FeedType::Mixed => None,
            FeedType::Bestselling => Some("ds-bestselling"),
            FeedType::NewArrival => Some("ds-new-arrival"),
            FeedType::Promotion => Some("ds-promotion"),
            FeedType::Choice => Some("ds-choice"),
        }
    }

    pub fn concrete() -> [FeedType; 4] {
        [
            FeedType::Bestselling,
            FeedType::NewArrival,
            FeedType::Promotion,
            FeedType::Choice,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedType::Mixed => "mixed",
            FeedType::Bestselling => "bestselling",
            FeedType::NewArrival => "new-arrival",
            FeedType::Promotion => "promotion",
            FeedType::Choice => "choice",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkImportResponse {
    pub success: bool,
    pub message: String,
    pub results: ImportReport,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub total_found: u32,
    pub imported: u32,
    pub failed: u32,
    pub errors: Vec<String>,
    pub imported_products: Vec<ImportedProductSummary>,
}

impl ImportReport {
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(message.into());
    }

    pub fn record_import(&mut self, summary: ImportedProductSummary) {
        self.imported += 1;
        self.imported_products.push(summary);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedProductSummary {
    pub id: String,
    pub name: String,
    pub sku: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub imported_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_type_parses_every_variant() {
        assert_eq!(FeedType::parse("mixed"), Some(FeedType::Mixed));
        assert_eq!(FeedType::parse("Bestselling"), Some(FeedType::Bestselling));
        assert_eq!(FeedType::parse("new-arrival"), Some(FeedType::NewArrival));
        assert_eq!(FeedType::parse("new_arrival"), Some(FeedType::NewArrival));
        assert_eq!(FeedType::parse(" promotion "), Some(FeedType::Promotion));
        assert_eq!(FeedType::parse("choice"), Some(FeedType::Choice));
        assert_eq!(FeedType::parse(""), None);
        assert_eq!(FeedType::parse("flash-deal"), None);
    }

    #[test]
    fn limit_clamps_to_100() {
        let req = BulkImportRequest {
            feed_type: "bestselling".into(),
            limit: Some(500),
            skip_similar: false,
        };
        assert_eq!(req.clamped_limit(), 100);
    }

    #[test]
    fn limit_defaults_when_absent() {
        let req = BulkImportRequest {
            feed_type: "choice".into(),
            limit: None,
            skip_similar: false,
        };
        assert_eq!(req.clamped_limit(), DEFAULT_IMPORT_LIMIT);
    }

    #[test]
    fn report_counts_stay_balanced() {
        let mut report = ImportReport {
            total_found: 2,
            ..ImportReport::default()
        };
        report.record_failure("duplicate");
        report.record_import(ImportedProductSummary {
            id: "p-1".into(),
            name: "Montre".into(),
            sku: "AE-DS-1".into(),
            price: 9.99,
            category: None,
            imported_at: Utc::now(),
        });
        assert_eq!(report.imported + report.failed, report.total_found);
    }
}
