use crate::cache::{self, CacheStore};
use crate::enricher;
use crate::feed::{CandidateProduct, FeedClient};
use crate::models::{BulkImportRequest, FeedType, ImportReport, ImportedProductSummary};
use crate::supabase::{ExistingProduct, InsertedProduct, NewProduct, NewProductImage, SupabaseClient};
use crate::tagger;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct ImportError {
    stage: &'static str,
    message: String,
    kind: ImportErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportErrorKind {
    InvalidInput,
    Internal,
}

impl ImportError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: ImportErrorKind::InvalidInput,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: ImportErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> ImportErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    /// Exact SKU match; never re-imported.
    Hard,
    /// Name overlap only; skipped when the caller asked for it.
    Soft,
}

#[derive(Clone)]
pub struct BulkImporter {
    feed: FeedClient,
    supabase: Option<SupabaseClient>,
    cache: CacheStore,
    default_category_slug: Option<String>,
    default_stock: i32,
}

impl BulkImporter {
    pub fn new(feed: FeedClient, supabase: Option<SupabaseClient>, cache: CacheStore) -> Self {
        let default_category_slug = std::env::var("FALLBACK_CATEGORY_SLUG")
            .ok()
            .filter(|slug| !slug.trim().is_empty());
        let default_stock = std::env::var("DEFAULT_STOCK_QTY")
            .ok()
            .and_then(|value| value.parse::<i32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(50);
        Self {
            feed,
            supabase,
            cache,
            default_category_slug,
            default_stock,
        }
    }

    pub fn from_env(cache: CacheStore) -> Self {
        Self::new(FeedClient::new(), SupabaseClient::from_env(), cache)
    }

    /// One bulk import request, start to finish. Per-item failures land in
    /// the report; only an invalid feed type or a dead upstream escape as
    /// errors.
    pub async fn run(&self, request: &BulkImportRequest) -> Result<ImportReport, ImportError> {
        let Some(feed_type) = FeedType::parse(&request.feed_type) else {
            return Err(ImportError::invalid_input(
                "feed",
                format!("invalid feed_type `{}`", request.feed_type),
            ));
        };
        let limit = request.clamped_limit();

        let candidates = self.fetch_candidates(feed_type, limit).await?;
        info!(
            target = "jomion.import",
            feed = feed_type.as_str(),
            found = candidates.len() as u64,
            skip_similar = request.skip_similar,
            "bulk import started"
        );

        let report = self
            .import_candidates(candidates, request.skip_similar)
            .await;
        crate::metrics::import_outcome(report.imported, report.failed);
        Ok(report)
    }

    async fn fetch_candidates(
        &self,
        feed_type: FeedType,
        limit: u32,
    ) -> Result<Vec<CandidateProduct>, ImportError> {
        let key = cache::feed_cache_key(feed_type.as_str(), limit);
        if let Some(cached) = self.cache.get::<Vec<CandidateProduct>>(&key).await {
            return Ok(cached);
        }
        let fetched = self
            .feed
            .fetch(feed_type, limit)
            .await
            .map_err(|err| ImportError::internal("feed_fetch", err.to_string()))?;
        if !fetched.is_empty() {
            self.cache.set(&key, &fetched, cache::feed_cache_ttl()).await;
        }
        Ok(fetched)
    }

    /// The sequential batch loop. Each candidate is awaited to completion
    /// before the next starts; a failure is recorded and the loop moves on.
    pub async fn import_candidates(
        &self,
        candidates: Vec<CandidateProduct>,
        skip_similar: bool,
    ) -> ImportReport {
        let mut report = ImportReport {
            total_found: candidates.len() as u32,
            ..ImportReport::default()
        };
        let category_ids = self.load_category_map().await;

        for candidate in candidates {
            match self
                .import_one(&candidate, skip_similar, &category_ids)
                .await
            {
                Ok(summary) => report.record_import(summary),
                Err(reason) => report.record_failure(reason),
            }
        }
        report
    }

    async fn import_one(
        &self,
        candidate: &CandidateProduct,
        skip_similar: bool,
        category_ids: &HashMap<String, String>,
    ) -> Result<ImportedProductSummary, String> {
        let sku = candidate.sku();

        let existing = self
            .lookup_existing(&sku, &candidate.title)
            .await
            .map_err(|err| format!("`{}`: duplicate check failed: {err}", candidate.title))?;
        if let Some(rejection) =
            rejection_for(&candidate.title, &sku, classify_duplicate(&sku, &existing), skip_similar)
        {
            return Err(rejection);
        }

        let analysis = tagger::analyze(&candidate.title, Some(candidate.feed));
        let category_slug = analysis
            .suggested_category
            .map(str::to_string)
            .or_else(|| self.default_category_slug.clone());
        let category_id = category_slug
            .as_deref()
            .and_then(|slug| category_ids.get(slug).cloned());

        let description =
            enricher::clean_description(candidate.description.as_deref().unwrap_or_default());
        let mut specifications = enricher::build_specifications(candidate, &analysis.tags);
        if let Some(label) = category_slug.as_deref().and_then(tagger::label_for_slug) {
            specifications.insert("category_label".to_string(), Value::String(label.to_string()));
        }

        let product = NewProduct {
            name: candidate.title.clone(),
            description,
            price: candidate.price,
            original_price: candidate.original_price,
            sku: sku.clone(),
            stock_quantity: self.default_stock,
            category_id,
            specifications: Value::Object(specifications),
            source_url: candidate.detail_url.clone(),
            source_platform: "aliexpress".to_string(),
        };

        let inserted = self
            .persist_product(&product)
            .await
            .map_err(|err| format!("`{}`: insert failed: {err}", candidate.title))?;

        self.persist_images(&inserted.id, &candidate.image_urls).await;

        Ok(ImportedProductSummary {
            id: inserted.id,
            name: candidate.title.clone(),
            sku,
            price: candidate.price,
            category: category_slug,
            imported_at: Utc::now(),
        })
    }

    async fn lookup_existing(
        &self,
        sku: &str,
        title: &str,
    ) -> Result<Vec<ExistingProduct>, String> {
        let Some(supabase) = &self.supabase else {
            return Ok(Vec::new());
        };
        supabase
            .find_similar_products(sku, &name_fragment(title))
            .await
            .map_err(|err| err.to_string())
    }

    async fn load_category_map(&self) -> HashMap<String, String> {
        let Some(supabase) = &self.supabase else {
            return HashMap::new();
        };
        match supabase.fetch_category_map().await {
            Ok(map) => map,
            Err(err) => {
                warn!(
                    target = "jomion.supabase",
                    error = %err,
                    "category_map_lookup_failed"
                );
                HashMap::new()
            }
        }
    }

    async fn persist_product(&self, product: &NewProduct) -> Result<InsertedProduct, String> {
        let Some(supabase) = &self.supabase else {
            // Catalog-offline mode mints a synthetic id so the loop and its
            // accounting stay observable without a database.
            return Ok(InsertedProduct {
                id: format!("offline-{}", Uuid::new_v4().simple()),
            });
        };
        supabase
            .insert_product(product)
            .await
            .map_err(|err| err.to_string())
    }

    /// Image failures are logged, never fatal to the product.
    async fn persist_images(&self, product_id: &str, image_urls: &[String]) {
        let Some(supabase) = &self.supabase else {
            return;
        };
        let rows: Vec<NewProductImage> = image_urls
            .iter()
            .enumerate()
            .map(|(index, url)| NewProductImage {
                product_id: product_id.to_string(),
                url: url.clone(),
                display_order: index as i32,
                is_primary: index == 0,
            })
            .collect();
        if let Err(err) = supabase.insert_product_images(&rows).await {
            warn!(
                target = "jomion.supabase",
                product_id = product_id,
                error = %err,
                "product_images_insert_failed"
            );
        }
    }
}

pub fn classify_duplicate(sku: &str, existing: &[ExistingProduct]) -> Option<DuplicateKind> {
    if existing.iter().any(|row| row.sku.as_deref() == Some(sku)) {
        return Some(DuplicateKind::Hard);
    }
    if !existing.is_empty() {
        return Some(DuplicateKind::Soft);
    }
    None
}

fn rejection_for(
    title: &str,
    sku: &str,
    kind: Option<DuplicateKind>,
    skip_similar: bool,
) -> Option<String> {
    match kind {
        Some(DuplicateKind::Hard) => Some(format!("`{title}` already imported (SKU {sku})")),
        Some(DuplicateKind::Soft) if skip_similar => {
            Some(format!("`{title}` skipped: a similarly named product exists"))
        }
        _ => None,
    }
}

/// First significant words of the title feed the `ilike` lookup.
pub fn name_fragment(title: &str) -> String {
    title
        .split_whitespace()
        .filter(|word| word.chars().count() >= 3)
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_IMPORT_LIMIT;

    fn offline_importer() -> BulkImporter {
        BulkImporter::new(FeedClient::new(), None, CacheStore::new(None))
    }

    fn candidate(id: &str, title: &str) -> CandidateProduct {
        CandidateProduct {
            external_id: id.to_string(),
            title: title.to_string(),
            image_urls: vec![format!("https://img.example.com/{id}.jpg")],
            price: 9.99,
            original_price: Some(14.99),
            detail_url: Some(format!("https://example.com/item/{id}")),
            rating: None,
            volume: None,
            description: Some("Produit importé depuis AliExpress via API.".into()),
            feed: FeedType::Choice,
        }
    }

    fn existing(sku: Option<&str>, name: &str) -> ExistingProduct {
        ExistingProduct {
            id: "row-1".into(),
            name: name.into(),
            sku: sku.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn batch_counts_stay_balanced() {
        let importer = offline_importer();
        let report = importer
            .import_candidates(
                vec![candidate("1", "Montre cuir"), candidate("2", "Sac noir")],
                false,
            )
            .await;
        assert_eq!(report.total_found, 2);
        assert_eq!(report.imported + report.failed, report.total_found);
        assert_eq!(report.imported, 2);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn imported_summary_carries_computed_sku() {
        let importer = offline_importer();
        let report = importer
            .import_candidates(vec![candidate("100123", "Portefeuille cuir noir")], false)
            .await;
        let summary = report.imported_products.first().expect("summary");
        assert_eq!(summary.sku, "AE-DS-100123");
        assert!(summary.id.starts_with("offline-"));
    }

    #[tokio::test]
    async fn run_rejects_unknown_feed_type() {
        let importer = offline_importer();
        let err = importer
            .run(&BulkImportRequest {
                feed_type: "flash-deal".into(),
                limit: None,
                skip_similar: false,
            })
            .await
            .expect_err("should reject");
        assert_eq!(err.kind(), ImportErrorKind::InvalidInput);
        assert_eq!(err.stage(), "feed");
    }

    #[tokio::test]
    async fn run_consumes_cached_feed_pages() {
        let cache = CacheStore::new(None);
        let key = cache::feed_cache_key("choice", DEFAULT_IMPORT_LIMIT);
        cache
            .set(
                &key,
                &vec![candidate("55", "Enceinte bluetooth")],
                std::time::Duration::from_secs(60),
            )
            .await;
        let importer = BulkImporter::new(FeedClient::new(), None, cache);
        let report = importer
            .run(&BulkImportRequest {
                feed_type: "choice".into(),
                limit: None,
                skip_similar: false,
            })
            .await
            .expect("run");
        assert_eq!(report.total_found, 1);
        assert_eq!(report.imported, 1);
    }

    #[test]
    fn exact_sku_match_is_hard() {
        let rows = vec![existing(Some("AE-DS-7"), "Montre")];
        assert_eq!(
            classify_duplicate("AE-DS-7", &rows),
            Some(DuplicateKind::Hard)
        );
    }

    #[test]
    fn name_only_match_is_soft() {
        let rows = vec![existing(Some("AE-DS-other"), "Montre connectée")];
        assert_eq!(
            classify_duplicate("AE-DS-7", &rows),
            Some(DuplicateKind::Soft)
        );
    }

    #[test]
    fn no_rows_is_no_duplicate() {
        assert_eq!(classify_duplicate("AE-DS-7", &[]), None);
    }

    #[test]
    fn soft_duplicates_pass_unless_skip_similar() {
        let allowed = rejection_for("Montre", "AE-DS-7", Some(DuplicateKind::Soft), false);
        assert!(allowed.is_none());

        let skipped = rejection_for("Montre", "AE-DS-7", Some(DuplicateKind::Soft), true);
        assert!(skipped.is_some());

        let hard = rejection_for("Montre", "AE-DS-7", Some(DuplicateKind::Hard), false);
        assert!(hard.expect("hard rejection").contains("AE-DS-7"));
    }

    #[test]
    fn name_fragment_keeps_leading_significant_words() {
        assert_eq!(
            name_fragment("Sac à main en cuir véritable pour femme"),
            "Sac main cuir véritable"
        );
        assert_eq!(name_fragment("a à"), "");
    }
}
