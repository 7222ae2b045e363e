use crate::models::FeedType;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// One item as the feed gateway returns it. Field names drifted across
/// upstream API generations, so every known alias is accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFeedItem {
    #[serde(default, alias = "product_id", alias = "item_id")]
    pub id: Option<IdField>,
    #[serde(default, alias = "subject", alias = "product_title")]
    pub title: Option<String>,
    #[serde(
        default,
        alias = "product_main_image_url",
        alias = "image_url",
        alias = "main_image"
    )]
    pub main_image: Option<String>,
    #[serde(default, alias = "product_small_image_urls", alias = "image_urls")]
    pub images: Vec<String>,
    #[serde(
        default,
        alias = "target_sale_price",
        alias = "sale_price",
        alias = "app_sale_price"
    )]
    pub price: Option<PriceField>,
    #[serde(default, alias = "target_original_price", alias = "original_price")]
    pub list_price: Option<PriceField>,
    #[serde(
        default,
        alias = "product_detail_url",
        alias = "detail_url",
        alias = "item_url"
    )]
    pub detail_url: Option<String>,
    #[serde(default, alias = "evaluate_rate", alias = "rating")]
    pub rating: Option<RatingField>,
    // `lastest_volume` is the upstream API's own spelling.
    #[serde(default, alias = "lastest_volume", alias = "latest_volume")]
    pub volume: Option<u32>,
    #[serde(default, alias = "product_description")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdField {
    Number(u64),
    Text(String),
}

impl IdField {
    fn to_external_id(&self) -> Option<String> {
        match self {
            IdField::Number(value) => Some(value.to_string()),
            IdField::Text(value) => {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceField {
    Number(f64),
    Text(String),
}

impl PriceField {
    pub fn to_amount(&self) -> Option<f64> {
        match self {
            PriceField::Number(value) => (*value > 0.0).then_some(*value),
            PriceField::Text(value) => parse_price(value),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RatingField {
    Number(f64),
    Text(String),
}

impl RatingField {
    fn to_rating(&self) -> Option<f32> {
        let raw = match self {
            RatingField::Number(value) => *value,
            RatingField::Text(value) => value.trim().trim_end_matches('%').parse().ok()?,
        };
        (raw > 0.0).then_some(raw as f32)
    }
}

/// Strips currency noise ("US $12.34") and parses the remainder.
fn parse_price(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect();
    let amount: f64 = cleaned.parse().ok()?;
    (amount > 0.0).then_some(amount)
}

/// Canonical candidate shape the importer consumes. Serializable so feed
/// pages can sit in the cache.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProduct {
    pub external_id: String,
    pub title: String,
    pub image_urls: Vec<String>,
    pub price: f64,
    pub original_price: Option<f64>,
    pub detail_url: Option<String>,
    pub rating: Option<f32>,
    pub volume: Option<u32>,
    pub description: Option<String>,
    pub feed: FeedType,
}

impl CandidateProduct {
    pub fn sku(&self) -> String {
        format!("AE-DS-{}", self.external_id)
    }
}

impl RawFeedItem {
    /// Maps the raw upstream shape into the canonical candidate. Items
    /// missing an id, a title, or a parsable price cannot be imported and
    /// normalize to `None`.
    pub fn normalize(self, feed: FeedType) -> Option<CandidateProduct> {
        let external_id = self.id.as_ref()?.to_external_id()?;
        let title = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let price = self.price.as_ref()?.to_amount()?;

        let mut image_urls = Vec::new();
        if let Some(main) = self.main_image.as_deref().map(str::trim)
            && !main.is_empty()
        {
            image_urls.push(main.to_string());
        }
        for url in &self.images {
            let url = url.trim();
            if !url.is_empty() && !image_urls.iter().any(|seen| seen == url) {
                image_urls.push(url.to_string());
            }
        }

        Some(CandidateProduct {
            external_id,
            title: title.to_string(),
            image_urls,
            price,
            original_price: self.list_price.as_ref().and_then(PriceField::to_amount),
            detail_url: self
                .detail_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            rating: self.rating.as_ref().and_then(RatingField::to_rating),
            volume: self.volume,
            description: self
                .description
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            feed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: serde_json::Value) -> RawFeedItem {
        serde_json::from_value(value).expect("raw item")
    }

    #[test]
    fn normalizes_aliased_fields() {
        let raw = item(json!({
            "product_id": 100123,
            "product_title": "Montre connectée étanche",
            "product_main_image_url": "https://img.example.com/a.jpg",
            "product_small_image_urls": ["https://img.example.com/b.jpg"],
            "target_sale_price": "US $12.34",
            "target_original_price": "19.99",
            "product_detail_url": "https://example.com/item/100123",
            "evaluate_rate": "96.4%",
            "lastest_volume": 842
        }));
        let candidate = raw.normalize(FeedType::Bestselling).expect("candidate");
        assert_eq!(candidate.external_id, "100123");
        assert_eq!(candidate.sku(), "AE-DS-100123");
        assert_eq!(candidate.price, 12.34);
        assert_eq!(candidate.original_price, Some(19.99));
        assert_eq!(candidate.image_urls.len(), 2);
        assert_eq!(candidate.rating, Some(96.4));
        assert_eq!(candidate.volume, Some(842));
    }

    #[test]
    fn accepts_newer_field_names() {
        let raw = item(json!({
            "item_id": "AB-77",
            "title": "Casque bluetooth",
            "image_url": "https://img.example.com/c.jpg",
            "sale_price": 7.5,
            "item_url": "https://example.com/item/AB-77"
        }));
        let candidate = raw.normalize(FeedType::Choice).expect("candidate");
        assert_eq!(candidate.external_id, "AB-77");
        assert_eq!(candidate.price, 7.5);
        assert_eq!(candidate.image_urls, vec!["https://img.example.com/c.jpg"]);
    }

    #[test]
    fn rejects_items_without_price_or_title() {
        let no_price = item(json!({"product_id": 1, "title": "Sac"}));
        assert!(no_price.normalize(FeedType::Promotion).is_none());

        let no_title = item(json!({"product_id": 2, "sale_price": "3.10"}));
        assert!(no_title.normalize(FeedType::Promotion).is_none());

        let blank_title = item(json!({"product_id": 3, "title": "  ", "sale_price": "3.10"}));
        assert!(blank_title.normalize(FeedType::Promotion).is_none());
    }

    #[test]
    fn main_image_not_duplicated() {
        let raw = item(json!({
            "product_id": 9,
            "title": "Lampe LED",
            "main_image": "https://img.example.com/x.jpg",
            "image_urls": ["https://img.example.com/x.jpg", "https://img.example.com/y.jpg"],
            "app_sale_price": "4.20"
        }));
        let candidate = raw.normalize(FeedType::NewArrival).expect("candidate");
        assert_eq!(candidate.image_urls.len(), 2);
    }
}
