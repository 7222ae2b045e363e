use crate::http::build_client;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    base_url: String,
    service_key: String,
    http: Client,
}

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
}

/// Catalog row subset returned by the duplicate lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct ExistingProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRef {
    pub id: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    pub sku: String,
    pub stock_quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub specifications: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub source_platform: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsertedProduct {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProductImage {
    pub product_id: String,
    pub url: String,
    pub display_order: i32,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub subtotal: Option<f64>,
    #[serde(default)]
    pub shipping_fee: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub order_items: Vec<OrderItemRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRecord {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: f64,
    #[serde(default)]
    pub total_price: Option<f64>,
}

impl SupabaseClient {
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("SUPABASE_URL").ok()?;
        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|_| std::env::var("SUPABASE_SERVICE_KEY"))
            .or_else(|_| std::env::var("SUPABASE_KEY"))
            .ok()?;
        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            http: build_client(),
        })
    }

    fn get(&self, table: &str) -> RequestBuilder {
        self.authed(self.http.get(format!("{}/rest/v1/{}", self.base_url, table)))
    }

    fn post(&self, table: &str) -> RequestBuilder {
        self.authed(self.http.post(format!("{}/rest/v1/{}", self.base_url, table)))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
    }

    /// One OR-filtered lookup per candidate: exact SKU, or partial name
    /// via `ilike` on a sanitized fragment.
    pub async fn find_similar_products(
        &self,
        sku: &str,
        name_fragment: &str,
    ) -> Result<Vec<ExistingProduct>, SupabaseError> {
        let fragment = sanitize_ilike(name_fragment);
        let filter = if fragment.is_empty() {
            format!("(sku.eq.{sku})")
        } else {
            format!("(sku.eq.{sku},name.ilike.*{fragment}*)")
        };
        let response = self
            .get("products")
            .query(&[
                ("or", filter.as_str()),
                ("select", "id,name,sku"),
                ("limit", "10"),
            ])
            .send()
            .await
            .map_err(|err| SupabaseError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SupabaseError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|err| SupabaseError::Deserialize(err.to_string()))
    }

    /// slug → category id for the whole catalog taxonomy; fetched once per
    /// import batch.
    pub async fn fetch_category_map(&self) -> Result<HashMap<String, String>, SupabaseError> {
        let response = self
            .get("categories")
            .query(&[("select", "id,slug")])
            .send()
            .await
            .map_err(|err| SupabaseError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SupabaseError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let categories: Vec<CategoryRef> = response
            .json()
            .await
            .map_err(|err| SupabaseError::Deserialize(err.to_string()))?;
        Ok(categories
            .into_iter()
            .map(|category| (category.slug, category.id))
            .collect())
    }

    pub async fn insert_product(
        &self,
        product: &NewProduct,
    ) -> Result<InsertedProduct, SupabaseError> {
        let response = self
            .post("products")
            .header("Prefer", "return=representation")
            .json(product)
            .send()
            .await
            .map_err(|err| SupabaseError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SupabaseError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let mut rows: Vec<InsertedProduct> = response
            .json()
            .await
            .map_err(|err| SupabaseError::Deserialize(err.to_string()))?;
        rows.pop()
            .ok_or_else(|| SupabaseError::Deserialize("insert returned no rows".into()))
    }

    pub async fn insert_product_images(
        &self,
        images: &[NewProductImage],
    ) -> Result<(), SupabaseError> {
        if images.is_empty() {
            return Ok(());
        }
        let response = self
            .post("product_images")
            .header("Prefer", "return=minimal")
            .json(images)
            .send()
            .await
            .map_err(|err| SupabaseError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SupabaseError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    pub async fn fetch_order(&self, order_id: &str) -> Result<Option<OrderRecord>, SupabaseError> {
        let id_filter = format!("eq.{}", urlencoding::encode(order_id));
        let response = self
            .get("orders")
            .query(&[
                ("id", id_filter.as_str()),
                ("select", "*,order_items(*)"),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|err| SupabaseError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SupabaseError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let mut rows: Vec<OrderRecord> = response
            .json()
            .await
            .map_err(|err| SupabaseError::Deserialize(err.to_string()))?;
        Ok(rows.pop())
    }
}

/// PostgREST reserved characters would break the `or=` filter; the fragment
/// degrades to plain words.
fn sanitize_ilike(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_alphanumeric() || ch.is_whitespace() || *ch == '-')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ilike_fragment_loses_reserved_characters() {
        assert_eq!(
            sanitize_ilike("Montre (luxe), 50% *or*"),
            "Montre luxe 50 or"
        );
        assert_eq!(sanitize_ilike("  sac   à main  "), "sac à main");
        assert_eq!(sanitize_ilike("***"), "");
    }

    #[test]
    fn new_product_serializes_without_null_noise() {
        let product = NewProduct {
            name: "Sac".into(),
            description: "desc".into(),
            price: 10.0,
            original_price: None,
            sku: "AE-DS-1".into(),
            stock_quantity: 50,
            category_id: None,
            specifications: serde_json::json!({}),
            source_url: None,
            source_platform: "aliexpress".into(),
        };
        let value = serde_json::to_value(&product).expect("serialize");
        assert!(value.get("original_price").is_none());
        assert!(value.get("category_id").is_none());
        assert_eq!(value["sku"], "AE-DS-1");
    }
}
