use crate::feed::models::CandidateProduct;
use crate::tagger::{ProductTag, TagKind};
use serde_json::{Map, Value, json};

/// Shown when a description is empty once the import boilerplate is gone.
pub const FALLBACK_DESCRIPTION: &str =
    "Produit de qualité sélectionné pour vous par JomionStore.";

const SEO_KEYWORD_LIMIT: usize = 10;

/// Whole lines bracketed by one of these (prefix, suffix) pairs are import
/// metadata, whatever sits between them.
const BOILERPLATE_LINES: &[(&str, &str)] = &[
    ("imported from aliexpress", "api."),
    ("produit importé depuis aliexpress", "api."),
];

/// Inline phrases stripped wherever they appear.
const BOILERPLATE_PHRASES: &[&str] = &[
    "Produit importé depuis AliExpress via API.",
    "Imported from AliExpress via API.",
    "Imported from AliExpress Dropship API.",
];

/// Strips import boilerplate, collapses blank-line runs, and falls back to
/// the placeholder sentence when nothing is left.
pub fn clean_description(raw: &str) -> String {
    let mut text = raw.to_string();
    for phrase in BOILERPLATE_PHRASES {
        text = text.replace(phrase, "");
    }

    let mut lines = Vec::new();
    let mut previous_blank = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if is_boilerplate_line(trimmed) {
            continue;
        }
        if trimmed.is_empty() {
            if !previous_blank && !lines.is_empty() {
                lines.push(String::new());
            }
            previous_blank = true;
        } else {
            lines.push(trimmed.to_string());
            previous_blank = false;
        }
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    let cleaned = lines.join("\n");
    if cleaned.trim().is_empty() {
        FALLBACK_DESCRIPTION.to_string()
    } else {
        cleaned
    }
}

fn is_boilerplate_line(line: &str) -> bool {
    let lowered = line.to_lowercase();
    BOILERPLATE_LINES
        .iter()
        .any(|(prefix, suffix)| lowered.starts_with(prefix) && lowered.ends_with(suffix))
}

/// Top tags by confidence, deduplicated by name. Never reaches the visible
/// description; callers store it in `specifications`.
pub fn seo_keywords(tags: &[ProductTag]) -> Vec<String> {
    let mut keywords = Vec::new();
    for tag in tags {
        if keywords.iter().any(|existing| existing == &tag.name) {
            continue;
        }
        keywords.push(tag.name.clone());
        if keywords.len() == SEO_KEYWORD_LIMIT {
            break;
        }
    }
    keywords
}

/// Free-form specification map persisted with the product row. Attribute
/// tags land here rather than in the description.
pub fn build_specifications(candidate: &CandidateProduct, tags: &[ProductTag]) -> Map<String, Value> {
    let mut specs = Map::new();

    for (key, kind) in [
        ("material", TagKind::Material),
        ("color", TagKind::Color),
        ("size", TagKind::Size),
        ("brand", TagKind::Brand),
    ] {
        let values: Vec<&str> = tags
            .iter()
            .filter(|tag| tag.category == kind)
            .map(|tag| tag.name.as_str())
            .collect();
        if !values.is_empty() {
            specs.insert(key.to_string(), json!(values.join(", ")));
        }
    }

    specs.insert("seo_keywords".to_string(), json!(seo_keywords(tags)));

    if let Some(rating) = candidate.rating {
        specs.insert("rating".to_string(), json!(rating));
    }
    if let Some(volume) = candidate.volume {
        specs.insert("orders_volume".to_string(), json!(volume));
    }

    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedType;
    use crate::tagger;

    fn candidate() -> CandidateProduct {
        CandidateProduct {
            external_id: "42".into(),
            title: "Portefeuille cuir noir".into(),
            image_urls: vec![],
            price: 11.5,
            original_price: None,
            detail_url: None,
            rating: Some(95.0),
            volume: Some(310),
            description: None,
            feed: FeedType::Bestselling,
        }
    }

    #[test]
    fn exact_boilerplate_becomes_placeholder() {
        let cleaned = clean_description("Produit importé depuis AliExpress via API.");
        assert_eq!(cleaned, FALLBACK_DESCRIPTION);
    }

    #[test]
    fn boilerplate_line_with_arbitrary_middle_is_dropped() {
        let raw = "Un très bon produit.\nImported from AliExpress (feed ds-choice) via the Dropship API.\nLivraison rapide.";
        let cleaned = clean_description(raw);
        assert_eq!(cleaned, "Un très bon produit.\nLivraison rapide.");
    }

    #[test]
    fn blank_line_runs_collapse() {
        let raw = "Première ligne.\n\n\n\nSeconde ligne.";
        let cleaned = clean_description(raw);
        assert_eq!(cleaned, "Première ligne.\n\nSeconde ligne.");
    }

    #[test]
    fn surviving_text_is_kept_verbatim() {
        let cleaned = clean_description("Sac à main en cuir véritable.");
        assert_eq!(cleaned, "Sac à main en cuir véritable.");
    }

    #[test]
    fn seo_keywords_capped_and_deduplicated() {
        let analysis = tagger::analyze(
            "montre cuir noir bleu rouge vert jaune rose gris marron xiaomi",
            Some(FeedType::Mixed),
        );
        let keywords = seo_keywords(&analysis.tags);
        assert!(keywords.len() <= 10);
        let mut unique = keywords.clone();
        unique.dedup();
        assert_eq!(keywords, unique);
    }

    #[test]
    fn specifications_carry_tags_not_description() {
        let candidate = candidate();
        let analysis = tagger::analyze(&candidate.title, Some(candidate.feed));
        let specs = build_specifications(&candidate, &analysis.tags);
        assert_eq!(specs.get("material"), Some(&json!("leather")));
        assert_eq!(specs.get("color"), Some(&json!("black")));
        assert!(specs.contains_key("seo_keywords"));
        assert_eq!(specs.get("orders_volume"), Some(&json!(310)));
    }
}
