use crate::models::FeedType;
use serde::Serialize;

/// Below this score the caller's existing category assignment wins.
pub const CATEGORY_CONFIDENCE_FLOOR: f32 = 0.3;

const ATTRIBUTE_CONFIDENCE: f32 = 0.8;
const FEED_TAG_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    ProductCategory,
    Material,
    Color,
    Size,
    Brand,
    FeedType,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductTag {
    pub name: String,
    pub category: TagKind,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    pub slug: &'static str,
    pub label: &'static str,
    pub keywords: &'static [&'static str],
}

const CATEGORY_RULES: [CategoryRule; 8] = [
    CategoryRule {
        slug: "electronique",
        label: "Électronique",
        keywords: &[
            "smartphone",
            "téléphone",
            "écouteurs",
            "earbuds",
            "bluetooth",
            "chargeur",
            "charger",
            "enceinte",
            "speaker",
            "usb",
        ],
    },
    CategoryRule {
        slug: "informatique",
        label: "Informatique",
        keywords: &[
            "laptop",
            "ordinateur",
            "clavier",
            "keyboard",
            "souris",
            "mouse",
            "webcam",
            "ssd",
        ],
    },
    CategoryRule {
        slug: "mode-accessoires",
        label: "Mode & Accessoires",
        keywords: &[
            "sac",
            "bag",
            "wallet",
            "portefeuille",
            "montre",
            "watch",
            "leather",
            "cuir",
            "ceinture",
            "lunettes",
        ],
    },
    CategoryRule {
        slug: "maison-decoration",
        label: "Maison & Décoration",
        keywords: &[
            "lampe",
            "lamp",
            "cuisine",
            "kitchen",
            "rangement",
            "storage",
            "rideau",
            "curtain",
            "coussin",
            "décoration",
        ],
    },
    CategoryRule {
        slug: "beaute-sante",
        label: "Beauté & Santé",
        keywords: &[
            "maquillage",
            "makeup",
            "soin",
            "skincare",
            "brosse",
            "brush",
            "massage",
            "parfum",
        ],
    },
    CategoryRule {
        slug: "sport-fitness",
        label: "Sport & Fitness",
        keywords: &[
            "fitness", "yoga", "musculation", "gym", "vélo", "running", "sport",
        ],
    },
    CategoryRule {
        slug: "auto-moto",
        label: "Auto & Moto",
        keywords: &[
            "voiture",
            "car",
            "moto",
            "motorcycle",
            "pneu",
            "dashboard",
            "pare-soleil",
        ],
    },
    CategoryRule {
        slug: "jouets-enfants",
        label: "Jouets & Enfants",
        keywords: &[
            "jouet", "toy", "enfant", "kids", "bébé", "baby", "puzzle", "peluche",
        ],
    },
];

struct AttributeRule {
    canonical: &'static str,
    variants: &'static [&'static str],
}

const MATERIALS: &[AttributeRule] = &[
    AttributeRule { canonical: "leather", variants: &["leather", "cuir"] },
    AttributeRule { canonical: "cotton", variants: &["cotton", "coton"] },
    AttributeRule { canonical: "wool", variants: &["wool", "laine"] },
    AttributeRule { canonical: "silk", variants: &["silk", "soie"] },
    AttributeRule { canonical: "wood", variants: &["wood", "bois"] },
    AttributeRule { canonical: "metal", variants: &["metal", "métal"] },
    AttributeRule { canonical: "stainless-steel", variants: &["stainless", "inox", "acier"] },
    AttributeRule { canonical: "plastic", variants: &["plastic", "plastique"] },
    AttributeRule { canonical: "glass", variants: &["glass", "verre"] },
    AttributeRule { canonical: "ceramic", variants: &["ceramic", "céramique"] },
    AttributeRule { canonical: "silicone", variants: &["silicone"] },
];

const COLORS: &[AttributeRule] = &[
    AttributeRule { canonical: "black", variants: &["black", "noir", "noire"] },
    AttributeRule { canonical: "white", variants: &["white", "blanc", "blanche"] },
    AttributeRule { canonical: "red", variants: &["red", "rouge"] },
    AttributeRule { canonical: "blue", variants: &["blue", "bleu", "bleue"] },
    AttributeRule { canonical: "green", variants: &["green", "vert", "verte"] },
    AttributeRule { canonical: "yellow", variants: &["yellow", "jaune"] },
    AttributeRule { canonical: "pink", variants: &["pink", "rose"] },
    AttributeRule { canonical: "grey", variants: &["grey", "gray", "gris", "grise"] },
    AttributeRule { canonical: "brown", variants: &["brown", "marron"] },
    AttributeRule { canonical: "gold", variants: &["gold", "doré", "or"] },
    AttributeRule { canonical: "silver", variants: &["silver", "argenté"] },
];

const SIZES: &[AttributeRule] = &[
    AttributeRule { canonical: "xs", variants: &["xs"] },
    AttributeRule { canonical: "s", variants: &["s"] },
    AttributeRule { canonical: "m", variants: &["m"] },
    AttributeRule { canonical: "l", variants: &["l"] },
    AttributeRule { canonical: "xl", variants: &["xl"] },
    AttributeRule { canonical: "xxl", variants: &["xxl"] },
    AttributeRule { canonical: "xxxl", variants: &["xxxl"] },
];

const BRANDS: &[AttributeRule] = &[
    AttributeRule { canonical: "xiaomi", variants: &["xiaomi"] },
    AttributeRule { canonical: "anker", variants: &["anker"] },
    AttributeRule { canonical: "baseus", variants: &["baseus"] },
    AttributeRule { canonical: "ugreen", variants: &["ugreen"] },
    AttributeRule { canonical: "lenovo", variants: &["lenovo"] },
    AttributeRule { canonical: "samsung", variants: &["samsung"] },
    AttributeRule { canonical: "jbl", variants: &["jbl"] },
    AttributeRule { canonical: "huawei", variants: &["huawei"] },
    AttributeRule { canonical: "hoco", variants: &["hoco"] },
    AttributeRule { canonical: "remax", variants: &["remax"] },
];

#[derive(Debug, Clone, Serialize)]
pub struct TagAnalysis {
    /// Every tag found, sorted by descending confidence.
    pub tags: Vec<ProductTag>,
    /// Best category slug, only when its confidence clears the floor.
    pub suggested_category: Option<&'static str>,
}

/// Scores a product name against the keyword tables. Confidence for a
/// category is the fraction of its keyword list found in the name.
pub fn analyze(name: &str, feed: Option<FeedType>) -> TagAnalysis {
    let lowered = name.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect();

    let mut tags = Vec::new();
    let mut best: Option<(&'static str, f32)> = None;

    for rule in &CATEGORY_RULES {
        let matched = rule
            .keywords
            .iter()
            .filter(|keyword| keyword_present(&lowered, &tokens, keyword))
            .count();
        if matched == 0 {
            continue;
        }
        let confidence = round_confidence(matched as f32 / rule.keywords.len() as f32);
        if best.map(|(_, score)| confidence > score).unwrap_or(true) {
            best = Some((rule.slug, confidence));
        }
        tags.push(ProductTag {
            name: rule.slug.to_string(),
            category: TagKind::ProductCategory,
            confidence,
        });
    }

    push_attribute_tags(&mut tags, &lowered, &tokens, MATERIALS, TagKind::Material);
    push_attribute_tags(&mut tags, &lowered, &tokens, COLORS, TagKind::Color);
    push_attribute_tags(&mut tags, &lowered, &tokens, SIZES, TagKind::Size);
    push_attribute_tags(&mut tags, &lowered, &tokens, BRANDS, TagKind::Brand);

    if let Some(feed) = feed {
        tags.push(ProductTag {
            name: feed.as_str().to_string(),
            category: TagKind::FeedType,
            confidence: FEED_TAG_CONFIDENCE,
        });
    }

    tags.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let suggested_category = best
        .filter(|(_, score)| *score >= CATEGORY_CONFIDENCE_FLOOR)
        .map(|(slug, _)| slug);

    TagAnalysis {
        tags,
        suggested_category,
    }
}

pub fn label_for_slug(slug: &str) -> Option<&'static str> {
    CATEGORY_RULES
        .iter()
        .find(|rule| rule.slug == slug)
        .map(|rule| rule.label)
}

fn push_attribute_tags(
    tags: &mut Vec<ProductTag>,
    lowered: &str,
    tokens: &[&str],
    rules: &[AttributeRule],
    kind: TagKind,
) {
    for rule in rules {
        let hit = rule
            .variants
            .iter()
            .any(|variant| keyword_present(lowered, tokens, variant));
        if hit {
            tags.push(ProductTag {
                name: rule.canonical.to_string(),
                category: kind,
                confidence: ATTRIBUTE_CONFIDENCE,
            });
        }
    }
}

/// Short keywords (sizes, "usb", "sac") must match a whole token so that
/// "s" never fires inside "shoes"; longer ones match by containment.
fn keyword_present(lowered: &str, tokens: &[&str], keyword: &str) -> bool {
    if keyword.chars().count() < 4 {
        tokens.iter().any(|token| *token == keyword)
    } else {
        lowered.contains(keyword)
    }
}

fn round_confidence(value: f32) -> f32 {
    (value.min(1.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags_of(analysis: &TagAnalysis, kind: TagKind) -> Vec<&str> {
        analysis
            .tags
            .iter()
            .filter(|tag| tag.category == kind)
            .map(|tag| tag.name.as_str())
            .collect()
    }

    #[test]
    fn black_leather_wallet_gets_expected_tags() {
        let analysis = analyze("black leather wallet", None);
        assert!(tags_of(&analysis, TagKind::Material).contains(&"leather"));
        assert!(tags_of(&analysis, TagKind::Color).contains(&"black"));
        let category = analysis
            .tags
            .iter()
            .find(|tag| tag.category == TagKind::ProductCategory && tag.name == "mode-accessoires")
            .expect("mode-accessoires tag");
        assert!(category.confidence > 0.0);
    }

    #[test]
    fn suggestion_requires_the_floor() {
        // Two of ten accessory keywords: below 0.3, no suggestion.
        let weak = analyze("black leather wallet", None);
        assert_eq!(weak.suggested_category, None);

        // Four of ten clears it.
        let strong = analyze("sac portefeuille cuir montre", None);
        assert_eq!(strong.suggested_category, Some("mode-accessoires"));
    }

    #[test]
    fn short_keywords_match_whole_tokens_only() {
        let analysis = analyze("sneakers shoes classic", None);
        assert!(tags_of(&analysis, TagKind::Size).is_empty());

        let sized = analyze("robe d'été taille M", None);
        assert_eq!(tags_of(&sized, TagKind::Size), vec!["m"]);
    }

    #[test]
    fn french_keywords_score_too() {
        let analysis = analyze("Écouteurs bluetooth avec chargeur USB", None);
        let category = analysis
            .tags
            .iter()
            .find(|tag| tag.category == TagKind::ProductCategory)
            .expect("category tag");
        assert_eq!(category.name, "electronique");
        assert_eq!(analysis.suggested_category, Some("electronique"));
    }

    #[test]
    fn tags_sorted_by_descending_confidence() {
        let analysis = analyze("montre cuir noir", Some(FeedType::Bestselling));
        let scores: Vec<f32> = analysis.tags.iter().map(|tag| tag.confidence).collect();
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        assert_eq!(scores, sorted);
    }

    #[test]
    fn feed_tag_carried_when_known() {
        let analysis = analyze("peluche bébé", Some(FeedType::Choice));
        assert_eq!(tags_of(&analysis, TagKind::FeedType), vec!["choice"]);
    }

    #[test]
    fn brand_detection() {
        let analysis = analyze("Anker chargeur rapide 65W", None);
        assert_eq!(tags_of(&analysis, TagKind::Brand), vec!["anker"]);
    }
}
