//! Keyword intent classification over normalized text.
//!
//! Runs on every inbound message and comment before routing:
//! - EMERGENCY keywords → urgent care path
//! - PRICING keywords → price/fee questions
//! - SALES keywords → purchase/stock/shipping questions
//! - anything else → GENERAL
//!
//! Matching is plain substring membership on normalized text; precedence is
//! fixed (emergency > pricing > sales) and the first match wins. No
//! tokenization, no scoring.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Lower-case and strip diacritics so "cuánto" and "cuanto" compare equal.
///
/// Canonical decomposition (NFD) splits accented characters into base +
/// combining mark; dropping the marks leaves the bare ASCII-ish base text.
/// Total and infallible.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Intent category for an inbound message, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Emergency,
    Pricing,
    Sales,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Emergency => "emergency",
            Category::Pricing => "pricing",
            Category::Sales => "sales",
            Category::General => "general",
        }
    }

    /// Emergency, pricing and sales messages skip the menu flow and get
    /// escalated to the team.
    pub fn is_high_intent(&self) -> bool {
        !matches!(self, Category::General)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword-set classifier. Lists are data, not code: construct with custom
/// sets or use `default_keywords` for the stock Spanish lists.
pub struct KeywordClassifier {
    emergency: Vec<String>,
    pricing: Vec<String>,
    sales: Vec<String>,
}

impl KeywordClassifier {
    /// Build a classifier from raw keyword lists. Keywords are normalized
    /// once here so accented and unaccented spellings collapse.
    pub fn new<S: AsRef<str>>(emergency: &[S], pricing: &[S], sales: &[S]) -> Self {
        let norm_all = |kws: &[S]| kws.iter().map(|k| normalize(k.as_ref())).collect();
        Self {
            emergency: norm_all(emergency),
            pricing: norm_all(pricing),
            sales: norm_all(sales),
        }
    }

    /// Stock keyword lists for a Spanish-speaking pet-supplies audience.
    pub fn default_keywords() -> Self {
        Self::new(
            &[
                "urgente",
                "emergencia",
                "intoxicación",
                "intoxicacion",
                "vomito",
                "vómito",
                "convulsión",
                "convulsion",
                "sangre",
                "accidente",
            ],
            &[
                "precio", "precios", "cuanto", "cuánto", "costo", "costos", "vale", "valor",
                "tarifa", "promoción", "promo",
            ],
            &[
                "comprar",
                "compra",
                "pedido",
                "orden",
                "cotizar",
                "cotización",
                "stock",
                "disponible",
                "envío",
                "delivery",
                "tienda",
                "distribuidor",
            ],
        )
    }

    /// Classify a message. First matching category in precedence order wins;
    /// no keyword hit means `General`.
    pub fn classify(&self, text: &str) -> Category {
        let t = normalize(text);
        let hit = |kws: &[String]| kws.iter().any(|k| t.contains(k.as_str()));

        if hit(&self.emergency) {
            Category::Emergency
        } else if hit(&self.pricing) {
            Category::Pricing
        } else if hit(&self.sales) {
            Category::Sales
        } else {
            Category::General
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::default_keywords()
    }
}
