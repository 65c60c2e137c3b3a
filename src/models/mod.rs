use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── Raw post ──────────────────────────────────────────────────────────────────

/// A post exactly as sliced out of a forum page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawPost {
    pub text: String,
    pub page_num: u32,
    pub post_num: u32, // global, 1-based
}

// ── Extracted post ────────────────────────────────────────────────────────────

/// RawPost plus the labeled sub-fields pulled out of its text.
/// Every field is empty when its label is missing from the post.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedPost {
    pub text: String,
    pub page_num: u32,
    pub post_num: u32,
    pub make: String,
    pub model: String,
    pub condition: String,
    pub price_paid: String,
    pub delivery_charge: String,
    pub user_location: String,
    pub vendor_location: String,
    pub vendor_name: String,
    pub purchase_date: String,
}

// ── Inferred post ─────────────────────────────────────────────────────────────

/// Fields derived from corpus-wide inference. Each slot is filled by exactly
/// one pass and never rewritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Inferences {
    pub swapped_make_model: bool,
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub condition: Option<String>,
    pub purchase_country: Option<Country>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InferredPost {
    pub post: ExtractedPost,
    pub inferred: Inferences,
}

impl From<ExtractedPost> for InferredPost {
    fn from(post: ExtractedPost) -> Self {
        Self {
            post,
            inferred: Inferences::default(),
        }
    }
}

/// Write-once assignment for inference slots.
pub fn set_once<T>(slot: &mut Option<T>, value: T) {
    debug_assert!(slot.is_none(), "inference field assigned twice");
    if slot.is_none() {
        *slot = Some(value);
    }
}

// ── Country ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Country {
    pub name: String,         // "UNITED STATES"
    pub country_code: String, // "US"
    pub currency_codes: BTreeSet<String>,
    pub currency_names: BTreeSet<String>,
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

// ── Reference CSV rows ────────────────────────────────────────────────────────

/// countries.csv: code, name, currencies ("USD" or "USD;USN")
#[derive(Debug, Clone, Deserialize)]
pub struct RawCountryRow {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub currencies: Option<String>,
}

/// currencies.csv: code, name
#[derive(Debug, Clone, Deserialize)]
pub struct RawCurrencyRow {
    pub code: String,
    pub name: String,
}

/// provinces.csv: country, name, short
#[derive(Debug, Clone, Deserialize)]
pub struct RawProvinceRow {
    pub country: String,
    pub name: String,
    #[serde(default)]
    pub short: Option<String>,
}

/// cities.csv: name, country, population
#[derive(Debug, Clone, Deserialize)]
pub struct RawCityRow {
    pub name: String,
    pub country: String,
    pub population: u64,
}
