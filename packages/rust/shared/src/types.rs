//! Core domain records for FoodFacts.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// LocalFoodRecord
// ---------------------------------------------------------------------------

/// One entry of the local food catalog.
///
/// Missing or null header fields render as empty text; the barcode is the
/// only field a record cannot do without.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFoodRecord {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub name: String,
    /// Dish category (`type` on the wire).
    #[serde(rename = "type", default, deserialize_with = "text_or_empty")]
    pub food_type: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub ethnicity: String,
    /// Product barcode; catalogs store it as either a string or a number.
    #[serde(deserialize_with = "string_or_number")]
    pub barcode: String,
}

// ---------------------------------------------------------------------------
// ExternalFoodRecord
// ---------------------------------------------------------------------------

/// Product lookup response from the enrichment service.
///
/// Every field is optional: absent data renders as empty text instead of
/// failing the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalFoodRecord {
    #[serde(default)]
    pub product: Option<Product>,
    /// Open Food Facts lookup status (1 = found, 0 = not found).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_verbose: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub ingredients_text: Option<String>,
    #[serde(default)]
    pub countries: Option<String>,
    #[serde(default)]
    pub nutriments: Option<Nutriments>,
}

/// Nutrient values; the service emits numbers or numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutriments {
    #[serde(default, deserialize_with = "lenient_number")]
    pub energy: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub fat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub sugars: Option<f64>,
}

impl ExternalFoodRecord {
    pub fn ingredients_text(&self) -> Option<&str> {
        self.product.as_ref()?.ingredients_text.as_deref()
    }

    pub fn countries(&self) -> Option<&str> {
        self.product.as_ref()?.countries.as_deref()
    }

    pub fn energy(&self) -> Option<f64> {
        self.nutriments()?.energy
    }

    pub fn fat(&self) -> Option<f64> {
        self.nutriments()?.fat
    }

    pub fn sugars(&self) -> Option<f64> {
        self.nutriments()?.sugars
    }

    /// Whether the service reported the barcode as unknown.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(0) || self.product.is_none()
    }

    fn nutriments(&self) -> Option<&Nutriments> {
        self.product.as_ref()?.nutriments.as_ref()
    }
}

// ---------------------------------------------------------------------------
// EnrichedFood
// ---------------------------------------------------------------------------

/// A local record joined with the external lookup issued for it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedFood {
    pub local: LocalFoodRecord,
    pub external: ExternalFoodRecord,
}

// ---------------------------------------------------------------------------
// Lenient deserializers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(match raw {
        Some(NumberOrText::Number(n)) => Some(n),
        Some(NumberOrText::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

fn text_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}
