//! Gift identity and the normalized query facets derived from it.

use thiserror::Error;

/// Structured attributes of one collectible gift, parsed upstream from its
/// share page. Immutable once built; passed by value into every fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GiftIdentity {
    /// Collection name, e.g. "Desk Calendar". Required for any fetch.
    pub collection: String,
    /// Variant (model) name; a gift without one is not a priceable
    /// collectible, which callers handle before reaching the aggregator.
    pub variant: Option<String>,
    /// Rarity percent label of the variant, e.g. "1.5%".
    pub variant_percent: Option<String>,
    /// Background (backdrop) name.
    pub background: Option<String>,
    /// Rarity percent label of the background.
    pub background_percent: Option<String>,
}

/// Validation errors raised when deriving a query from a gift identity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GiftQueryError {
    #[error("collection name cannot be empty")]
    EmptyCollection,
}

/// Search facets shared by every marketplace fetcher, derived once per
/// aggregation.
///
/// Marketplaces disagree on the facet format: Tonnel filters on the labeled
/// form ("Gold (1.5%)") while Portals and MRKT filter on the bare name, so
/// both renditions are precomputed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftQuery {
    pub collection: String,
    pub variant: String,
    pub variant_labeled: String,
    pub background: String,
    pub background_labeled: String,
}

impl GiftQuery {
    pub fn new(gift: &GiftIdentity) -> Result<Self, GiftQueryError> {
        let collection = gift.collection.trim();
        if collection.is_empty() {
            return Err(GiftQueryError::EmptyCollection);
        }

        Ok(Self {
            collection: collection.to_owned(),
            variant: clean(gift.variant.as_deref()),
            variant_labeled: labeled(gift.variant.as_deref(), gift.variant_percent.as_deref()),
            background: clean(gift.background.as_deref()),
            background_labeled: labeled(
                gift.background.as_deref(),
                gift.background_percent.as_deref(),
            ),
        })
    }
}

fn clean(name: Option<&str>) -> String {
    name.map(str::trim).unwrap_or_default().to_owned()
}

/// "Name (percent)" when both parts are present; empty otherwise. The labeled
/// form is only meaningful with its rarity percent attached.
fn labeled(name: Option<&str>, percent: Option<&str>) -> String {
    match (name.map(str::trim), percent.map(str::trim)) {
        (Some(name), Some(percent)) if !name.is_empty() && !percent.is_empty() => {
            format!("{name} ({percent})")
        }
        _ => String::new(),
    }
}
