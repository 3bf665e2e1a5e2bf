use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::property::ListingType;

/// Prefix of extra parameters that only affect presentation (sorting hints,
/// panel state) and never the result set.
pub const UI_ONLY_PREFIX: &str = "ui_";

/// Search filter sent to the listing service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListingFilter {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub listing_type: Option<ListingType>,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub min_size: Option<f64>,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub has_tour: Option<bool>,
    /// Free-form parameters forwarded as-is.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ListingFilter {
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Query parameters that influence the result set, sorted by key.
    ///
    /// Blank values and UI-only extras are skipped, so two filters that would
    /// return the same results produce the same pairs.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: BTreeMap<String, String> = BTreeMap::new();

        if let Some(q) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            pairs.insert("search".into(), q.to_lowercase());
        }
        if let Some(t) = self.listing_type.filter(|t| *t != ListingType::Unknown) {
            pairs.insert("listing_type".into(), t.as_str().into());
        }
        if let Some(v) = self.min_price.filter(|v| v.is_finite()) {
            pairs.insert("min_price".into(), format_number(v));
        }
        if let Some(v) = self.max_price.filter(|v| v.is_finite()) {
            pairs.insert("max_price".into(), format_number(v));
        }
        if let Some(v) = self.min_size.filter(|v| v.is_finite()) {
            pairs.insert("min_size".into(), format_number(v));
        }
        if let Some(v) = self.bedrooms {
            pairs.insert("bedrooms".into(), v.to_string());
        }
        if let Some(v) = self.has_tour {
            pairs.insert("has_tour".into(), v.to_string());
        }
        for (k, v) in &self.extra {
            let v = v.trim();
            if k.starts_with(UI_ONLY_PREFIX) || v.is_empty() {
                continue;
            }
            pairs.entry(k.clone()).or_insert_with(|| v.to_string());
        }

        pairs.into_iter().collect()
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
