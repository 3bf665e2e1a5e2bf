use catalog::ListingFilter;

/// Canonical identity of a filter: equal signatures return equal results.
///
/// Built from `ListingFilter::query_pairs`, so blank and presentation-only
/// fields never change it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FilterSignature(String);

impl FilterSignature {
    pub fn of(filter: &ListingFilter) -> Self {
        let joined = filter
            .query_pairs()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FilterSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "<all>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
