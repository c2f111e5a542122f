// 📐 Schema Resolution - Column aliasing for drifting dataset versions
// Upstream exports rename columns (e.g. `wikidata` becomes
// `districts_for_suave_with100K_2_no_wkt_wikidata#hiddenmore`); resolution
// tries known long-form aliases first, then the canonical short name.

use crate::error::BoundaryError;
use std::collections::BTreeSet;

/// Canonical join key column (knowledge-base identifier)
pub const JOIN_KEY: &str = "wikidata";

/// Canonical parent-governorate name column on district datasets
pub const PARENT_NAME: &str = "name_en_2";

/// Canonical population column
pub const POPULATION: &str = "population";

// ============================================================================
// COLUMN RESOLVER
// ============================================================================

/// ColumnResolver - priority-ordered alias resolution
///
/// Aliases are checked in order before the canonical name; the first
/// candidate present in the dataset wins. Aliases come first because the
/// mangled export names are the ones actually observed in current dataset
/// versions, while the canonical name is the documented fallback.
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    canonical: String,
    aliases: Vec<String>,
}

impl ColumnResolver {
    pub fn new(canonical: impl Into<String>) -> Self {
        ColumnResolver {
            canonical: canonical.into(),
            aliases: Vec::new(),
        }
    }

    /// Builder: add a known long-form alias (highest priority first)
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Every candidate in priority order (aliases, then canonical)
    pub fn candidates(&self) -> Vec<String> {
        let mut all = self.aliases.clone();
        all.push(self.canonical.clone());
        all
    }

    /// First candidate present among `columns`, or None
    pub fn resolve(&self, columns: &BTreeSet<String>) -> Option<String> {
        self.candidates()
            .into_iter()
            .find(|candidate| columns.contains(candidate))
    }

    /// Like `resolve`, but a missing column is a fatal schema mismatch
    pub fn resolve_required(&self, columns: &BTreeSet<String>) -> Result<String, BoundaryError> {
        self.resolve(columns).ok_or_else(|| BoundaryError::JoinKeyMissing {
            tried: self.candidates(),
        })
    }
}

// ============================================================================
// KNOWN RESOLVERS
// ============================================================================

/// Resolver for the join key column (`wikidata` and its export manglings)
pub fn join_key_resolver() -> ColumnResolver {
    ColumnResolver::new(JOIN_KEY)
        .with_alias("districts_for_suave_with100K_2_no_wkt_wikidata#hiddenmore")
        .with_alias("govs_for_suave_with100K_2_no_wkt_wikidata#hiddenmore")
        .with_alias("wikidata#hidden")
}

/// Resolver for the district's owning-governorate name column
pub fn parent_name_resolver() -> ColumnResolver {
    ColumnResolver::new(PARENT_NAME)
        .with_alias("districts_for_suave_with100K_2_no_wkt_name_en_2")
        .with_alias("gov_name_en")
}

/// Resolver for the population measure column
pub fn population_resolver() -> ColumnResolver {
    ColumnResolver::new(POPULATION)
        .with_alias("districts_for_suave_with100K_2_no_wkt_Population 2024#number")
        .with_alias("Population 2024#number")
        .with_alias("Population 2024")
}

/// Resolve the join key column from a dataset's column set
///
/// Error condition: neither an alias nor the canonical name present.
/// Reconciliation must not silently proceed with a missing key.
pub fn resolve_join_key(columns: &BTreeSet<String>) -> Result<String, BoundaryError> {
    join_key_resolver().resolve_required(columns)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_resolve_join_key_canonical() {
        let cols = columns(&["name_en", "name_ar", "wikidata", "geometry"]);
        assert_eq!(resolve_join_key(&cols).unwrap(), "wikidata");
    }

    #[test]
    fn test_resolve_join_key_mangled_alias() {
        let cols = columns(&[
            "name_en",
            "districts_for_suave_with100K_2_no_wkt_wikidata#hiddenmore",
        ]);
        assert_eq!(
            resolve_join_key(&cols).unwrap(),
            "districts_for_suave_with100K_2_no_wkt_wikidata#hiddenmore"
        );
    }

    #[test]
    fn test_resolve_join_key_missing_is_fatal() {
        let cols = columns(&["name_en", "name_ar"]);
        let err = resolve_join_key(&cols).unwrap_err();

        match err {
            BoundaryError::JoinKeyMissing { tried } => {
                assert!(tried.contains(&"wikidata".to_string()));
                assert!(tried.len() > 1);
            }
            other => panic!("expected JoinKeyMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_optional_resolver_returns_none() {
        let cols = columns(&["name_en", "wikidata"]);
        assert_eq!(parent_name_resolver().resolve(&cols), None);
    }

    #[test]
    fn test_parent_name_alias() {
        let cols = columns(&["name_en", "districts_for_suave_with100K_2_no_wkt_name_en_2"]);
        assert_eq!(
            parent_name_resolver().resolve(&cols).as_deref(),
            Some("districts_for_suave_with100K_2_no_wkt_name_en_2")
        );
    }

    #[test]
    fn test_population_alias_priority() {
        // Both the mangled export name and the canonical name present:
        // the alias wins because it is what current exports actually carry
        let cols = columns(&[
            "population",
            "districts_for_suave_with100K_2_no_wkt_Population 2024#number",
        ]);
        assert_eq!(
            population_resolver().resolve(&cols).as_deref(),
            Some("districts_for_suave_with100K_2_no_wkt_Population 2024#number")
        );
    }
}
