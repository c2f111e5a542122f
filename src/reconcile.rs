// ⚖️ Attribute Reconciler - Left join boundaries against tabular data
//
// Guarantees:
//   output length == boundary input length (no boundary dropped,
//   no attribute-only record introduced)
//   unmatched measures stay Measure::Missing, never zero
//
// Pure transformation over in-memory collections; inputs are not mutated.

use crate::error::BoundaryError;
use crate::model::{AttributeRecord, BoundaryRecord, Measure, ReconciledRecord};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

// ============================================================================
// DUPLICATE POLICY
// ============================================================================

/// How to treat a non-unique entity_id in the attribute source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Surface a warning and keep the last-seen row (default)
    Warn,
    /// Abort reconciliation
    Fatal,
}

// ============================================================================
// WARNINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileWarning {
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    DuplicateKey,
    EmptyJoinKey,
}

// ============================================================================
// RECONCILE REPORT
// ============================================================================

/// ReconcileReport - structured result a caller can format however it likes
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub records: Vec<ReconciledRecord>,
    pub matched_count: usize,
    pub unmatched_count: usize,
    pub attribute_count: usize,
    pub warnings: Vec<ReconcileWarning>,
    pub reconciled_at: chrono::DateTime<chrono::Utc>,
}

impl ReconcileReport {
    pub fn summary(&self) -> String {
        format!(
            "Reconciled {} boundaries against {} attribute rows: {} matched, {} unmatched, {} warnings",
            self.records.len(),
            self.attribute_count,
            self.matched_count,
            self.unmatched_count,
            self.warnings.len()
        )
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

pub struct Reconciler {
    pub duplicate_policy: DuplicatePolicy,
}

impl Reconciler {
    pub fn new() -> Self {
        Reconciler {
            duplicate_policy: DuplicatePolicy::Warn,
        }
    }

    pub fn with_duplicate_policy(policy: DuplicatePolicy) -> Self {
        Reconciler {
            duplicate_policy: policy,
        }
    }

    /// Left-join every boundary record against the attribute rows
    ///
    /// Boundaries whose entity_id has no attribute row come back with all
    /// measures marked missing. Attribute rows with no boundary are dropped.
    pub fn reconcile(
        &self,
        boundaries: &[BoundaryRecord],
        attributes: &[AttributeRecord],
    ) -> Result<ReconcileReport, BoundaryError> {
        let mut warnings = Vec::new();
        let index = self.build_index(attributes, &mut warnings)?;

        // Union of measure names across the attribute source; unmatched
        // boundaries carry each of these explicitly as Missing
        let measure_names: BTreeSet<&String> =
            attributes.iter().flat_map(|a| a.measures.keys()).collect();

        let mut records = Vec::with_capacity(boundaries.len());
        let mut matched_count = 0;

        for boundary in boundaries {
            if boundary.entity_id.is_empty() {
                warnings.push(ReconcileWarning {
                    kind: WarningKind::EmptyJoinKey,
                    message: format!("boundary '{}' has an empty join key", boundary.name_en),
                });
            }

            let matched = !boundary.entity_id.is_empty()
                && index.contains_key(boundary.entity_id.as_str());

            let measures: BTreeMap<String, Measure> = match index.get(boundary.entity_id.as_str()) {
                Some(row) if matched => row.measures.clone(),
                _ => measure_names
                    .iter()
                    .map(|name| ((*name).clone(), Measure::Missing))
                    .collect(),
            };

            if matched {
                matched_count += 1;
            }

            records.push(ReconciledRecord {
                boundary: boundary.clone(),
                measures,
                matched,
            });
        }

        let unmatched_count = records.len() - matched_count;

        Ok(ReconcileReport {
            records,
            matched_count,
            unmatched_count,
            attribute_count: attributes.len(),
            warnings,
            reconciled_at: chrono::Utc::now(),
        })
    }

    /// Build the entity_id -> row index; duplicates follow the configured
    /// policy (last-wins under Warn)
    fn build_index<'a>(
        &self,
        attributes: &'a [AttributeRecord],
        warnings: &mut Vec<ReconcileWarning>,
    ) -> Result<HashMap<&'a str, &'a AttributeRecord>, BoundaryError> {
        let mut index: HashMap<&str, &AttributeRecord> = HashMap::with_capacity(attributes.len());

        for row in attributes {
            if index.insert(row.entity_id.as_str(), row).is_some() {
                match self.duplicate_policy {
                    DuplicatePolicy::Fatal => {
                        return Err(BoundaryError::DuplicateKey(row.entity_id.clone()));
                    }
                    DuplicatePolicy::Warn => {
                        warn!(entity_id = %row.entity_id, "duplicate join key, keeping last-seen row");
                        warnings.push(ReconcileWarning {
                            kind: WarningKind::DuplicateKey,
                            message: format!(
                                "duplicate entity_id '{}', keeping last-seen row",
                                row.entity_id
                            ),
                        });
                    }
                }
            }
        }

        Ok(index)
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AdminLevel;
    use geo::{polygon, Geometry};

    fn square(offset: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: offset, y: offset),
            (x: offset + 1.0, y: offset),
            (x: offset + 1.0, y: offset + 1.0),
            (x: offset, y: offset + 1.0),
            (x: offset, y: offset),
        ])
    }

    fn create_test_boundary(entity_id: &str, name: &str) -> BoundaryRecord {
        BoundaryRecord::new(entity_id, name, AdminLevel::District, square(0.0))
    }

    #[test]
    fn test_reconcile_amman_irbid() {
        // Q1 has a rate, Q2 does not; both boundaries survive the join
        let boundaries = vec![
            create_test_boundary("Q1", "Amman"),
            create_test_boundary("Q2", "Irbid"),
        ];
        let attributes =
            vec![AttributeRecord::new("Q1").with_measure("rate", Measure::Number(12.5))];

        let report = Reconciler::new().reconcile(&boundaries, &attributes).unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.matched_count, 1);
        assert_eq!(report.unmatched_count, 1);
        assert_eq!(report.records[0].measure("rate"), &Measure::Number(12.5));
        assert_eq!(report.records[1].measure("rate"), &Measure::Missing);
        assert!(report.records[1].measure("rate").is_missing());
    }

    #[test]
    fn test_left_join_length_invariant() {
        // Output length equals boundary input length for 0..N x 0..M
        for n_boundaries in 0..4 {
            for n_attributes in 0..4 {
                let boundaries: Vec<_> = (0..n_boundaries)
                    .map(|i| create_test_boundary(&format!("Q{i}"), &format!("Unit {i}")))
                    .collect();
                let attributes: Vec<_> = (0..n_attributes)
                    .map(|i| {
                        AttributeRecord::new(format!("Q{i}"))
                            .with_measure("pop", Measure::Number(1000.0 * i as f64))
                    })
                    .collect();

                let report = Reconciler::new().reconcile(&boundaries, &attributes).unwrap();
                assert_eq!(report.records.len(), n_boundaries);
            }
        }
    }

    #[test]
    fn test_unmatched_measures_missing_never_zero() {
        let boundaries = vec![create_test_boundary("Q99", "Ajloun")];
        let attributes = vec![
            AttributeRecord::new("Q1")
                .with_measure("population", Measure::Number(100.0))
                .with_measure("rate", Measure::Number(3.0)),
        ];

        let report = Reconciler::new().reconcile(&boundaries, &attributes).unwrap();
        let record = &report.records[0];

        assert!(!record.matched);
        // Every measure name from the source is present, all Missing
        assert_eq!(record.measures.len(), 2);
        assert!(record.measures.values().all(|m| m.is_missing()));
        assert_ne!(record.measure("population"), &Measure::Number(0.0));
    }

    #[test]
    fn test_duplicate_key_warns_and_keeps_last() {
        let boundaries = vec![create_test_boundary("Q1", "Amman")];
        let attributes = vec![
            AttributeRecord::new("Q1").with_measure("pop", Measure::Number(1.0)),
            AttributeRecord::new("Q1").with_measure("pop", Measure::Number(2.0)),
        ];

        let report = Reconciler::new().reconcile(&boundaries, &attributes).unwrap();

        assert!(report.has_warnings());
        assert_eq!(report.warnings[0].kind, WarningKind::DuplicateKey);
        assert_eq!(report.records[0].measure("pop"), &Measure::Number(2.0));
    }

    #[test]
    fn test_duplicate_key_fatal_policy() {
        let boundaries = vec![create_test_boundary("Q1", "Amman")];
        let attributes = vec![AttributeRecord::new("Q1"), AttributeRecord::new("Q1")];

        let result = Reconciler::with_duplicate_policy(DuplicatePolicy::Fatal)
            .reconcile(&boundaries, &attributes);

        assert!(matches!(result, Err(BoundaryError::DuplicateKey(id)) if id == "Q1"));
    }

    #[test]
    fn test_attribute_only_rows_not_introduced() {
        let boundaries = vec![create_test_boundary("Q1", "Amman")];
        let attributes = vec![
            AttributeRecord::new("Q1").with_measure("pop", Measure::Number(4.0)),
            AttributeRecord::new("Q777").with_measure("pop", Measure::Number(9.0)),
        ];

        let report = Reconciler::new().reconcile(&boundaries, &attributes).unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].boundary.entity_id, "Q1");
    }

    #[test]
    fn test_empty_join_key_warns_and_stays_unmatched() {
        let boundaries = vec![create_test_boundary("", "Nameless")];
        let attributes = vec![AttributeRecord::new("").with_measure("pop", Measure::Number(7.0))];

        let report = Reconciler::new().reconcile(&boundaries, &attributes).unwrap();

        assert!(!report.records[0].matched);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::EmptyJoinKey));
    }

    #[test]
    fn test_inputs_not_mutated() {
        let boundaries = vec![create_test_boundary("Q1", "Amman")];
        let attributes = vec![AttributeRecord::new("Q1").with_measure("pop", Measure::Number(5.0))];
        let boundaries_before = boundaries.clone();
        let attributes_before = attributes.clone();

        let _ = Reconciler::new().reconcile(&boundaries, &attributes).unwrap();

        assert_eq!(boundaries, boundaries_before);
        assert_eq!(attributes, attributes_before);
    }
}
