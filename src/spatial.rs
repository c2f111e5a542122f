// 🧭 Spatial Operations - District/governorate joins and subsets
//
// Left-join semantics throughout: a district that matches no governorate
// keeps None as its parent rather than being dropped.

use crate::model::BoundaryRecord;
use geo::{Centroid, Contains, Geometry, Intersects};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// PREDICATES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinPredicate {
    /// District geometry entirely inside the governorate
    Within,
    /// Any overlap counts
    Intersects,
    /// District centroid inside the governorate; robust against
    /// simplified borders that clip district edges
    CentroidWithin,
}

// ============================================================================
// SPATIAL JOINER
// ============================================================================

pub struct SpatialJoiner {
    pub predicate: JoinPredicate,
    /// Retry unmatched districts with CentroidWithin. Simplified 20m
    /// boundaries rarely nest cleanly, so Within alone under-matches.
    pub centroid_fallback: bool,
}

impl SpatialJoiner {
    pub fn new() -> Self {
        SpatialJoiner {
            predicate: JoinPredicate::Within,
            centroid_fallback: true,
        }
    }

    pub fn with_predicate(predicate: JoinPredicate) -> Self {
        SpatialJoiner {
            predicate,
            centroid_fallback: false,
        }
    }

    /// For each district, the name of the first governorate satisfying the
    /// predicate; None when nothing matches
    pub fn assign_parents(
        &self,
        districts: &[BoundaryRecord],
        governorates: &[BoundaryRecord],
    ) -> Vec<Option<String>> {
        districts
            .iter()
            .map(|district| {
                let direct = governorates
                    .iter()
                    .find(|gov| self.matches(&district.geometry, &gov.geometry))
                    .map(|gov| gov.name_en.clone());

                match direct {
                    Some(name) => Some(name),
                    None if self.centroid_fallback => governorates
                        .iter()
                        .find(|gov| centroid_within(&district.geometry, &gov.geometry))
                        .map(|gov| gov.name_en.clone()),
                    None => None,
                }
            })
            .collect()
    }

    fn matches(&self, district: &Geometry<f64>, governorate: &Geometry<f64>) -> bool {
        match self.predicate {
            JoinPredicate::Within => governorate.contains(district),
            JoinPredicate::Intersects => governorate.intersects(district),
            JoinPredicate::CentroidWithin => centroid_within(district, governorate),
        }
    }
}

impl Default for SpatialJoiner {
    fn default() -> Self {
        Self::new()
    }
}

fn centroid_within(district: &Geometry<f64>, governorate: &Geometry<f64>) -> bool {
    district
        .centroid()
        .map(|c| governorate.contains(&c))
        .unwrap_or(false)
}

// ============================================================================
// GROUPING AND FILTERING
// ============================================================================

/// Districts-per-governorate tally, keyed by parent name
pub fn count_by_parent(districts: &[BoundaryRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for district in districts {
        if let Some(parent) = &district.parent_name {
            *counts.entry(parent.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// Districts belonging to one governorate
pub fn filter_by_parent<'a>(
    districts: &'a [BoundaryRecord],
    governorate: &str,
) -> Vec<&'a BoundaryRecord> {
    districts
        .iter()
        .filter(|d| d.parent_name.as_deref() == Some(governorate))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AdminLevel;
    use geo::polygon;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ])
    }

    fn gov(name: &str, geometry: Geometry<f64>) -> BoundaryRecord {
        BoundaryRecord::new(format!("G-{name}"), name, AdminLevel::Governorate, geometry)
    }

    fn district(name: &str, geometry: Geometry<f64>) -> BoundaryRecord {
        BoundaryRecord::new(format!("D-{name}"), name, AdminLevel::District, geometry)
    }

    #[test]
    fn test_assign_parents_within() {
        let governorates = vec![
            gov("Amman", rect(0.0, 0.0, 10.0, 10.0)),
            gov("Irbid", rect(10.0, 0.0, 20.0, 10.0)),
        ];
        let districts = vec![
            district("Qasabah", rect(1.0, 1.0, 2.0, 2.0)),
            district("Bani Kinanah", rect(14.0, 4.0, 16.0, 6.0)),
        ];

        let parents = SpatialJoiner::new().assign_parents(&districts, &governorates);

        assert_eq!(parents[0].as_deref(), Some("Amman"));
        assert_eq!(parents[1].as_deref(), Some("Irbid"));
    }

    #[test]
    fn test_assign_parents_left_join_keeps_orphans() {
        let governorates = vec![gov("Amman", rect(0.0, 0.0, 10.0, 10.0))];
        let districts = vec![district("Nowhere", rect(50.0, 50.0, 51.0, 51.0))];

        let parents = SpatialJoiner::new().assign_parents(&districts, &governorates);

        assert_eq!(parents.len(), 1);
        assert!(parents[0].is_none());
    }

    #[test]
    fn test_centroid_fallback_for_straddling_district() {
        // District pokes 1 unit outside the governorate, so Within fails,
        // but its centroid is well inside
        let governorates = vec![gov("Amman", rect(0.0, 0.0, 10.0, 10.0))];
        let districts = vec![district("Edge", rect(7.0, 4.0, 11.0, 6.0))];

        let strict = SpatialJoiner::with_predicate(JoinPredicate::Within);
        assert!(strict.assign_parents(&districts, &governorates)[0].is_none());

        let with_fallback = SpatialJoiner::new();
        assert_eq!(
            with_fallback.assign_parents(&districts, &governorates)[0].as_deref(),
            Some("Amman")
        );
    }

    #[test]
    fn test_intersects_predicate() {
        let governorates = vec![gov("Amman", rect(0.0, 0.0, 10.0, 10.0))];
        let districts = vec![district("Overlap", rect(9.0, 9.0, 12.0, 12.0))];

        let joiner = SpatialJoiner::with_predicate(JoinPredicate::Intersects);
        assert_eq!(
            joiner.assign_parents(&districts, &governorates)[0].as_deref(),
            Some("Amman")
        );
    }

    #[test]
    fn test_count_and_filter_by_parent() {
        let districts = vec![
            district("A", rect(0.0, 0.0, 1.0, 1.0)).with_parent("Amman"),
            district("B", rect(1.0, 0.0, 2.0, 1.0)).with_parent("Amman"),
            district("C", rect(2.0, 0.0, 3.0, 1.0)).with_parent("Irbid"),
            district("D", rect(3.0, 0.0, 4.0, 1.0)),
        ];

        let counts = count_by_parent(&districts);
        assert_eq!(counts.get("Amman"), Some(&2));
        assert_eq!(counts.get("Irbid"), Some(&1));
        assert_eq!(counts.len(), 2);

        let amman = filter_by_parent(&districts, "Amman");
        assert_eq!(amman.len(), 2);
        assert!(amman.iter().all(|d| d.parent_name.as_deref() == Some("Amman")));
    }
}
