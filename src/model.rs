// 🗺️ Data Model - Boundary and attribute records
// Boundary geometry is immutable after load; derived values live on copies

use geo::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// ADMIN LEVEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminLevel {
    Governorate,
    District,
}

impl AdminLevel {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            AdminLevel::Governorate => "Governorate",
            AdminLevel::District => "District",
        }
    }
}

// ============================================================================
// MEASURE
// ============================================================================

/// Measure - one named value from an external tabular source
///
/// `Missing` is an explicit marker, never a default zero. It propagates
/// through derived computations (density of a missing population is
/// missing) and serializes to `null` in formats with nullable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Measure {
    Number(f64),
    Text(String),
    Missing,
}

impl Measure {
    pub fn is_missing(&self) -> bool {
        matches!(self, Measure::Missing)
    }

    /// Numeric view, `None` for text or missing values
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Measure::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Parse a raw cell: empty -> Missing, numeric -> Number, else Text
    pub fn from_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Measure::Missing;
        }
        match trimmed.replace(',', "").parse::<f64>() {
            Ok(n) => Measure::Number(n),
            Err(_) => Measure::Text(trimmed.to_string()),
        }
    }
}

// ============================================================================
// BOUNDARY RECORD
// ============================================================================

/// BoundaryRecord - one administrative unit (governorate or district)
///
/// `entity_id` is the stable knowledge-base identifier used as join key.
/// `extra` preserves every source column that is not a canonical field,
/// including mangled upstream export names.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRecord {
    pub entity_id: String,
    pub name_en: String,
    pub name_ar: Option<String>,
    pub parent_name: Option<String>,
    pub level: AdminLevel,
    pub geometry: Geometry<f64>,
    pub extra: BTreeMap<String, Measure>,
}

impl BoundaryRecord {
    pub fn new(
        entity_id: impl Into<String>,
        name_en: impl Into<String>,
        level: AdminLevel,
        geometry: Geometry<f64>,
    ) -> Self {
        BoundaryRecord {
            entity_id: entity_id.into(),
            name_en: name_en.into(),
            name_ar: None,
            parent_name: None,
            level,
            geometry,
            extra: BTreeMap::new(),
        }
    }

    /// Builder: add Arabic display name
    pub fn with_name_ar(mut self, name_ar: impl Into<String>) -> Self {
        self.name_ar = Some(name_ar.into());
        self
    }

    /// Builder: add owning governorate name (districts only)
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_name = Some(parent.into());
        self
    }

    /// Builder: preserve a non-canonical source column
    pub fn with_extra(mut self, column: impl Into<String>, value: Measure) -> Self {
        self.extra.insert(column.into(), value);
        self
    }
}

// ============================================================================
// ATTRIBUTE RECORD
// ============================================================================

/// AttributeRecord - one row of external tabular data, keyed by entity_id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub entity_id: String,
    pub measures: BTreeMap<String, Measure>,
}

impl AttributeRecord {
    pub fn new(entity_id: impl Into<String>) -> Self {
        AttributeRecord {
            entity_id: entity_id.into(),
            measures: BTreeMap::new(),
        }
    }

    /// Builder: add a named measure
    pub fn with_measure(mut self, name: impl Into<String>, value: Measure) -> Self {
        self.measures.insert(name.into(), value);
        self
    }
}

// ============================================================================
// RECONCILED RECORD
// ============================================================================

/// ReconciledRecord - a boundary joined with zero-or-one attribute row
///
/// Unmatched boundaries keep every requested measure as `Measure::Missing`.
/// Derived values (area, density) are inserted into `measures` on a copy;
/// the underlying boundary geometry is never written back.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub boundary: BoundaryRecord,
    pub measures: BTreeMap<String, Measure>,
    pub matched: bool,
}

impl ReconciledRecord {
    /// Joined measures first, then the boundary's own preserved columns
    /// (population often ships inside the boundary dataset itself)
    pub fn measure(&self, name: &str) -> &Measure {
        self.measures
            .get(name)
            .or_else(|| self.boundary.extra.get(name))
            .unwrap_or(&Measure::Missing)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Geometry};

    fn unit_square() -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ])
    }

    #[test]
    fn test_measure_from_cell() {
        assert_eq!(Measure::from_cell("12.5"), Measure::Number(12.5));
        assert_eq!(Measure::from_cell("1,250"), Measure::Number(1250.0));
        assert_eq!(Measure::from_cell("Amman"), Measure::Text("Amman".to_string()));
        assert_eq!(Measure::from_cell("   "), Measure::Missing);
        assert_eq!(Measure::from_cell(""), Measure::Missing);
    }

    #[test]
    fn test_measure_serializes_missing_as_null() {
        let json = serde_json::to_value(&Measure::Missing).unwrap();
        assert!(json.is_null());

        let back: Measure = serde_json::from_value(serde_json::Value::Null).unwrap();
        assert!(back.is_missing());
    }

    #[test]
    fn test_measure_number_round_trip() {
        let json = serde_json::to_string(&Measure::Number(42.5)).unwrap();
        let back: Measure = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Measure::Number(42.5));
    }

    #[test]
    fn test_boundary_record_builder() {
        let record = BoundaryRecord::new("Q392600", "Amman", AdminLevel::Governorate, unit_square())
            .with_name_ar("عمان")
            .with_extra("source_scale", Measure::Text("20m".to_string()));

        assert_eq!(record.entity_id, "Q392600");
        assert_eq!(record.name_ar.as_deref(), Some("عمان"));
        assert!(record.parent_name.is_none());
        assert_eq!(record.extra.len(), 1);
    }

    #[test]
    fn test_reconciled_record_defaults_to_missing() {
        let record = ReconciledRecord {
            boundary: BoundaryRecord::new("Q1", "Amman", AdminLevel::District, unit_square()),
            measures: BTreeMap::new(),
            matched: false,
        };

        assert!(record.measure("rate").is_missing());
    }
}
