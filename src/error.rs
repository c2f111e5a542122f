// ❗ Domain Errors - Schema drift and join-key failures
// MissingMeasure is data (Measure::Missing), never an error

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundaryError {
    /// Join key column absent under all known aliases - fatal, never
    /// proceed with a missing key
    #[error("join key column not found; tried {tried:?}")]
    JoinKeyMissing { tried: Vec<String> },

    /// Join key not unique in the attribute source; only raised when the
    /// reconciler is configured with DuplicatePolicy::Fatal
    #[error("duplicate entity_id '{0}' in attribute source")]
    DuplicateKey(String),

    /// Boundary features must be polygonal
    #[error("unsupported geometry '{0}' (expected Polygon or MultiPolygon)")]
    UnsupportedGeometry(String),

    /// Attribute file extension not handled by any loader
    #[error("unsupported attribute format '{0}' (expected .csv, .xlsx or .xls)")]
    UnsupportedFormat(String),
}
