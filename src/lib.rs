// Jordan Administrative Boundaries - Core Library
// Exposes all modules for use in the CLI and tests

pub mod derive;
pub mod error;
pub mod export;
pub mod loader;
pub mod model;
pub mod reconcile;
pub mod schema;
pub mod spatial;

// Re-export commonly used types
pub use derive::{density, geodesic_area_km2, MetricsEngine, SummaryStats, AREA_KM2, DENSITY_PER_KM2};
pub use error::BoundaryError;
pub use export::{dbf_field_names, write_attributes_csv, write_geojson, write_shapefile};
pub use loader::{
    detect_source, read_attributes, read_boundaries, AttributeSource, BoundaryDataset, CsvSource,
    ExcelSource, WGS84,
};
pub use model::{AdminLevel, AttributeRecord, BoundaryRecord, Measure, ReconciledRecord};
pub use reconcile::{
    DuplicatePolicy, ReconcileReport, ReconcileWarning, Reconciler, WarningKind,
};
pub use schema::{
    join_key_resolver, parent_name_resolver, population_resolver, resolve_join_key,
    ColumnResolver, JOIN_KEY, PARENT_NAME, POPULATION,
};
pub use spatial::{count_by_parent, filter_by_parent, JoinPredicate, SpatialJoiner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
