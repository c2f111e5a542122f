// 📏 Derived Metrics - Geodesic area and population density
//
// Area is computed on the WGS84 ellipsoid (geodesic), never as planar area
// over longitude/latitude degrees. A missing population yields a missing
// density for any area value, including zero - never 0 and never infinite.

use crate::model::{Measure, ReconciledRecord};
use geo::{GeodesicArea, Geometry};

/// Measure name the area is attached under
pub const AREA_KM2: &str = "area_km2";

/// Measure name the density is attached under
pub const DENSITY_PER_KM2: &str = "pop_density_per_km2";

const M2_PER_KM2: f64 = 1_000_000.0;

// ============================================================================
// AREA
// ============================================================================

/// Geodesic area in km², `None` for non-areal geometry
pub fn geodesic_area_km2(geometry: &Geometry<f64>) -> Option<f64> {
    match geometry {
        Geometry::Polygon(p) => Some(p.geodesic_area_unsigned() / M2_PER_KM2),
        Geometry::MultiPolygon(mp) => Some(mp.geodesic_area_unsigned() / M2_PER_KM2),
        _ => None,
    }
}

// ============================================================================
// DENSITY
// ============================================================================

/// population / area, with explicit missing propagation
pub fn density(population: &Measure, area_km2: f64) -> Measure {
    match population {
        Measure::Number(pop) if area_km2 > 0.0 => Measure::Number(pop / area_km2),
        // Zero or negative area cannot produce a finite density
        _ => Measure::Missing,
    }
}

// ============================================================================
// METRICS ENGINE
// ============================================================================

/// Attaches area and density measures to reconciled records
///
/// Works on copies; boundary geometry is never written back.
pub struct MetricsEngine {
    /// Resolved name of the population measure in the attribute source
    pub population_key: String,
}

impl MetricsEngine {
    pub fn new(population_key: impl Into<String>) -> Self {
        MetricsEngine {
            population_key: population_key.into(),
        }
    }

    pub fn attach(&self, records: &[ReconciledRecord]) -> Vec<ReconciledRecord> {
        records
            .iter()
            .map(|record| {
                let mut out = record.clone();
                match geodesic_area_km2(&out.boundary.geometry) {
                    Some(area) => {
                        let population = out.measure(&self.population_key).clone();
                        out.measures.insert(AREA_KM2.to_string(), Measure::Number(area));
                        out.measures
                            .insert(DENSITY_PER_KM2.to_string(), density(&population, area));
                    }
                    None => {
                        out.measures.insert(AREA_KM2.to_string(), Measure::Missing);
                        out.measures.insert(DENSITY_PER_KM2.to_string(), Measure::Missing);
                    }
                }
                out
            })
            .collect()
    }
}

// ============================================================================
// SUMMARY STATISTICS
// ============================================================================

/// SummaryStats - derived statistics over a reconciled collection
///
/// Missing values are skipped, not treated as zero; `skipped_missing`
/// reports how many records lacked a population.
#[derive(Debug, Clone)]
pub struct SummaryStats {
    pub total_area_km2: f64,
    pub mean_area_km2: Option<f64>,
    pub total_population: f64,
    pub mean_density_per_km2: Option<f64>,
    pub skipped_missing: usize,
    /// (name_en, density) of the densest units, highest first
    pub densest: Vec<(String, f64)>,
}

impl SummaryStats {
    pub fn compute(records: &[ReconciledRecord], population_key: &str, top_n: usize) -> Self {
        let areas: Vec<f64> = records
            .iter()
            .filter_map(|r| r.measure(AREA_KM2).as_number())
            .collect();

        let total_area_km2 = areas.iter().sum();
        let mean_area_km2 = if areas.is_empty() {
            None
        } else {
            Some(total_area_km2 / areas.len() as f64)
        };

        let mut densities: Vec<(String, f64)> = Vec::new();
        let mut total_population = 0.0;
        let mut skipped_missing = 0;

        for record in records {
            match record.measure(DENSITY_PER_KM2).as_number() {
                Some(d) => densities.push((record.boundary.name_en.clone(), d)),
                None => skipped_missing += 1,
            }
            if let Some(pop) = record.measure(population_key).as_number() {
                total_population += pop;
            }
        }

        let mean_density_per_km2 = if densities.is_empty() {
            None
        } else {
            Some(densities.iter().map(|(_, d)| d).sum::<f64>() / densities.len() as f64)
        };

        densities.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        densities.truncate(top_n);

        SummaryStats {
            total_area_km2,
            mean_area_km2,
            total_population,
            mean_density_per_km2,
            skipped_missing,
            densest: densities,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Total area {:.0} km², total population {:.0}, mean density {}, {} records without population",
            self.total_area_km2,
            self.total_population,
            self.mean_density_per_km2
                .map(|d| format!("{d:.1}/km²"))
                .unwrap_or_else(|| "n/a".to_string()),
            self.skipped_missing
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
