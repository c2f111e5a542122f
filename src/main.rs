use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use jordan_boundaries::{
    count_by_parent, population_resolver, read_attributes, read_boundaries, write_attributes_csv,
    write_geojson, write_shapefile, AdminLevel, DuplicatePolicy, MetricsEngine, Reconciler,
    SpatialJoiner, SummaryStats, POPULATION,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("reconcile") => run_reconcile(&args[2..]),
        Some("parents") => run_parents(&args[2..]),
        _ => {
            eprintln!("Usage:");
            eprintln!("  jordan-boundaries reconcile <boundaries.geojson> <attributes.{{csv,xlsx}}> <out-dir> [--fatal-duplicates]");
            eprintln!("  jordan-boundaries parents <districts.geojson> <governorates.geojson>");
            std::process::exit(1);
        }
    }
}

fn run_reconcile(args: &[String]) -> Result<()> {
    let [boundaries_path, attributes_path, out_dir] = match args {
        [b, a, o, rest @ ..] if rest.iter().all(|f| f == "--fatal-duplicates") => [b, a, o],
        _ => bail!("reconcile needs <boundaries.geojson> <attributes.{{csv,xlsx}}> <out-dir>"),
    };
    let policy = if args.iter().any(|a| a == "--fatal-duplicates") {
        DuplicatePolicy::Fatal
    } else {
        DuplicatePolicy::Warn
    };

    println!("🗺️  Jordan Boundaries: Reconcile + Derive + Export");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load boundaries
    println!("\n📂 Loading boundaries...");
    let dataset = read_boundaries(Path::new(boundaries_path), AdminLevel::District)?;
    println!(
        "✓ Loaded {} boundaries (CRS {}, join key column '{}')",
        dataset.records.len(),
        dataset.crs,
        dataset.join_key_column
    );

    // 2. Load attributes
    println!("\n📊 Loading attributes...");
    let attributes = read_attributes(Path::new(attributes_path))?;
    println!("✓ Loaded {} attribute rows", attributes.len());

    // 3. Reconcile
    println!("\n⚖️  Reconciling...");
    let report = Reconciler::with_duplicate_policy(policy).reconcile(&dataset.records, &attributes)?;
    println!("✓ {}", report.summary());
    for warning in &report.warnings {
        println!("  ⚠️  {}", warning.message);
    }

    // 4. Derived metrics
    println!("\n📏 Computing area and density...");
    let population_key = resolve_population_key(&report);
    let derived = MetricsEngine::new(population_key.as_str()).attach(&report.records);
    let stats = SummaryStats::compute(&derived, &population_key, 3);
    println!("✓ {}", stats.summary());
    for (name, density) in &stats.densest {
        println!("  {name}: {density:.0} per km²");
    }

    // 5. Export
    println!("\n💾 Exporting...");
    let out = Path::new(out_dir);
    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    write_geojson(&derived, &out.join("reconciled.geojson"))?;
    write_shapefile(&derived, &out.join("reconciled.shp"))?;
    write_attributes_csv(&derived, &out.join("reconciled_attributes.csv"))?;
    println!("✓ Wrote reconciled.geojson, reconciled.shp, reconciled_attributes.csv");

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Done: {} records, {} warnings", derived.len(), report.warnings.len());

    Ok(())
}

/// Population may live in the attribute table or in the boundary dataset
/// itself; resolve its drifting column name across both
fn resolve_population_key(report: &jordan_boundaries::ReconcileReport) -> String {
    let mut names: BTreeSet<String> = BTreeSet::new();
    for record in &report.records {
        names.extend(record.measures.keys().cloned());
        names.extend(record.boundary.extra.keys().cloned());
    }
    population_resolver()
        .resolve(&names)
        .unwrap_or_else(|| POPULATION.to_string())
}

fn run_parents(args: &[String]) -> Result<()> {
    let [districts_path, governorates_path] = match args {
        [d, g] => [d, g],
        _ => bail!("parents needs <districts.geojson> <governorates.geojson>"),
    };

    println!("🧭 Jordan Boundaries: Spatial Join (districts → governorates)");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let districts = read_boundaries(Path::new(districts_path), AdminLevel::District)?;
    let governorates = read_boundaries(Path::new(governorates_path), AdminLevel::Governorate)?;
    println!(
        "✓ Loaded {} districts, {} governorates",
        districts.records.len(),
        governorates.records.len()
    );

    let parents = SpatialJoiner::new().assign_parents(&districts.records, &governorates.records);

    let mut assigned: Vec<_> = districts.records.clone();
    for (district, parent) in assigned.iter_mut().zip(parents) {
        if parent.is_some() {
            district.parent_name = parent;
        }
    }

    println!("\nDistricts per governorate:");
    for (governorate, count) in count_by_parent(&assigned) {
        println!("  {governorate}: {count} districts");
    }

    let orphans = assigned.iter().filter(|d| d.parent_name.is_none()).count();
    if orphans > 0 {
        println!("  (unassigned: {orphans})");
    }

    Ok(())
}
