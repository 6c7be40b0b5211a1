use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use survey_core::{
    decode, load_body_catalog_from_env, load_survey_config_from_env, BodyCatalog, CellMap,
    Decoded, ScanRegistry, ScanRules, SurveyConfig,
};
use survey_schema::{
    decode_save, decode_save_json, encode_save, encode_save_json, BodyScanRecord, SurveySave,
};

const MAX_RENDER_WIDTH: u32 = 120;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect orbital survey save files", long_about = None)]
struct Args {
    /// Save file (JSON, or bincode when the extension is `bin`)
    #[arg(long)]
    save: PathBuf,

    /// Body catalog JSON (defaults to SURVEY_BODIES_PATH, then the builtin catalog)
    #[arg(long)]
    bodies: Option<PathBuf>,

    /// Survey config JSON (defaults to SURVEY_CONFIG_PATH, then the builtin config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only report this body
    #[arg(long)]
    body: Option<String>,

    /// Print an ASCII coverage map for each reported body
    #[arg(long)]
    render: bool,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,

    /// Re-encode the save into this path, upgrading legacy layers
    #[arg(long)]
    rewrite: Option<PathBuf>,
}

struct BodyReport {
    name: String,
    width: u32,
    height: u32,
    data_form: &'static str,
    revealed_form: &'static str,
    issues: usize,
    scan_percent: f64,
    mits_transmitted: Option<f32>,
    total_mits: Option<f32>,
    scanned: CellMap,
    revealed: CellMap,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config: Arc<SurveyConfig> = match &args.config {
        Some(path) => Arc::new(
            SurveyConfig::from_file(path)
                .with_context(|| format!("Failed to load survey config {}", path.display()))?,
        ),
        None => load_survey_config_from_env().0,
    };
    let catalog = match &args.bodies {
        Some(path) => BodyCatalog::from_file(path, config.sizing.clone(), config.altitude.clone())
            .with_context(|| format!("Failed to load body catalog {}", path.display()))?,
        None => load_body_catalog_from_env(config.sizing.clone(), config.altitude.clone()),
    };

    let save = read_save(&args.save)?;
    if !save.verify_hash()? {
        tracing::warn!(
            path = %args.save.display(),
            stored = save.hash,
            "save hash does not match contents"
        );
    }

    let reports: Vec<BodyReport> = save
        .bodies
        .iter()
        .filter(|(name, _)| args.body.as_deref().map_or(true, |wanted| wanted == name.as_str()))
        .filter_map(|(name, record)| inspect_body(name, record, &catalog))
        .collect();

    if let Some(body) = &args.body {
        if reports.is_empty() {
            anyhow::bail!("Body '{}' not found in {}", body, args.save.display());
        }
    }

    if args.json {
        print_json(&save, &reports)?;
    } else {
        print_table(&save, &reports, args.render);
    }

    if let Some(out) = &args.rewrite {
        rewrite(&save, &catalog, &config, out)?;
    }

    Ok(())
}

fn read_save(path: &Path) -> Result<SurveySave> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read save {}", path.display()))?;
    let save = if is_binary(path) {
        decode_save(&bytes)
    } else {
        let text = std::str::from_utf8(&bytes)
            .with_context(|| format!("Save {} is not UTF-8", path.display()))?;
        decode_save_json(text)
    };
    save.with_context(|| format!("Failed to decode save {}", path.display()))
}

fn write_save(path: &Path, save: &SurveySave) -> Result<()> {
    let bytes = if is_binary(path) {
        encode_save(save)?
    } else {
        encode_save_json(save)?.into_bytes()
    };
    fs::write(path, bytes).with_context(|| format!("Failed to write save {}", path.display()))
}

fn is_binary(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "bin")
}

fn inspect_body(name: &str, record: &BodyScanRecord, catalog: &BodyCatalog) -> Option<BodyReport> {
    let id = catalog.id_by_name(name);
    if id.is_some_and(|id| !catalog.is_scannable(id)) {
        tracing::warn!(body = %name, "body cannot be scanned, skipped");
        return None;
    }
    let metrics = id.and_then(|id| catalog.metrics(id));
    let dimensions = record
        .dimensions()
        .filter(|(width, height)| *width > 0 && *height > 0)
        .or_else(|| metrics.map(|m| (m.width, m.height)));
    let Some((width, height)) = dimensions else {
        tracing::warn!(body = %name, "no stored dimensions and body not in catalog, skipped");
        return None;
    };

    let decode_layer = |layer: Option<&str>| -> (CellMap, &'static str, usize) {
        match layer {
            Some(text) => {
                let Decoded { map, form, issues } = decode(text, width, height);
                for issue in &issues {
                    tracing::warn!(body = %name, issue = %issue, "decode issue");
                }
                (map, form.label(), issues.len())
            }
            None => (CellMap::new(width, height), "missing", 0),
        }
    };
    let (scanned, data_form, data_issues) = decode_layer(record.data.as_deref());
    let (revealed, revealed_form, revealed_issues) = decode_layer(record.revealed.as_deref());

    Some(BodyReport {
        name: name.to_string(),
        width,
        height,
        data_form,
        revealed_form,
        issues: data_issues + revealed_issues,
        scan_percent: scanned.area_weighted_fraction(),
        mits_transmitted: record.mits_transmitted,
        total_mits: metrics.map(|m| m.total_mits),
        scanned,
        revealed,
    })
}

fn print_table(save: &SurveySave, reports: &[BodyReport], render: bool) {
    println!(
        "save version {} | {} bodies | hash {:016x}",
        save.version,
        save.bodies.len(),
        save.hash
    );
    for report in reports {
        let mits = match (report.mits_transmitted, report.total_mits) {
            (Some(sent), Some(total)) => format!("{sent:.2}/{total}"),
            (Some(sent), None) => format!("{sent:.2}/?"),
            (None, _) => "-".to_string(),
        };
        println!(
            "{:<12} {:>4}x{:<4} scanned {:>6.2}% revealed {:>6} cells  data={:<10} revealed={:<10} mits={} issues={}",
            report.name,
            report.width,
            report.height,
            report.scan_percent * 100.0,
            report.revealed.count_set(),
            report.data_form,
            report.revealed_form,
            mits,
            report.issues
        );
        if render {
            println!("{}", render_map(&report.scanned, &report.revealed));
        }
    }
}

fn print_json(save: &SurveySave, reports: &[BodyReport]) -> Result<()> {
    let bodies: Vec<_> = reports
        .iter()
        .map(|report| {
            json!({
                "name": report.name,
                "width": report.width,
                "height": report.height,
                "dataForm": report.data_form,
                "revealedForm": report.revealed_form,
                "scanPercent": report.scan_percent,
                "revealedCells": report.revealed.count_set(),
                "mitsTransmitted": report.mits_transmitted,
                "totalMits": report.total_mits,
                "issues": report.issues,
            })
        })
        .collect();
    let summary = json!({
        "version": save.version,
        "hash": save.hash,
        "bodies": bodies,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// North at the top, columns in storage order. `#` revealed, `+` scanned
/// only, `.` unscanned.
fn render_map(scanned: &CellMap, revealed: &CellMap) -> String {
    let stride = scanned.width().div_ceil(MAX_RENDER_WIDTH).max(1) as usize;
    let mut out = String::new();
    for row in (0..scanned.height()).rev().step_by(stride) {
        for col in (0..scanned.width()).step_by(stride) {
            let cell = if revealed.get(col, row) {
                '#'
            } else if scanned.get(col, row) {
                '+'
            } else {
                '.'
            };
            out.push(cell);
        }
        out.push('\n');
    }
    out
}

fn rewrite(save: &SurveySave, catalog: &BodyCatalog, config: &SurveyConfig, out: &Path) -> Result<()> {
    let mut registry = ScanRegistry::new(catalog.clone(), ScanRules::from(config));
    let report = registry.load_all(save);
    for name in &report.unknown_bodies {
        eprintln!("dropping '{name}': not in the body catalog");
    }
    let rewritten = registry.save_all().finalize()?;
    write_save(out, &rewritten)?;
    println!(
        "rewrote {} bodies to {} ({} load warnings)",
        report.bodies_loaded,
        out.display(),
        report.warnings
    );
    Ok(())
}
