use anyhow::{Context, Result};
use clap::Args;
use log::{debug, warn};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

#[derive(Args, Debug, Clone)]
pub struct PackArgs {
    /// Directory searched recursively for `*.json` payloads.
    #[arg(long, default_value = "tiles")]
    pub input_dir: PathBuf,

    #[arg(long, default_value = "tiles_vctr")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PackReport {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Written,
    Skipped,
}

fn collect_payloads(input_dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")))
        .collect();

    found.sort();
    found
}

/// Mirrors the input layout under `output_dir`, with a `.vctr` extension.
fn output_path(args: &PackArgs, input: &Path) -> PathBuf {
    let relative = input.strip_prefix(&args.input_dir).unwrap_or(input);
    args.output_dir.join(relative).with_extension("vctr")
}

fn pack_one(args: &PackArgs, input: &Path) -> Result<Outcome> {
    let out = output_path(args, input);
    if out.exists() && !args.overwrite {
        debug!("{} exists, skipping", out.display());
        return Ok(Outcome::Skipped);
    }

    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let payload = vctr::parse_payload(&bytes, 0, vctr::Framing::Unframed)
        .with_context(|| format!("parsing {}", input.display()))?;

    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    vctr::write_file(&out, &payload).with_context(|| format!("writing {}", out.display()))?;

    debug!("{} -> {} ({} polygons)", input.display(), out.display(), payload.polygons.len());
    Ok(Outcome::Written)
}

pub fn run(args: &PackArgs) -> Result<PackReport> {
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let inputs = collect_payloads(&args.input_dir);
    log::info!("Packing {} payloads from {}...", inputs.len(), args.input_dir.display());

    let outcomes: Vec<Result<Outcome>> = inputs.par_iter().map(|p| pack_one(args, p)).collect();

    let mut report = PackReport::default();
    for outcome in outcomes {
        match outcome {
            Ok(Outcome::Written) => report.written += 1,
            Ok(Outcome::Skipped) => report.skipped += 1,
            Err(err) => {
                warn!("{err:#}");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
