//! Batch conversion of every instance of a category.
//!
//! Instances are converted in parallel; one record per instance is kept and
//! exported as CSV next to the produced `.atsp` files.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::convert::{
    category_input_dir, category_output_dir, check_component, convert_file, INPUT_EXTENSION,
    OUTPUT_EXTENSION,
};
use crate::error::{ConvertError, Result};
use crate::transform::TransformConfig;

pub const REPORT_FILE: &str = "conversion.csv";

/// Outcome of converting one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub name: String,
    pub depots: Option<usize>,
    pub customers: Option<usize>,
    pub dimension: Option<usize>,
    pub rounding: String,
    pub sentinel: Option<u64>,
    pub status: String,
    pub elapsed_ms: f64,
    pub error: Option<String>,
}

impl ConversionRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Batch configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub root: PathBuf,
    pub category: String,
    pub transform: TransformConfig,
    /// Show a progress bar on stderr
    pub progress: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            root: PathBuf::from("."),
            category: String::new(),
            transform: TransformConfig::default(),
            progress: true,
        }
    }
}

/// Records of a batch run, in instance-name order
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub records: Vec<ConversionRecord>,
}

impl BatchReport {
    pub fn converted(&self) -> usize {
        self.records.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.converted()
    }

    /// `Ok` when every instance converted, `BatchFailed` otherwise
    pub fn into_result(self) -> Result<()> {
        match self.failed() {
            0 => Ok(()),
            failed => Err(ConvertError::BatchFailed {
                failed,
                total: self.records.len(),
            }),
        }
    }

    /// Export records to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| ConvertError::output_open(path, e))?;
        let mut writer = csv::Writer::from_writer(file);

        for record in &self.records {
            writer.serialize(record).map_err(std::io::Error::from)?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:<30} {:>8} {:>10} {:>12}", "Instance", "Status", "Dimension", "Time (ms)")?;
        writeln!(f, "{}", "-".repeat(63))?;
        for r in &self.records {
            let dimension = r
                .dimension
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(f, "{:<30} {:>8} {:>10} {:>12.2}", r.name, r.status, dimension, r.elapsed_ms)?;
            if let Some(error) = &r.error {
                writeln!(f, "    {}", error)?;
            }
        }
        writeln!(f, "{}", "-".repeat(63))?;
        writeln!(f, "Converted: {}, failed: {}", self.converted(), self.failed())
    }
}

/// Helper function to list the `.dat` files of a directory, sorted by name
pub fn list_instances<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| ConvertError::input_open(dir, e))?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().map(|e| e == INPUT_EXTENSION).unwrap_or(false))
        .collect();

    paths.sort();
    Ok(paths)
}

/// Convert every instance of `<root>/DAT/<category>` and write the CSV report.
pub fn run_batch(config: &BatchConfig) -> Result<BatchReport> {
    check_component("category", &config.category)?;
    let input_dir = category_input_dir(&config.root, &config.category);
    let output_dir = category_output_dir(&config.root, &config.category);

    let inputs = list_instances(&input_dir)?;
    log::info!("Found {} instance(s) in {:?}", inputs.len(), input_dir);

    let progress = if config.progress {
        let pb = ProgressBar::new(inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{bar:40.cyan/blue} {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_message(format!("Converting {}", config.category));
        pb
    } else {
        ProgressBar::hidden()
    };

    // Instances already run in parallel; rows of one instance stay sequential.
    let transform = TransformConfig {
        parallel: false,
        ..config.transform
    };

    let records: Vec<ConversionRecord> = inputs
        .par_iter()
        .map(|input| {
            let record = convert_one(input, &output_dir, transform);
            progress.inc(1);
            record
        })
        .collect();
    progress.finish_and_clear();

    let report = BatchReport { records };
    fs::create_dir_all(&output_dir).map_err(|e| ConvertError::output_open(&output_dir, e))?;
    report.export_to_csv(output_dir.join(REPORT_FILE))?;

    Ok(report)
}

fn convert_one(input: &Path, output_dir: &Path, config: TransformConfig) -> ConversionRecord {
    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let output = output_dir.join(format!("{}.{}", name, OUTPUT_EXTENSION));
    let start = Instant::now();

    match convert_file(input, &output, &name, config) {
        Ok(summary) => ConversionRecord {
            name,
            depots: Some(summary.depots),
            customers: Some(summary.customers),
            dimension: Some(summary.dimension),
            rounding: summary.rounding.to_string(),
            sentinel: Some(summary.sentinel),
            status: "ok".to_string(),
            elapsed_ms: summary.elapsed_ms,
            error: None,
        },
        Err(e) => {
            log::error!("{}: {}", name, e);
            ConversionRecord {
                name,
                depots: None,
                customers: None,
                dimension: None,
                rounding: config.rounding.to_string(),
                sentinel: None,
                status: "failed".to_string(),
                elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
                error: Some(e.to_string()),
            }
        }
    }
}
