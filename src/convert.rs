//! Single-instance conversion: `DAT/<category>/<name>.dat` to
//! `INSTANCES/<category>/<name>.atsp`.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};
use crate::instance::MdmtspInstance;
use crate::transform::{AtspTransformer, Rounding, TransformConfig};
use crate::tsplib::write_atsp;

pub const INPUT_DIR: &str = "DAT";
pub const OUTPUT_DIR: &str = "INSTANCES";
pub const INPUT_EXTENSION: &str = "dat";
pub const OUTPUT_EXTENSION: &str = "atsp";
const PARTIAL_EXTENSION: &str = "atsp.part";

/// Input and output locations of one instance under a data root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePaths {
    pub root: PathBuf,
    pub category: String,
    pub name: String,
}

impl InstancePaths {
    pub fn new(root: impl Into<PathBuf>, category: &str, name: &str) -> Result<Self> {
        check_component("category", category)?;
        check_component("instance name", name)?;
        Ok(InstancePaths {
            root: root.into(),
            category: category.to_string(),
            name: name.to_string(),
        })
    }

    pub fn input_dir(&self) -> PathBuf {
        category_input_dir(&self.root, &self.category)
    }

    pub fn output_dir(&self) -> PathBuf {
        category_output_dir(&self.root, &self.category)
    }

    pub fn input_path(&self) -> PathBuf {
        self.input_dir().join(format!("{}.{}", self.name, INPUT_EXTENSION))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir().join(format!("{}.{}", self.name, OUTPUT_EXTENSION))
    }
}

/// `<root>/DAT/<category>`
pub fn category_input_dir(root: &Path, category: &str) -> PathBuf {
    root.join(INPUT_DIR).join(category)
}

/// `<root>/INSTANCES/<category>`
pub fn category_output_dir(root: &Path, category: &str) -> PathBuf {
    root.join(OUTPUT_DIR).join(category)
}

/// Category and instance names must be single, plain path components.
pub(crate) fn check_component(what: &str, value: &str) -> Result<()> {
    let plain = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\']);
    if plain {
        Ok(())
    } else {
        Err(ConvertError::usage(format!("invalid {} '{}'", what, value)))
    }
}

/// What a successful conversion produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionSummary {
    pub name: String,
    pub depots: usize,
    pub customers: usize,
    pub dimension: usize,
    pub rounding: Rounding,
    pub sentinel: u64,
    pub output: PathBuf,
    /// Wall time in milliseconds
    pub elapsed_ms: f64,
}

impl std::fmt::Display for ConversionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Depots: {}, customers: {}", self.depots, self.customers)?;
        writeln!(f, "  Dimension: {}", self.dimension)?;
        writeln!(f, "  Rounding: {}", self.rounding)?;
        writeln!(f, "  Sentinel: {}", self.sentinel)?;
        writeln!(f, "  Output: {}", self.output.display())?;
        writeln!(f, "  Time: {:.2}ms", self.elapsed_ms)
    }
}

/// Convert one instance laid out under the data root.
pub fn convert(paths: &InstancePaths, config: TransformConfig) -> Result<ConversionSummary> {
    convert_file(&paths.input_path(), &paths.output_path(), &paths.name, config)
}

/// Convert `input` into `output`, naming the ATSP instance `name`.
///
/// The whole input is parsed before anything is created on disk.
pub fn convert_file(
    input: &Path,
    output: &Path,
    name: &str,
    config: TransformConfig,
) -> Result<ConversionSummary> {
    let start = Instant::now();
    log::info!("convert {}", name);

    let instance = MdmtspInstance::from_file(input)?;
    let transformer = AtspTransformer::new(&instance, config);
    write_instance_file(output, name, &transformer)?;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    log::debug!("{} written to {:?} in {:.2}ms", name, output, elapsed_ms);

    Ok(ConversionSummary {
        name: name.to_string(),
        depots: instance.depots,
        customers: instance.customers,
        dimension: transformer.dimension(),
        rounding: transformer.rounding(),
        sentinel: transformer.sentinel(),
        output: output.to_path_buf(),
        elapsed_ms,
    })
}

/// Write the ATSP file next to its final location and move it into place
/// once complete, so a failed run never leaves a truncated `.atsp` behind.
pub fn write_instance_file(path: &Path, name: &str, transformer: &AtspTransformer) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| ConvertError::output_open(dir, e))?;
    }

    let partial = path.with_extension(PARTIAL_EXTENSION);
    let file = File::create(&partial).map_err(|e| ConvertError::output_open(path, e))?;

    let written = (|| -> io::Result<()> {
        let mut writer = BufWriter::new(file);
        write_atsp(name, transformer, &mut writer)?;
        writer.get_ref().sync_all()
    })();

    commit_partial(&partial, path, written)
}

/// Move a fully written partial file into place, or remove it when writing
/// or renaming failed.
fn commit_partial(partial: &Path, path: &Path, written: io::Result<()>) -> Result<()> {
    written
        .and_then(|_| fs::rename(partial, path))
        .map_err(|e| {
            let _ = fs::remove_file(partial);
            ConvertError::output_open(path, e)
        })
}
