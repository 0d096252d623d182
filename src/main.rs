//! MDMTSP to ATSP converter - Command Line Interface

use clap::{Args, Parser, Subcommand, ValueEnum};
use mdmtsp_atsp::batch::{run_batch, BatchConfig, REPORT_FILE};
use mdmtsp_atsp::convert::{category_output_dir, convert, InstancePaths};
use mdmtsp_atsp::error::{ConvertError, Result, EXIT_OK, EXIT_USAGE};
use mdmtsp_atsp::instance::MdmtspInstance;
use mdmtsp_atsp::tour::decode_tsplib_tour;
use mdmtsp_atsp::transform::{AtspTransformer, Rounding, Sentinel, TransformConfig, DEFAULT_SENTINEL};
use mdmtsp_atsp::tsplib::TsplibTour;

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mdmtsp-atsp")]
#[command(version = "1.0")]
#[command(about = "Converts multi-depot multiple TSP instances into explicit ATSP instances")]
struct Cli {
    /// Directory holding DAT/ (inputs) and INSTANCES/ (outputs)
    #[arg(long, global = true, env = "MDMTSP_ROOT", default_value = ".")]
    root: PathBuf,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert DAT/<category>/<name>.dat into INSTANCES/<category>/<name>.atsp
    Convert {
        category: String,

        name: String,

        /// Distance rounding; `f` is accepted for `round`
        #[arg(value_enum, default_value = "ceil")]
        rounding: RoundingArg,

        #[command(flatten)]
        matrix: MatrixArgs,
    },

    /// Convert every instance of DAT/<category>
    Batch {
        category: String,

        /// Distance rounding
        #[arg(short, long, value_enum, default_value = "ceil")]
        rounding: RoundingArg,

        #[command(flatten)]
        matrix: MatrixArgs,

        /// Do not show a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Print statistics about an instance
    Analyze {
        category: String,

        name: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Decode an ATSP solver tour into vehicle routes
    Decode {
        category: String,

        name: String,

        /// TSPLIB tour file produced for INSTANCES/<category>/<name>.atsp
        #[arg(short, long)]
        tour: PathBuf,

        /// Rounding the instance was converted with
        #[arg(value_enum, default_value = "ceil")]
        rounding: RoundingArg,

        #[command(flatten)]
        matrix: MatrixArgs,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct MatrixArgs {
    /// Cost of forbidden edges: an integer or `auto`
    #[arg(long, default_value_t = Sentinel::Fixed(DEFAULT_SENTINEL))]
    sentinel: Sentinel,

    /// Format matrix rows on all cores
    #[arg(long)]
    parallel: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum RoundingArg {
    /// Round distances up
    Ceil,
    /// Round distances to nearest
    #[value(alias = "f")]
    Round,
}

impl From<RoundingArg> for Rounding {
    fn from(arg: RoundingArg) -> Self {
        match arg {
            RoundingArg::Ceil => Rounding::Ceil,
            RoundingArg::Round => Rounding::Round,
        }
    }
}

impl MatrixArgs {
    fn config(&self, rounding: RoundingArg) -> TransformConfig {
        TransformConfig {
            rounding: rounding.into(),
            sentinel: self.sentinel,
            parallel: self.parallel,
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_OK };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Convert { category, name, rounding, matrix } => {
            convert_instance(&cli.root, &category, &name, matrix.config(rounding))
        }

        Commands::Batch { category, rounding, matrix, no_progress } => {
            convert_category(&cli.root, &category, matrix.config(rounding), !no_progress)
        }

        Commands::Analyze { category, name, json } => analyze_instance(&cli.root, &category, &name, json),

        Commands::Decode { category, name, tour, rounding, matrix, json } => {
            decode(&cli.root, &category, &name, &tour, matrix.config(rounding), json)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

fn convert_instance(root: &Path, category: &str, name: &str, config: TransformConfig) -> Result<()> {
    let paths = InstancePaths::new(root, category, name)?;
    println!("Converting {:?}...", paths.input_path());

    let summary = convert(&paths, config)?;

    println!("\n{}", summary);
    Ok(())
}

fn convert_category(root: &Path, category: &str, config: TransformConfig, progress: bool) -> Result<()> {
    let batch = BatchConfig {
        root: root.to_path_buf(),
        category: category.to_string(),
        transform: config,
        progress,
    };
    let report = run_batch(&batch)?;

    println!("{}", report);
    println!(
        "Report saved to {:?}",
        category_output_dir(root, category).join(REPORT_FILE)
    );

    report.into_result()
}

fn analyze_instance(root: &Path, category: &str, name: &str, json: bool) -> Result<()> {
    let paths = InstancePaths::new(root, category, name)?;
    let instance = MdmtspInstance::from_file(paths.input_path())?;
    let stats = instance.statistics();

    if json {
        let text = serde_json::to_string_pretty(&stats).map_err(std::io::Error::from)?;
        println!("{}", text);
        return Ok(());
    }

    println!("========== Instance Analysis ==========\n");
    println!("{}", stats);
    let safe = stats.tour_cost_bound < DEFAULT_SENTINEL;
    println!(
        "Default sentinel {} exceeds the tour cost bound: {}",
        DEFAULT_SENTINEL,
        if safe { "yes" } else { "no (use --sentinel auto)" }
    );
    Ok(())
}

fn decode(
    root: &Path,
    category: &str,
    name: &str,
    tour_path: &Path,
    config: TransformConfig,
    json: bool,
) -> Result<()> {
    let paths = InstancePaths::new(root, category, name)?;
    let instance = MdmtspInstance::from_file(paths.input_path())?;
    let transformer = AtspTransformer::new(&instance, config);

    let tour = TsplibTour::from_file(tour_path)?;
    if let Some(tour_name) = &tour.name {
        log::debug!("Decoding tour {}", tour_name);
    }
    let decoded = decode_tsplib_tour(&transformer, &tour)?;

    if json {
        let text = serde_json::to_string_pretty(&decoded).map_err(std::io::Error::from)?;
        println!("{}", text);
    } else {
        println!("========== Routes for {} ==========\n", instance.name);
        print!("{}", decoded);
    }

    if !decoded.feasible() {
        return Err(ConvertError::invalid_tour(format!(
            "tour uses {} forbidden edge(s)",
            decoded.forbidden_edges
        )));
    }
    Ok(())
}
