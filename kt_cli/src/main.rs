//! # kt_cli
//!
//! Command-line front end for kt_core. Reads coupons and tables from JSON,
//! runs the pipeline against the analytic solver backend and prints results
//! as JSON on stdout. Logs go to stderr (`-v` for info, `-vv` for debug,
//! or `RUST_LOG`).
//!
//! ```text
//! kt_cli classify coupon.json
//! kt_cli plan coupon.json --repair
//! kt_cli run coupon.json --settings settings.json --output report.json \
//!        --factors factors.json --material material.json --ktdls 65 86 129
//! kt_cli margin --kts 92360.3 --kc-kt 0.649 --ktdls 65 86 129 --fg 0.97 --ft 0.9
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{info, warn, LevelFilter};
use serde::Serialize;

use kt_core::analysis::{HoleCondition, KtsResult, StressLocation};
use kt_core::boundary::plan_with_settings;
use kt_core::coupon::Configuration;
use kt_core::errors::{KtError, KtResult};
use kt_core::factors::{CorrectionFactors, MaterialSpec};
use kt_core::file_io::{load_coupon, load_factor_tables, load_json, load_settings, save_report};
use kt_core::margin::{margin, KtdlsTable};
use kt_core::pipeline::spawn_analysis;
use kt_core::solver::{AnalyticSolver, Surface};
use kt_core::symmetry::classify_coupon;

#[derive(Parser)]
#[command(name = "kt_cli")]
#[command(author, version, about = "Fastener-hole fatigue Kts and margin of safety")]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the symmetry case of a coupon
    Classify {
        coupon: PathBuf,
    },
    /// Print the boundary condition plan of a coupon
    Plan {
        coupon: PathBuf,
        /// Plan the repair configuration instead of print
        #[arg(long)]
        repair: bool,
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Run the full analysis
    Run(RunArgs),
    /// Margin of safety for a known Kts
    Margin(MarginArgs),
}

#[derive(Args)]
struct RunArgs {
    coupon: PathBuf,
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Write the report here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Correction factor tables; margins are computed when given
    #[arg(long, requires_all = ["material", "ktdls"])]
    factors: Option<PathBuf>,
    /// Print material
    #[arg(long)]
    material: Option<PathBuf>,
    /// Repair material, defaults to the print material
    #[arg(long)]
    repair_material: Option<PathBuf>,
    /// KtDLS at Kc/Kt = 1.0, 0.5, 0.0 (ksi)
    #[arg(long, num_args = 3, value_names = ["AT_ONE", "AT_HALF", "AT_ZERO"])]
    ktdls: Option<Vec<f64>>,
}

#[derive(Args)]
struct MarginArgs {
    /// Peak stress, psi
    #[arg(long, allow_negative_numbers = true)]
    kts: f64,
    /// Omit when undefined
    #[arg(long, allow_negative_numbers = true)]
    kc_kt: Option<f64>,
    /// KtDLS at Kc/Kt = 1.0, 0.5, 0.0 (ksi)
    #[arg(long, required = true, num_args = 3, value_names = ["AT_ONE", "AT_HALF", "AT_ZERO"])]
    ktdls: Vec<f64>,
    #[arg(long, default_value_t = 1.0)]
    fsg: f64,
    #[arg(long, default_value_t = 1.0)]
    fg: f64,
    #[arg(long, default_value_t = 1.0)]
    ft: f64,
    #[arg(long, default_value_t = 1.0)]
    fsf: f64,
    #[arg(long, default_value_t = 1.0)]
    fsc: f64,
}

fn ktdls_table(values: &[f64]) -> KtResult<KtdlsTable> {
    match values {
        [at_one, at_half, at_zero] => Ok(KtdlsTable::from_ksi(*at_one, *at_half, *at_zero)),
        _ => Err(KtError::invalid_input(
            "ktdls",
            format!("{:?}", values),
            "Expected three values",
        )),
    }
}

fn print_json<T: Serialize>(value: &T) -> KtResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| KtError::SerializationError {
        reason: e.to_string(),
    })?;
    println!("{}", json);
    Ok(())
}

fn run(args: RunArgs) -> KtResult<()> {
    let coupon = load_coupon(&args.coupon)?;
    let settings = load_settings(args.settings.as_deref())?;
    let timeout = settings.solver_timeout();

    let handle = spawn_analysis(Box::new(AnalyticSolver::new()), coupon, settings);
    let mut report = handle.wait(timeout)?;

    if let (Some(factors), Some(material), Some(ktdls)) = (&args.factors, &args.material, &args.ktdls) {
        let tables = load_factor_tables(factors)?;
        let print_material: MaterialSpec = load_json(material)?;
        let repair_material: Option<MaterialSpec> = args
            .repair_material
            .as_deref()
            .map(load_json::<MaterialSpec>)
            .transpose()?;
        report = report.with_margins(&tables, &print_material, repair_material.as_ref(), &ktdls_table(ktdls)?);
    }

    for warning in &report.warnings {
        warn!("{}", warning);
    }

    match &args.output {
        Some(path) => {
            save_report(&report, path)?;
            info!("report written to {}", path.display());
            Ok(())
        }
        None => print_json(&report),
    }
}

fn margin_only(args: MarginArgs) -> KtResult<()> {
    let factors = CorrectionFactors {
        fsg: args.fsg,
        fg: args.fg,
        ft: args.ft,
        fsf: args.fsf,
        fsc: args.fsc,
    };
    let location = StressLocation {
        surface: Surface::MidPlane,
        angle_deg: 0.0,
    };
    let kts = KtsResult {
        configuration: Configuration::Print,
        condition: HoleCondition::Loaded,
        hole: 0,
        kts: args.kts,
        location,
        location_label: location.label(),
        kc_kt: args.kc_kt,
        gradient_ratio: None,
        solution_error_pct: 0.0,
        valid: true,
        per_hole: Vec::new(),
        warnings: Vec::new(),
    };
    print_json(&margin(&kts, &factors, &ktdls_table(&args.ktdls)?)?)
}

fn execute(command: Commands) -> KtResult<()> {
    match command {
        Commands::Classify { coupon } => {
            let coupon = load_coupon(&coupon)?;
            print_json(&classify_coupon(&coupon)?)
        }
        Commands::Plan {
            coupon,
            repair,
            settings,
        } => {
            let coupon = load_coupon(&coupon)?;
            let settings = load_settings(settings.as_deref())?;
            let configuration = if repair { Configuration::Repair } else { Configuration::Print };
            let symmetry = classify_coupon(&coupon)?;
            print_json(&plan_with_settings(&coupon, symmetry, configuration, &settings)?)
        }
        Commands::Run(args) => run(args),
        Commands::Margin(args) => margin_only(args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.error_code(), e);
            if let Ok(json) = serde_json::to_string_pretty(&e) {
                eprintln!("{}", json);
            }
            ExitCode::FAILURE
        }
    }
}
