use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ffragrance_schemas::{
    chemical::{PyramidNote, QuantityUnit},
    color::Rgba,
    formula::Diluent,
};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;
mod config;
mod plotting;
mod report;

#[derive(Parser, Debug)]
#[command(name = "ffragrance", version, about = "Perfumer's inventory and formula composition toolkit")]
struct Cli {
    /// YAML library file; created on the first change if missing.
    #[arg(short, long, global = true, default_value = "ffragrance.yaml")]
    library: PathBuf,
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the chemical inventory.
    Inventory {
        /// Filter on name, CAS number, category or tag.
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = SortOrder::Pyramid)]
        sort: SortOrder,
    },
    #[command(subcommand)]
    Category(CategoryCommand),
    #[command(subcommand)]
    Tag(TagCommand),
    #[command(subcommand)]
    Chemical(ChemicalCommand),
    #[command(subcommand)]
    Formula(FormulaCommand),
    /// Write the whole library as a sectioned CSV file.
    Export {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Merge a sectioned CSV file into the library.
    Import { path: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    Add {
        name: String,
        #[arg(long)]
        color: Option<Rgba>,
    },
    List,
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    Add {
        name: String,
        #[arg(long)]
        color: Option<Rgba>,
    },
    List,
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
pub enum ChemicalCommand {
    Add(ChemicalArgs),
    Show { name: String },
    /// Link a tag to a chemical.
    Tag { name: String, tag: String },
    Untag { name: String, tag: String },
    Delete { name: String },
}

#[derive(clap::Args, Debug)]
pub struct ChemicalArgs {
    name: String,
    #[arg(long)]
    cas: Option<String>,
    /// Maximum share of a finished formula, in percent.
    #[arg(long)]
    ifra_limit: Option<f64>,
    #[arg(long, default_value_t = PyramidNote::Top)]
    note: PyramidNote,
    #[arg(long, default_value_t = QuantityUnit::Grams)]
    unit: QuantityUnit,
    #[arg(long)]
    grams: Option<f64>,
    #[arg(long)]
    ml: Option<f64>,
    /// Strength of the stock solution, in percent.
    #[arg(long)]
    dilution: Option<f64>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long)]
    notes: Option<String>,
    /// Structure drawing to store alongside the record.
    #[arg(long)]
    image: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum FormulaCommand {
    New {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        diluent: Option<DiluentArg>,
        #[arg(long, default_value_t = 0.0)]
        diluent_weight: f64,
    },
    List,
    Show {
        name: String,
        /// Print the computed summary as JSON.
        #[arg(long)]
        json: bool,
    },
    AddLine {
        formula: String,
        chemical: String,
        #[arg(long)]
        grams: f64,
        /// Defaults to the chemical's stock dilution, or 100.
        #[arg(long)]
        dilution: Option<f64>,
    },
    EditLine {
        formula: String,
        line_id: Uuid,
        #[arg(long)]
        grams: f64,
        #[arg(long)]
        dilution: Option<f64>,
    },
    RemoveLine { formula: String, line_id: Uuid },
    SetDiluent {
        formula: String,
        #[arg(long, value_enum)]
        diluent: Option<DiluentArg>,
        #[arg(long)]
        weight: f64,
    },
    /// Rescale every amount so the formula weighs TARGET_GRAMS.
    Scale { formula: String, target_grams: f64 },
    /// Render the category breakdown as a PNG bar chart.
    Chart {
        formula: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    Delete { name: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Name,
    Pyramid,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiluentArg {
    Alcohol,
    Dpg,
    None,
}

impl DiluentArg {
    fn into_diluent(self) -> Option<Diluent> {
        match self {
            DiluentArg::Alcohol => Some(Diluent::PerfumersAlcohol),
            DiluentArg::Dpg => Some(Diluent::Dpg),
            DiluentArg::None => None,
        }
    }
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_deref()
        .unwrap_or("info")
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let mut library = config::load_library(&cli.library)?;
    if commands::run(cli.command, &mut library)? == commands::Outcome::Changed {
        config::save_library(&cli.library, &library)?;
    }
    Ok(())
}
