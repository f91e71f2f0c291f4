use anyhow::Result;
use clap::Parser;
use salesbook::{Config, ProductGroup};

use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "salesbook")]
#[command(about = "Turns a sales dataset into a spreadsheet report with live formulas and charts")]
#[command(version)]
struct Cli {
    /// Sales data to read (CSV or Excel)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Workbook to write
    #[arg(short, long, default_value = "sales_analysis.xlsx")]
    output: PathBuf,

    /// Worksheet to read when INPUT is a spreadsheet (default: the first)
    #[arg(long)]
    sheet: Option<String>,

    /// TOML file of report options
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// File of product groups, one `GROUP_NAME | GROUP_REGEX` per line
    #[arg(long, value_name = "FILE")]
    groups: Option<PathBuf>,

    /// A single product group, `GROUP_NAME | GROUP_REGEX` (repeatable)
    #[arg(long = "group", value_name = "GROUP")]
    group: Vec<ProductGroup>,

    /// Currency symbol for amounts
    #[arg(long, value_name = "SYM")]
    currency: Option<String>,

    /// Number of top products to report
    #[arg(long, value_name = "N")]
    top: Option<usize>,

    /// Number of top categories to chart
    #[arg(long, value_name = "N")]
    top_categories: Option<usize>,

    /// Manager whose row to highlight
    #[arg(long, value_name = "MANAGER")]
    highlight: Option<String>,

    /// Don't print the summary table
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Layers the command-line options over the config file, if any.
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(path) = &self.groups {
            config.read_groups(path)?;
        }
        for group in &self.group {
            config.add_group(group.clone());
        }
        if let Some(currency) = &self.currency {
            config.currency.clone_from(currency);
        }
        if let Some(n) = self.top {
            config.top_products = n;
        }
        if let Some(n) = self.top_categories {
            config.top_categories = n;
        }
        if self.highlight.is_some() {
            config.highlight_manager.clone_from(&self.highlight);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = cli.config()?;
    let report = salesbook::build_report(&cli.input, cli.sheet.as_deref(), &cli.output, &config)?;
    if !cli.quiet {
        print!("{report}");
    }
    println!("Created '{}'.", cli.output.display());
    Ok(())
}
