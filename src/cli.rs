use crate::pipeline::CallMode;
use crate::utils::Result;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| env!("CARGO_PKG_VERSION").to_string());

#[derive(Parser)]
#[command(name="parhap",
          version=&**FULL_VERSION,
          about="Parental haplotype caller and genotype imputer for biparental populations",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Impute parental origin for one biparental family")]
    Impute(ImputeArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("impute")))]
#[command(arg_required_else_help(true))]
pub struct ImputeArgs {
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(help = "Tab-separated marker matrix (marker, chrom, pos, one column per taxon), optionally gzipped")]
    #[clap(value_name = "MARKERS")]
    #[arg(value_parser = check_file_exists)]
    pub input: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(help = "Path of the rewritten marker matrix (gzipped when it ends in .gz)")]
    #[clap(value_name = "OUTPUT")]
    #[arg(value_parser = check_prefix_path)]
    pub output: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'a')]
    #[clap(long = "parent-a")]
    #[clap(help = "Taxon name of the first founder")]
    #[clap(value_name = "PARENT_A")]
    #[arg(value_parser = check_name_nonempty)]
    pub parent_a: String,

    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "parent-c")]
    #[clap(help = "Taxon name of the second founder")]
    #[clap(value_name = "PARENT_C")]
    #[arg(value_parser = check_name_nonempty)]
    pub parent_c: String,

    #[clap(long = "family")]
    #[clap(help = "Family name used in logs")]
    #[clap(value_name = "FAMILY")]
    #[clap(default_value = "family1")]
    #[arg(value_parser = check_name_nonempty)]
    pub family: String,

    #[clap(short = 'm')]
    #[clap(long = "mode")]
    #[clap(value_name = "MODE")]
    #[clap(help = "Calling strategy (window or chrom)")]
    #[clap(default_value = "window")]
    pub mode: CallMode,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads (chromosomes are processed in parallel)")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "window-size")]
    #[clap(value_name = "WINDOW_SIZE")]
    #[clap(help = "Polymorphic sites per calling window (both modes)")]
    #[clap(default_value = "100")]
    pub window_size: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "core-trials")]
    #[clap(value_name = "TRIALS")]
    #[clap(help = "Candidate windows tried during core-SNP discovery")]
    #[clap(default_value = "5")]
    pub core_trials: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "cut-height")]
    #[clap(value_name = "HEIGHT")]
    #[clap(help = "Dendrogram cut height for core-SNP clusters")]
    #[clap(default_value = "0.3")]
    #[arg(value_parser = ensure_unit_float)]
    pub cut_height: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-linkage")]
    #[clap(value_name = "MIN_R")]
    #[clap(help = "Minimum |r| for extending founder calls along the chromosome")]
    #[clap(default_value = "0.5")]
    #[arg(value_parser = ensure_unit_float)]
    pub min_linkage: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "extension-window")]
    #[clap(value_name = "SITES")]
    #[clap(help = "Already-called sites each extension candidate is tested against")]
    #[clap(default_value = "25")]
    pub extension_window: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-minor-count")]
    #[clap(value_name = "COUNT")]
    #[clap(help = "Minimum minor-allele gamete count for a polymorphic site")]
    #[clap(default_value = "10")]
    pub min_minor_count: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-maf")]
    #[clap(value_name = "FREQ")]
    #[clap(help = "Minimum minor-allele frequency for a polymorphic site")]
    #[clap(default_value = "0.05")]
    #[arg(value_parser = ensure_unit_float)]
    pub min_maf: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "max-missing")]
    #[clap(value_name = "FRAC")]
    #[clap(help = "Maximum fraction of missing calls for a polymorphic site")]
    #[clap(default_value = "0.9")]
    #[arg(value_parser = ensure_unit_float)]
    pub max_missing: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "het-prob")]
    #[clap(value_name = "PROB")]
    #[clap(help = "Prior probability of a heterozygous state")]
    #[clap(default_value = "0.07")]
    #[arg(value_parser = ensure_unit_float)]
    pub het_prob: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-minor-group")]
    #[clap(value_name = "TAXA")]
    #[clap(help = "Minimum size of the second founder group during taxa clustering")]
    #[clap(default_value = "10")]
    pub min_minor_group: usize,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(path.to_path_buf())
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn check_name_nonempty(s: &str) -> Result<String> {
    if s.trim().is_empty() {
        Err("Name cannot be an empty string".to_string())
    } else {
        Ok(s.to_string())
    }
}

fn ensure_unit_float(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "The value must be between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}
