use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::render::OfflineInputs;
use commands::ProjectionInput;
use config::Config;

#[derive(Parser)]
#[command(name = "seqatlas")]
#[command(about = "SeqAtlas - place a DNA sequence among its most similar reference sequences")]
#[command(version)]
#[command(long_about = "
SeqAtlas reconciles similarity search results with a reference coordinate set
and renders three coordinated views: an embedding scatter, a per-country map
and a geo map with a collection-year time-lapse.

Examples:
  seqatlas run --fasta query.fa --out results/
  seqatlas render --reference umap.ndjson --similar similar.json --x 0.4 --y 1.2 --out results/
  seqatlas timelapse --reference umap.ndjson --similar similar.json --projection umap.json --out frames/
  seqatlas inspect --reference umap.ndjson
  seqatlas config > seqatlas.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Saved inputs for offline commands
#[derive(clap::Args, Debug)]
pub struct OfflineArgs {
    /// Reference coordinates (NDJSON, one record per line)
    #[arg(long, required = true)]
    pub reference: PathBuf,

    /// Ranked similarity results (JSON array or {results: [...]})
    #[arg(long, required = true)]
    pub similar: PathBuf,

    /// Projection of the user's sequence (JSON {x, y} or {coordinates: [x, y]})
    #[arg(long)]
    pub projection: Option<PathBuf>,

    /// Projection x coordinate (with --y instead of --projection)
    #[arg(long, allow_hyphen_values = true)]
    pub x: Option<f64>,

    /// Projection y coordinate
    #[arg(long, allow_hyphen_values = true)]
    pub y: Option<f64>,

    /// Job identifier recorded on the user's point
    #[arg(long, default_value = "local")]
    pub job_id: String,

    /// Label shown for the user's sequence
    #[arg(long)]
    pub label: Option<String>,
}

impl OfflineArgs {
    fn into_inputs(self) -> Result<OfflineInputs> {
        Ok(OfflineInputs {
            projection: ProjectionInput::from_args(self.projection, self.x, self.y)?,
            reference: self.reference,
            similar: self.similar,
            job_id: self.job_id,
            label: self.label,
        })
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a FASTA sequence, wait for the job and export every view
    Run {
        /// Query sequence (FASTA)
        #[arg(long, required = true)]
        fasta: PathBuf,

        /// Output directory
        #[arg(short, long, required = true)]
        out: PathBuf,

        /// Embedding model (overrides config)
        #[arg(long)]
        model: Option<String>,

        /// Local reference NDJSON instead of the service's bulk endpoint
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Title drawn above each view
        #[arg(long)]
        title: Option<String>,

        /// Width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Height in pixels
        #[arg(long)]
        height: Option<u32>,
    },

    /// Reconcile saved results offline and export every view
    Render {
        #[command(flatten)]
        inputs: OfflineArgs,

        /// Output directory
        #[arg(short, long, required = true)]
        out: PathBuf,

        /// Title drawn above each view
        #[arg(long)]
        title: Option<String>,

        /// Width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Emphasise samples collected in this year on the geo map
        #[arg(long)]
        year: Option<i32>,

        /// Fade geo map points below this similarity (percent)
        #[arg(long)]
        min_similarity: Option<f64>,
    },

    /// Export one geo map frame per collection year
    Timelapse {
        #[command(flatten)]
        inputs: OfflineArgs,

        /// Output directory for geo_map_<year>.svg frames
        #[arg(short, long, required = true)]
        out: PathBuf,

        /// First year (defaults to the earliest year in the results)
        #[arg(long)]
        from: Option<i32>,

        /// Last year (defaults to the latest year in the results)
        #[arg(long)]
        to: Option<i32>,

        /// Fade points below this similarity (percent)
        #[arg(long)]
        min_similarity: Option<f64>,

        /// Width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Height in pixels
        #[arg(long)]
        height: Option<u32>,
    },

    /// Load the reference set and print a summary as JSON
    Inspect {
        /// Local reference NDJSON (defaults to the service's bulk endpoint)
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Number of records to include in the sample
        #[arg(long, default_value = "5")]
        sample: usize,
    },

    /// Print an example configuration file
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            fasta,
            out,
            model,
            reference,
            title,
            width,
            height,
        } => {
            commands::run::execute(&config, fasta, out, model, reference, title, width, height).await?;
        }

        Commands::Render {
            inputs,
            out,
            title,
            width,
            height,
            year,
            min_similarity,
        } => {
            commands::render::execute(
                &config,
                inputs.into_inputs()?,
                out,
                title,
                width,
                height,
                year,
                min_similarity,
            )
            .await?;
        }

        Commands::Timelapse {
            inputs,
            out,
            from,
            to,
            min_similarity,
            width,
            height,
        } => {
            commands::timelapse::execute(
                &config,
                inputs.into_inputs()?,
                out,
                from,
                to,
                min_similarity,
                width,
                height,
            )
            .await?;
        }

        Commands::Inspect { reference, sample } => {
            commands::inspect::execute(&config, reference, sample).await?;
        }

        Commands::Config { output } => match output {
            Some(path) => {
                config.save_to_file(&path)?;
                log::info!("Configuration written to {}", path.display());
            }
            None => print!("{}", Config::example_toml()?),
        },
    }

    Ok(())
}
