mod config;
mod plan_cmds;
mod recover_cmd;
mod speech_cmds;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use itinera_core::planner::{Planner, TripRequest};
use itinera_core::recovery::TargetShape;
use itinera_core::upstream::DashScopeBackend;

#[derive(Parser)]
#[command(name = "itinera", about = "Travel itinerary planner backed by a generative model")]
struct Cli {
    /// DashScope API key (overrides ITINERA_DASHSCOPE_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Generation model (overrides ITINERA_DASHSCOPE_MODEL env var)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write an itinera config file
    Init {
        /// Speech service app key
        #[arg(long)]
        asr_app_key: Option<String>,
        /// Speech service access key ID
        #[arg(long)]
        asr_access_key_id: Option<String>,
        /// Speech service access key secret
        #[arg(long)]
        asr_access_key_secret: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Recover a typed document from saved model output (no network)
    Recover {
        /// Target shape: itinerary, itinerary_patch, or voice_intent
        shape: TargetShape,
        /// File holding the raw model text (reads stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Generate an itinerary
    Plan {
        /// Destination city or region
        destination: String,
        /// Trip length in days
        #[arg(long)]
        days: u32,
        /// Total budget in CNY
        #[arg(long)]
        budget: f64,
        /// Number of travelers
        #[arg(long, default_value_t = 1)]
        travelers: u32,
        /// Free-text preferences, e.g. "food, museums"
        #[arg(long)]
        preferences: Option<String>,
        /// First day of the trip (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Write the itinerary here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Regenerate a saved itinerary with feedback applied
    Revise {
        /// Saved itinerary JSON
        prior: PathBuf,
        /// What to change
        feedback: String,
        /// Write the revised itinerary here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Classify a transcribed utterance as a travel plan, expense, or query
    VoiceParse {
        /// The utterance
        text: String,
        /// Resolve relative dates against this day instead of today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Transcribe an audio file with the speech service
    Transcribe {
        /// Audio file (16 kHz)
        audio: PathBuf,
        /// Audio format (defaults to the file extension)
        #[arg(long)]
        format: Option<String>,
        /// Also classify the transcript as a voice query
        #[arg(long)]
        parse: bool,
    },
    /// Acquire a speech service token and show its expiry
    Token {
        /// Print the full token instead of a masked one
        #[arg(long)]
        show: bool,
    },
    /// Ask for budget advice on a trip's spending
    Advise {
        /// Short description of the trip
        #[arg(long)]
        plan_info: String,
        /// Amount spent so far in CNY
        #[arg(long)]
        spent: f64,
        /// Total budget in CNY
        #[arg(long)]
        budget: f64,
    },
}

/// Execute the `itinera init` command: write the config file.
fn cmd_init(
    api_key: Option<&str>,
    model: Option<&str>,
    asr_app_key: Option<&str>,
    asr_access_key_id: Option<&str>,
    asr_access_key_secret: Option<&str>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let owned = |v: Option<&str>| v.unwrap_or_default().trim().to_string();
    let cfg = config::ConfigFile {
        dashscope: config::DashScopeSection {
            api_key: owned(api_key),
            model: owned(model),
        },
        asr: config::AsrSection {
            app_key: owned(asr_app_key),
            access_key_id: owned(asr_access_key_id),
            access_key_secret: owned(asr_access_key_secret),
        },
    };

    config::save_config(&cfg)?;

    let shown = |v: &str| {
        if v.is_empty() {
            "(unset)".to_string()
        } else {
            config::mask(v)
        }
    };
    println!("Config written to {}", path.display());
    println!("  dashscope.api_key = {}", shown(&cfg.dashscope.api_key));
    println!("  asr.app_key = {}", shown(&cfg.asr.app_key));
    println!("  asr.access_key_id = {}", shown(&cfg.asr.access_key_id));
    println!(
        "  asr.access_key_secret = {}",
        shown(&cfg.asr.access_key_secret)
    );
    println!();
    println!("Unset values can also come from ITINERA_* environment variables.");

    Ok(())
}

fn build_planner(
    cli_api_key: Option<&str>,
    cli_model: Option<&str>,
) -> anyhow::Result<Planner<DashScopeBackend>> {
    let dashscope = config::resolve_dashscope(cli_api_key, cli_model)?;
    let backend = DashScopeBackend::new(dashscope).context("failed to build DashScope client")?;
    Ok(Planner::new(backend))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api_key = cli.api_key.as_deref();
    let model = cli.model.as_deref();

    match cli.command {
        Commands::Init {
            asr_app_key,
            asr_access_key_id,
            asr_access_key_secret,
            force,
        } => {
            cmd_init(
                api_key,
                model,
                asr_app_key.as_deref(),
                asr_access_key_id.as_deref(),
                asr_access_key_secret.as_deref(),
                force,
            )?;
        }
        Commands::Recover { shape, file } => {
            recover_cmd::run_recover(shape, file.as_deref())?;
        }
        Commands::Plan {
            destination,
            days,
            budget,
            travelers,
            preferences,
            start_date,
            output,
        } => {
            let request = TripRequest {
                destination,
                days,
                budget,
                travelers_count: travelers,
                preferences,
                start_date,
            };
            let planner = build_planner(api_key, model)?;
            plan_cmds::run_plan(&planner, &request, output.as_deref()).await?;
        }
        Commands::Revise {
            prior,
            feedback,
            output,
        } => {
            let planner = build_planner(api_key, model)?;
            plan_cmds::run_revise(&planner, &prior, &feedback, output.as_deref()).await?;
        }
        Commands::VoiceParse { text, today } => {
            let planner = build_planner(api_key, model)?;
            plan_cmds::run_voice_parse(&planner, &text, today).await?;
        }
        Commands::Transcribe {
            audio,
            format,
            parse,
        } => {
            let nls = config::resolve_nls()?;
            let planner = if parse {
                Some(build_planner(api_key, model)?)
            } else {
                None
            };
            speech_cmds::run_transcribe(&nls, &audio, format.as_deref(), planner.as_ref())
                .await?;
        }
        Commands::Token { show } => {
            let nls = config::resolve_nls()?;
            speech_cmds::run_token(&nls, show).await?;
        }
        Commands::Advise {
            plan_info,
            spent,
            budget,
        } => {
            let planner = build_planner(api_key, model)?;
            plan_cmds::run_advise(&planner, &plan_info, spent, budget).await?;
        }
    }

    Ok(())
}
