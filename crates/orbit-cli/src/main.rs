use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use orbit_activities::buildcoord::select_evictions;
use orbit_activities::cms::collections;
use orbit_activities::config::LayerConfig;
use orbit_activities::context::{ActivityContext, ConsoleReporter};
use orbit_activities::query::QueryBuilder;
use orbit_activities::types::RegistryImage;
use orbit_activities::{ACTIVITY_NAMES, dispatch};

#[derive(Parser, Debug)]
#[command(name = "orbit-cli", version)]
#[command(about = "Run Orbit platform activities against a configured environment")]
struct Cli {
    /// Directory containing .orbit.toml (defaults to the working directory)
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single activity from a JSON input file
    Run {
        /// Activity name (see `orbit-cli list`)
        activity: String,

        /// Path to the JSON input ("-" reads stdin)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Inline JSON input (alternative to --input)
        #[arg(long)]
        input_json: Option<String>,

        /// Deadline for the invocation (e.g. 30s, 5m); defaults to the
        /// configured activity timeout
        #[arg(long)]
        timeout: Option<String>,

        /// Workflow id recorded in logs and the audit trail
        #[arg(long, default_value = "cli")]
        workflow_id: String,
    },

    /// List registered activities
    List,

    /// Configuration inspection
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },

    /// Registry quota tooling
    Quota {
        #[command(subcommand)]
        cmd: QuotaCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the merged configuration with secrets redacted
    Check,
}

#[derive(Subcommand, Debug)]
enum QuotaCommands {
    /// Show which images the build service would evict for a workspace
    Plan {
        /// Workspace id
        #[arg(long)]
        workspace: String,

        /// Size of the incoming image in bytes
        #[arg(long, default_value_t = 0)]
        incoming_bytes: i64,

        /// Workspace quota in bytes
        #[arg(long)]
        quota_bytes: i64,

        /// Fraction of quota to evict down to
        #[arg(long, default_value_t = 0.8)]
        threshold: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Run {
            activity,
            input,
            input_json,
            timeout,
            workflow_id,
        } => run_activity(&cli.config_dir, &activity, input, input_json, timeout, &workflow_id),
        Commands::List => {
            for name in ACTIVITY_NAMES {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Check => {
                let config = LayerConfig::load(&cli.config_dir)?;
                let rendered = toml::to_string_pretty(&config.redacted())
                    .context("rendering configuration")?;
                print!("{rendered}");
                Ok(())
            }
        },
        Commands::Quota { cmd } => match cmd {
            QuotaCommands::Plan {
                workspace,
                incoming_bytes,
                quota_bytes,
                threshold,
            } => quota_plan(&cli.config_dir, &workspace, incoming_bytes, quota_bytes, threshold),
        },
    }
}

fn run_activity(
    config_dir: &PathBuf,
    activity: &str,
    input: Option<PathBuf>,
    input_json: Option<String>,
    timeout: Option<String>,
    workflow_id: &str,
) -> Result<()> {
    if !ACTIVITY_NAMES.contains(&activity) {
        bail!("unknown activity {activity}; see `orbit-cli list`");
    }

    let raw = match (input, input_json) {
        (Some(path), None) if path.as_os_str() == "-" => {
            use std::io::Read;
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("reading stdin")?;
            buffer
        }
        (Some(path), None) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        (None, Some(inline)) => inline,
        (None, None) => "{}".to_string(),
        (Some(_), Some(_)) => bail!("pass either --input or --input-json, not both"),
    };
    let input_value: serde_json::Value =
        serde_json::from_str(&raw).context("parsing input JSON")?;

    let config = LayerConfig::load(config_dir)?;
    let deps = config.build_dependencies()?;

    let deadline = match timeout {
        Some(spec) => {
            let duration = humantime::parse_duration(&spec)
                .with_context(|| format!("parsing timeout {spec}"))?;
            Instant::now() + duration
        }
        None => Instant::now() + config.timeouts.activity,
    };
    let ctx = ActivityContext::new(
        activity,
        workflow_id,
        Some(deadline),
        Arc::new(ConsoleReporter),
    );

    let output = dispatch(&ctx, &deps, activity, input_value)
        .map_err(|err| anyhow::anyhow!("{activity}: {err}"))?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn quota_plan(
    config_dir: &PathBuf,
    workspace: &str,
    incoming_bytes: i64,
    quota_bytes: i64,
    threshold: f64,
) -> Result<()> {
    if quota_bytes <= 0 {
        bail!("--quota-bytes must be positive");
    }

    let config = LayerConfig::load(config_dir)?;
    let deps = config.build_dependencies()?;
    let ctx = ActivityContext::new(
        "quota-plan",
        "cli",
        Some(Instant::now() + Duration::from_secs(30)),
        Arc::new(ConsoleReporter),
    );

    let found = deps.cms.find(
        &ctx,
        collections::REGISTRY_IMAGES,
        &QueryBuilder::new()
            .where_equals("workspace", workspace)
            .limit(1000)
            .sort("createdAt"),
    )?;
    let images: Vec<RegistryImage> = found.docs.iter().map(RegistryImage::from_doc).collect();
    let current_usage: i64 = images.iter().map(|image| image.size_bytes).sum();

    let evictions = select_evictions(&images, current_usage, incoming_bytes, quota_bytes, threshold);
    println!(
        "workspace {workspace}: {} images, {current_usage} bytes used, quota {quota_bytes}",
        images.len()
    );
    if evictions.is_empty() {
        println!("within quota; nothing to evict");
        return Ok(());
    }
    println!("would evict {} images:", evictions.len());
    for image in evictions {
        println!(
            "  {}:{} ({} bytes, created {})",
            image.repository,
            image.tag,
            image.size_bytes,
            image
                .created_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string())
        );
    }
    Ok(())
}
