//! tagctl - manage a single tag on a cloud resource.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tag_binding::config::parse_timeout;
use tag_binding::{
    HttpTagStore, Presence, StoreConfig, TagBinding, TagController, TagRecord, Visibility,
};

/// tagctl - attach, verify and remove one tag on a cloud resource.
///
/// API settings come from `TAG_API_URL`, `TAG_API_TOKEN` and
/// `TAG_MUTATION_TIMEOUT_SECS`; the flags below override them.
#[derive(Parser)]
#[command(name = "tagctl")]
#[command(about = "Manage a single key/value tag on a cloud resource")]
struct Cli {
    /// Tagging API URL (overrides `TAG_API_URL`).
    #[arg(long)]
    api_url: Option<String>,

    /// Tagging API bearer token (overrides `TAG_API_TOKEN`).
    #[arg(long)]
    api_token: Option<String>,

    /// Deadline for create/delete in seconds, 0 for none
    /// (overrides `TAG_MUTATION_TIMEOUT_SECS`).
    #[arg(long)]
    mutation_timeout_secs: Option<String>,

    /// Directory holding tag records.
    #[arg(long, env = "TAG_STATE_DIR", default_value = ".tag-state")]
    state_dir: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, default_value = "false")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach the tag and record it.
    Create(BindingArgs),

    /// Check the tag still exists; forget it if it doesn't.
    Read(BindingArgs),

    /// Remove the tag and its record.
    Delete(BindingArgs),

    /// Print the identity of a tag without contacting the API.
    Id(BindingArgs),
}

#[derive(Args)]
struct BindingArgs {
    /// Resource carrying the tag (e.g. i-0abc123).
    #[arg(long)]
    resource_id: String,

    /// Tag key.
    #[arg(long)]
    key: String,

    /// Tag value.
    #[arg(long, default_value = "")]
    value: String,
}

impl BindingArgs {
    fn binding(&self) -> Result<TagBinding> {
        Ok(TagBinding::new(&self.resource_id, &self.key, &self.value)?)
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Apply command-line overrides on top of `config`.
fn store_config(cli: &Cli, mut config: StoreConfig) -> Result<StoreConfig> {
    if let Some(url) = &cli.api_url {
        config.api_url = Some(url.clone());
    }
    if let Some(token) = &cli.api_token {
        config.api_token = Some(token.clone());
    }
    if let Some(raw) = &cli.mutation_timeout_secs {
        config.mutation_timeout = parse_timeout("--mutation-timeout-secs", raw)?;
    }
    Ok(config)
}

fn controller(config: &StoreConfig) -> Result<TagController<HttpTagStore>> {
    if config.api_url.is_none() {
        bail!("No tagging API URL: pass --api-url or set TAG_API_URL");
    }

    let store = HttpTagStore::from_config(config).context("Failed to create tag store")?;
    Ok(TagController::with_config(store, config.controller()))
}

fn connect(cli: &Cli) -> Result<TagController<HttpTagStore>> {
    let env = StoreConfig::from_env().context("Invalid tag store environment")?;
    controller(&store_config(cli, env)?)
}

fn load_or_absent(state_dir: &Path, binding: TagBinding) -> Result<TagRecord> {
    Ok(TagRecord::load(state_dir, &binding)?.unwrap_or_else(|| TagRecord::absent(binding)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    if !matches!(cli.command, Commands::Id(_)) {
        info!(state_dir = %cli.state_dir.display(), "Using state directory");
    }

    match &cli.command {
        Commands::Id(args) => {
            let binding = args.binding()?;
            println!("{}", binding.id());
        }

        Commands::Create(args) => {
            let binding = args.binding()?;
            let controller = connect(&cli)?;

            let created = controller.create(&binding).await?;
            created.record.save(&cli.state_dir)?;

            let id = binding.id();
            match created.visibility {
                Visibility::Confirmed => println!("✅ Tag created: {id}"),
                Visibility::Pending => {
                    println!("⚠️  Tag created, not yet visible: {id}");
                }
            }
        }

        Commands::Read(args) => {
            let binding = args.binding()?;
            let controller = connect(&cli)?;

            let mut record = load_or_absent(&cli.state_dir, binding)?;
            let presence = controller.refresh(&mut record).await?;
            record.save(&cli.state_dir)?;

            match presence {
                Presence::Present => println!("present {}", record.binding.id()),
                Presence::Absent => println!("absent"),
            }
        }

        Commands::Delete(args) => {
            let binding = args.binding()?;
            let controller = connect(&cli)?;

            let mut record = load_or_absent(&cli.state_dir, binding)?;
            controller.delete(&mut record).await?;
            record.save(&cli.state_dir)?;

            println!("✅ Tag removed: {}", record.binding);
        }
    }

    Ok(())
}
