use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use cache::TicketCache;
use config::Config;
use jira::{DEFAULT_SEARCH_LIMIT, IssueTracker, JiraClient};

mod cache;
mod config;
mod hours;
mod jira;
mod logging;
mod normalize;
mod pipeline;
mod report;
mod reqwest_simd_json;
mod sprint_stats;
mod track;
mod types;
mod utils;

#[derive(Parser)]
#[command(name = "storytrail")]
#[command(version)]
#[command(about = "Jira story history tracker")]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List Jira fields that look like story points, sprint or acceptance criteria
    Fields,
    /// Start tracking new tickets assigned to me
    Track,
    /// Show story details as markdown
    Show {
        /// Ticket key to show
        ticket: String,
    },
    /// Track spent hours on tickets
    Hours(HoursArgs),
    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct HoursArgs {
    /// Ticket key or account (defaults to the common label)
    ticket: Option<String>,

    /// Hours to add for today
    #[arg(short, long)]
    add: Option<f64>,

    /// Print the weekly log
    #[arg(short, long, default_value_t = false)]
    log: bool,

    /// Print the weekly log in short format
    #[arg(short, long, default_value_t = false)]
    short: bool,

    /// Print total hours spent on the ticket
    #[arg(short, long, default_value_t = false)]
    total: bool,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    subcommand: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Create default configuration file
    Init {
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Show current configuration
    Show,
    /// Set configuration value
    Set {
        /// Configuration key (url, token, story-points-field, sprint-field,
        /// acceptance-criteria-field, common-label, closed-statuses)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        None => {
            if let Err(e) = run_report().await {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
        Some(Commands::Fields) => {
            if let Err(e) = run_fields().await {
                eprintln!("Error listing fields: {e:#}");
                std::process::exit(1);
            }
        }
        Some(Commands::Track) => {
            if let Err(e) = run_track().await {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
        Some(Commands::Show { ticket }) => {
            if let Err(e) = run_show(&ticket).await {
                eprintln!("Error fetching story {ticket}: {e:#}");
                std::process::exit(1);
            }
        }
        Some(Commands::Hours(args)) => {
            if let Err(e) = run_hours(args) {
                eprintln!("Error tracking hours: {e:#}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config(config_args)) => {
            handle_config_subcommand(config_args);
        }
    }
}

async fn run_report() -> Result<()> {
    let config = Config::load_required()?;
    config.validate_full()?;

    if config.tickets.is_empty() {
        println!("No tickets found in {}", Config::config_path()?.display());
        return Ok(());
    }

    let cache = TicketCache::default_location()?;
    let tracker = JiraClient::from_config(&config)?;

    let tickets = pipeline::refresh_tracked(&tracker, &cache, &config).await?;
    let authored = pipeline::fetch_authored(
        &tracker,
        &cache,
        &tickets,
        &config.jira.fields,
        DEFAULT_SEARCH_LIMIT,
    )
    .await;

    let closed = &config.jira.closed_statuses;
    let open: Vec<_> = tickets
        .iter()
        .filter(|t| !t.is_closed(closed))
        .cloned()
        .collect();

    if let Some(block) = report::render_tickets("--- Open Tickets ---", &open, &config.jira.url) {
        println!("\n{block}");
    }
    if let Some(block) = report::render_tickets(
        "--- Tickets Authored by Me (Open) ---",
        &authored,
        &config.jira.url,
    ) {
        println!("\n{block}");
    }

    let stats = sprint_stats::aggregate(&tickets, closed);
    println!("\n{}", report::render_sprint_stats(&stats));
    Ok(())
}

async fn run_fields() -> Result<()> {
    let config = Config::load_required()?;
    config.validate_base()?;
    let tracker = JiraClient::from_config(&config)?;

    let fields = tracker.fields().await?;
    print!("{}", report::render_field_candidates(&fields));
    Ok(())
}

async fn run_track() -> Result<()> {
    let mut config = Config::load_required()?;
    config.validate_full()?;
    let cache = TicketCache::default_location()?;
    let tracker = JiraClient::from_config(&config)?;

    track::run_track(&tracker, &cache, &mut config).await
}

async fn run_show(key: &str) -> Result<()> {
    let config = Config::load_required()?;
    config.validate_base()?;
    let cache = TicketCache::default_location()?;
    let tracker = JiraClient::from_config(&config)?;

    let issue = tracker.issue(key).await?;
    let ticket = normalize::normalize_issue(&issue, &config.jira.fields)?;
    cache.save(&ticket)?;

    print!("{}", report::render_story(&ticket));
    Ok(())
}

fn run_hours(args: HoursArgs) -> Result<()> {
    let config = Config::load()?.unwrap_or_default();
    let cache = TicketCache::default_location()?;
    let path = hours::hours_path()?;
    let today = chrono::Local::now().date_naive();

    let request = hours::HoursRequest {
        ticket: args.ticket,
        add: args.add,
        log: args.log,
        short: args.short,
        total: args.total,
    };
    let output = hours::run(
        &request,
        &path,
        &config.common_label,
        today,
        &|key: &str| cache.load(key),
    )
    .context("Failed to update hours ledger")?;

    println!("{output}");
    Ok(())
}

fn handle_config_subcommand(config_args: ConfigArgs) {
    match config_args.subcommand {
        ConfigSubcommands::Init { overwrite } => {
            if let Err(e) = config::create_default_config(overwrite) {
                eprintln!("Error creating config: {e:#}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Show => {
            if let Err(e) = config::show_config() {
                eprintln!("Error showing config: {e:#}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Set { key, value } => {
            if let Err(e) = config::set_config_value(&key, &value) {
                eprintln!("Error setting config: {e:#}");
                std::process::exit(1);
            }
        }
    }
}
