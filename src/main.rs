mod api;
mod config;
mod db;
mod logging;
mod models;
mod query;
mod validate;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::Config;
use db::{Database, Store};
use models::{JobApplication, JobInput, JobStatus};
use query::{JobQuery, ListParams, PageMeta};
use serde_json::json;

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Job application tracker - record, search and serve your applications")]
struct Cli {
    /// Path to a config file (default: config.toml in the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Run the REST API server
    Serve {
        /// Address to listen on (overrides config)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Record a new application
    Add {
        #[arg(long)]
        company: String,

        #[arg(long)]
        position: String,

        #[arg(long)]
        location: String,

        /// APPLIED, INTERVIEW, REJECTED or OFFER (default APPLIED)
        #[arg(short, long)]
        status: Option<String>,

        /// RFC 3339 timestamp or YYYY-MM-DD (default now)
        #[arg(long)]
        applied_date: Option<String>,

        /// Tag, may be repeated
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[arg(short, long)]
        notes: Option<String>,

        /// Link to the job posting
        #[arg(short, long)]
        url: Option<String>,
    },

    /// List applications
    List {
        /// Search company, position and tags
        #[arg(short, long)]
        query: Option<String>,

        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Sort key, e.g. appliedDate_desc, company_asc
        #[arg(long)]
        sort: Option<String>,

        #[arg(short, long, default_value = "1")]
        page: String,

        #[arg(short, long)]
        limit: Option<String>,
    },

    /// Show one application and its status history
    Show {
        /// Application ID
        id: i64,
    },

    /// Change the status of an application
    SetStatus {
        /// Application ID
        id: i64,

        /// APPLIED, INTERVIEW, REJECTED or OFFER
        status: String,
    },

    /// Delete an application and its history
    Delete {
        /// Application ID
        id: i64,
    },

    /// Show every recorded status change
    History,

    /// Summary counts
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let config = Config::load(cli.config.as_deref())?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());
    let mut db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!(
                "Database initialized at {} ({} applications)",
                db.path().display(),
                db.count_jobs()?
            );
        }

        Commands::Serve { bind } => {
            db.ensure_initialized()?;
            let at = bind.unwrap_or(config.bind);
            let ctx = api::ctx::Ctx {
                store: Store::new(db),
                limits: config.page_limits(),
            };
            tracing::info!(database = %db_path.display(), "starting server");
            let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
            runtime.block_on(api::serve(at, ctx))?;
        }

        Commands::Add {
            company,
            position,
            location,
            status,
            applied_date,
            tags,
            notes,
            url,
        } => {
            db.ensure_initialized()?;
            let payload = json!({
                "company": company,
                "position": position,
                "location": location,
                "status": status,
                "appliedDate": applied_date,
                "tags": tags,
                "notes": notes,
                "url": url,
            });
            let input = validate::validate_job(&payload, Utc::now())?;
            let job = db.create_job(&input)?;
            println!("Added application #{} ({} at {})", job.id, job.position, job.company);
        }

        Commands::List {
            query,
            status,
            sort,
            page,
            limit,
        } => {
            db.ensure_initialized()?;
            let params = ListParams {
                q: query,
                status,
                sort,
                page: Some(page),
                limit,
            };
            let query = JobQuery::parse(&params, config.page_limits())?;
            let (jobs, total) = db.list_jobs(&query)?;
            let meta = PageMeta::new(total, &query);
            if jobs.is_empty() {
                println!("No applications found.");
            } else {
                print_job_table(&jobs);
                println!(
                    "\nPage {} of {} ({} total)",
                    meta.page,
                    meta.pages.max(1),
                    meta.total
                );
            }
        }

        Commands::Show { id } => {
            db.ensure_initialized()?;
            match db.get_job(id)? {
                Some(job) => {
                    println!("Application #{}", job.id);
                    println!("Company: {}", job.company);
                    println!("Position: {}", job.position);
                    println!("Location: {}", job.location);
                    println!("Status: {}", job.status);
                    println!("Applied: {}", job.applied_date.format("%Y-%m-%d"));
                    if !job.tags.is_empty() {
                        println!("Tags: {}", job.tags.join(", "));
                    }
                    if let Some(url) = &job.url {
                        println!("URL: {}", url);
                    }
                    if let Some(notes) = &job.notes {
                        println!("\n--- Notes ---\n{}", notes);
                    }
                    let history = db.list_transitions_for_job(id)?;
                    if !history.is_empty() {
                        println!("\nStatus history:");
                        for t in history {
                            println!("  {}  {} -> {}", t.changed_at.format("%Y-%m-%d %H:%M"), t.from, t.to);
                        }
                    }
                }
                None => {
                    println!("Application #{} not found.", id);
                }
            }
        }

        Commands::SetStatus { id, status } => {
            db.ensure_initialized()?;
            let status: JobStatus = status
                .parse()
                .map_err(|e| anyhow!("Invalid status '{}': {}", status, e))?;
            let job = db
                .get_job(id)?
                .ok_or_else(|| anyhow!("Application #{} not found", id))?;
            let mut input = JobInput::from(job);
            input.status = status;
            match db.update_job(id, &input)? {
                Some((_, Some(t))) => println!("Application #{}: {} -> {}", id, t.from, t.to),
                Some((job, None)) => println!("Application #{} already {}.", id, job.status),
                None => println!("Application #{} not found.", id),
            }
        }

        Commands::Delete { id } => {
            db.ensure_initialized()?;
            if db.delete_job(id)? {
                println!("Deleted application #{}", id);
            } else {
                println!("Application #{} not found.", id);
            }
        }

        Commands::History => {
            db.ensure_initialized()?;
            let transitions = db.list_transitions()?;
            if transitions.is_empty() {
                println!("No status changes recorded.");
            } else {
                println!("{:<18} {:<6} {:<10} {:<10}", "WHEN", "JOB", "FROM", "TO");
                println!("{}", "-".repeat(46));
                for t in transitions {
                    println!(
                        "{:<18} {:<6} {:<10} {:<10}",
                        t.changed_at.format("%Y-%m-%d %H:%M"),
                        t.job_id,
                        t.from,
                        t.to
                    );
                }
            }
        }

        Commands::Stats => {
            db.ensure_initialized()?;
            let stats = db.stats(Utc::now())?;
            println!("Total applications: {}", stats.total);
            println!("Applied this week:  {}", stats.applied_this_week);
            for status in JobStatus::ALL {
                println!("  {:<10} {}", status, stats.by_status.get(status));
            }
        }
    }

    Ok(())
}

fn print_job_table(jobs: &[JobApplication]) {
    println!(
        "{:<6} {:<10} {:<24} {:<24} {:<16} {:<10}",
        "ID", "STATUS", "COMPANY", "POSITION", "LOCATION", "APPLIED"
    );
    println!("{}", "-".repeat(95));
    for job in jobs {
        println!(
            "{:<6} {:<10} {:<24} {:<24} {:<16} {:<10}",
            job.id,
            job.status,
            truncate(&job.company, 22),
            truncate(&job.position, 22),
            truncate(&job.location, 14),
            job.applied_date.format("%Y-%m-%d")
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
