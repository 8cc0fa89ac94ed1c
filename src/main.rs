use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use leadflow::analytics;
use leadflow::assistant;
use leadflow::config::Config;
use leadflow::db::{self, PgStore};
use leadflow::export::ExportScope;
use leadflow::filter::{DateFilter, DispatchFilter, FilterCriteria, StatusFilter};
use leadflow::leaderboard::{Board, Leaderboard, Metric};
use leadflow::logging;
use leadflow::models::{ActorRef, DispatchType, LeadPatch, LeadStatus, NewLead};
use leadflow::notifications;
use leadflow::report;
use leadflow::seed;
use leadflow::LeadService;

#[derive(Parser)]
#[command(name = "leadflow")]
#[command(about = "Lead pipeline and leaderboards for sales teams", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// Matches customer name, phone, address, closer or setter
    #[arg(long, default_value = "")]
    search: String,
    /// A lead status, `recovery`, or `all`
    #[arg(long, default_value = "all")]
    status: StatusFilter,
    /// `immediate`, `scheduled`, or `all`
    #[arg(long, default_value = "all")]
    dispatch: DispatchFilter,
    #[arg(long, value_enum, default_value_t = DateFilter::All)]
    date: DateFilter,
}

impl FilterArgs {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            search_term: self.search.clone(),
            status: self.status.clone(),
            dispatch: self.dispatch,
            date: self.date,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo closers and leads for the team
    Seed,
    /// Import leads from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Create a lead
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        address: String,
        #[arg(long, value_enum, default_value_t = DispatchType::Immediate)]
        dispatch: DispatchType,
        #[arg(long)]
        setter_id: String,
        #[arg(long)]
        setter_name: String,
        /// RFC 3339 appointment time for scheduled leads
        #[arg(long)]
        scheduled_at: Option<DateTime<Utc>>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// List the team's leads
    List {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Move a lead to a new status
    Status {
        id: Uuid,
        status: LeadStatus,
    },
    /// Edit a lead's contact details or notes
    Edit {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        scheduled_at: Option<DateTime<Utc>>,
    },
    /// List the team's active closers
    Closers,
    /// Assign one or more leads to a closer
    Reassign {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<Uuid>,
        #[arg(long)]
        closer: String,
    },
    /// Export leads to CSV
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Export exactly these leads instead of the filtered view
        #[arg(long = "select", num_args = 1..)]
        selected: Vec<Uuid>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Rank closers or setters from the sales sheet
    Leaderboard {
        #[arg(long, value_enum, default_value_t = Board::Closers)]
        board: Board,
        #[arg(long, value_enum, default_value_t = Metric::Kilowatts)]
        metric: Metric,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Ask a question about the sales sheet
    Ask {
        question: Vec<String>,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Follow the team's leads as they change
    Watch {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

async fn connect(config: &Config) -> anyhow::Result<PgStore> {
    let database_url = config
        .database_url()
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(PgStore::new(pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config;
    logging::init_tracing(config.verbosity());

    match cli.command {
        Commands::InitDb => {
            let store = connect(&config).await?;
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let store = connect(&config).await?;
            let written = seed::seed(&store, &config.team).await?;
            println!("Seeded {written} leads for team {}.", config.team);
        }
        Commands::Import { csv } => {
            let service = LeadService::new(connect(&config).await?, config.team.clone());
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let inserted = service.import_csv(file).await?;
            println!("Inserted {inserted} leads from {}.", csv.display());
        }
        Commands::Create {
            name,
            phone,
            address,
            dispatch,
            setter_id,
            setter_name,
            scheduled_at,
            notes,
        } => {
            let service = LeadService::new(connect(&config).await?, config.team.clone());
            let lead = service
                .create_lead(NewLead {
                    customer_name: name,
                    customer_phone: phone,
                    address,
                    dispatch_type: dispatch,
                    setter: ActorRef {
                        id: setter_id,
                        name: setter_name,
                    },
                    scheduled_appointment_time: scheduled_at,
                    photo_urls: Vec::new(),
                    disposition_notes: notes,
                })
                .await?;
            println!("Created lead {} ({}).", lead.id, lead.status);
        }
        Commands::List { filter, limit } => {
            let service = LeadService::new(connect(&config).await?, config.team.clone());
            let leads = service.list(&filter.criteria()).await;

            if leads.is_empty() {
                println!("No leads match these filters.");
                return Ok(());
            }

            println!("{} leads:", leads.len());
            for lead in leads.iter().take(limit) {
                println!(
                    "- {} {} ({}, {}) closer {} setter {}",
                    lead.id,
                    lead.customer_name,
                    lead.status,
                    lead.dispatch_type,
                    lead.closer_name().unwrap_or("unassigned"),
                    lead.setter_name().unwrap_or("unknown")
                );
            }
        }
        Commands::Status { id, status } => {
            let service = LeadService::new(connect(&config).await?, config.team.clone());
            let lead = service.set_status(id, status).await?;
            println!("Lead {} is now {}.", lead.id, lead.status);
        }
        Commands::Edit {
            id,
            name,
            phone,
            address,
            notes,
            scheduled_at,
        } => {
            let service = LeadService::new(connect(&config).await?, config.team.clone());
            let patch = LeadPatch {
                customer_name: name,
                customer_phone: phone,
                address,
                disposition_notes: notes,
                scheduled_appointment_time: scheduled_at,
            };
            let lead = service.update_details(id, patch).await?;
            println!("Lead {} updated.", lead.id);
        }
        Commands::Closers => {
            let service = LeadService::new(connect(&config).await?, config.team.clone());
            let closers = service.closers().await?;

            if closers.is_empty() {
                println!("No active closers on team {}.", config.team);
                return Ok(());
            }

            for closer in closers {
                println!("- {} {}", closer.id, closer.name);
            }
        }
        Commands::Reassign { ids, closer } => {
            let service = LeadService::new(connect(&config).await?, config.team.clone());
            let sent = service.bulk_reassign(&ids, &closer).await?;
            println!("Reassigned {} leads to {closer}.", sent.len());
            for notification in notifications::displayable(sent) {
                println!("  notify {}: {}", notification.recipient_id, notification.message);
            }
        }
        Commands::Export {
            filter,
            selected,
            out_dir,
        } => {
            let service = LeadService::new(connect(&config).await?, config.team.clone());
            let (leads, scope) = if selected.is_empty() {
                (
                    service.list(&filter.criteria()).await,
                    ExportScope::Filtered(filter.status.clone()),
                )
            } else {
                let leads = service
                    .leads()
                    .await?
                    .into_iter()
                    .filter(|lead| selected.contains(&lead.id))
                    .collect::<Vec<_>>();
                (leads, ExportScope::Selected)
            };

            let path = out_dir.join(scope.file_name(Local::now().date_naive()));
            let file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let rows = service.export(&leads, file)?;
            println!("Exported {rows} leads to {}.", path.display());
        }
        Commands::Leaderboard {
            board,
            metric,
            limit,
        } => {
            let sales = analytics::read_sales(config.analytics_source()?)
                .await
                .context("failed to read the sales sheet")?;
            let leaderboard = Leaderboard::build(board, metric, &sales);

            if leaderboard.entries.is_empty() {
                println!("No qualifying sales found.");
                return Ok(());
            }

            println!("{}:", board.title());
            for (rank, stat) in leaderboard.top(limit).iter().enumerate() {
                println!(
                    "{:>2}. {} {} deals, {:.1} kW",
                    rank + 1,
                    stat.name,
                    stat.count,
                    stat.total
                );
            }
        }
        Commands::Ask { question } => {
            let sales = analytics::read_sales(config.analytics_source()?)
                .await
                .context("failed to read the sales sheet")?;
            println!("{}", assistant::answer(&question.join(" "), &sales));
        }
        Commands::Report { filter, out } => {
            let service = LeadService::new(connect(&config).await?, config.team.clone());
            let criteria = filter.criteria();
            let leads = service.list(&criteria).await;
            let sales = match config.analytics_source() {
                Ok(source) => analytics::read_sales(source).await.unwrap_or_else(|err| {
                    tracing::warn!(error = %err, "sales sheet unavailable, leaderboards left empty");
                    Vec::new()
                }),
                Err(_) => Vec::new(),
            };
            let report = report::build_report(&config.team, &criteria, Utc::now(), &leads, &sales);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Watch { filter } => {
            let service = LeadService::new(connect(&config).await?, config.team.clone());
            let mut view = service.watch(filter.criteria()).await?;
            println!("{} leads in view.", view.current().len());

            loop {
                tokio::select! {
                    update = view.next() => match update {
                        Some(leads) => println!("{} leads in view.", leads.len()),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(())
}
