//! Invoice Numbering CLI - operator access to counters and the ledger
//!
//! Every command prints JSON on stdout; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoice_numbering_core::{
    render, DocumentReference, HistoryFilter, NumberStatus, OrganizationId, Period, SortOrder,
    TenantId,
};
use invoice_numbering_service::{InvoiceNumbering, NumberingError, ServiceConfig};
use invoice_numbering_store::Store;

#[derive(Parser)]
#[command(name = "invoice-numbering", author, version, about, long_about = None)]
struct Cli {
    /// JSON config file applied over environment settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides DATA_DIR)
    #[arg(short, long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Scope selection; year and month default to the current period.
#[derive(Args)]
struct ScopeArgs {
    /// Tenant id
    #[arg(short, long)]
    tenant: TenantId,

    /// Organization id
    #[arg(short, long)]
    org: OrganizationId,

    /// Year (defaults to the current year)
    #[arg(short, long, requires = "month")]
    year: Option<i32>,

    /// Month 1-12 (defaults to the current month)
    #[arg(short, long, requires = "year")]
    month: Option<u32>,
}

impl ScopeArgs {
    fn period(&self) -> (i32, u32) {
        match (self.year, self.month) {
            (Some(year), Some(month)) => (year, month),
            _ => {
                let now = Period::containing(Utc::now());
                (now.year(), now.month())
            }
        }
    }
}

/// A document a number is linked to.
#[derive(Args)]
struct ReferenceArgs {
    /// Document type: invoice or credit_note
    #[arg(long = "ref-type", requires = "reference_id")]
    reference_type: Option<String>,

    /// Document id
    #[arg(long = "ref-id", requires = "reference_type")]
    reference_id: Option<u64>,
}

impl ReferenceArgs {
    fn parse(&self) -> Result<Option<DocumentReference>, NumberingError> {
        match (&self.reference_type, self.reference_id) {
            (Some(kind), Some(id)) => Ok(Some(DocumentReference::parse(kind, id)?)),
            _ => Ok(None),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Issue the next number for a scope
    Next {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        reference: ReferenceArgs,
    },

    /// Show the last issued number for a scope without changing it
    Peek {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Void an issued number
    Void {
        /// Tenant id
        #[arg(short, long)]
        tenant: TenantId,
        /// Issued number
        number: String,
        /// Why it is voided
        #[arg(short, long, default_value = "")]
        reason: String,
    },

    /// Cancel an issued number
    Cancel {
        /// Tenant id
        #[arg(short, long)]
        tenant: TenantId,
        /// Issued number
        number: String,
        /// Why it is cancelled
        #[arg(short, long, default_value = "")]
        reason: String,
    },

    /// Link an issued number to its document
    Attach {
        /// Tenant id
        #[arg(short, long)]
        tenant: TenantId,
        /// Issued number
        number: String,
        /// Document type: invoice or credit_note
        #[arg(long = "ref-type")]
        reference_type: String,
        /// Document id
        #[arg(long = "ref-id")]
        reference_id: u64,
    },

    /// Show one issued number
    Show {
        /// Tenant id
        #[arg(short, long)]
        tenant: TenantId,
        /// Issued number
        number: String,
    },

    /// List a tenant's ledger
    History {
        /// Tenant id
        #[arg(short, long)]
        tenant: TenantId,
        /// Only this organization
        #[arg(short, long)]
        org: Option<OrganizationId>,
        /// Only this year
        #[arg(short, long)]
        year: Option<i32>,
        /// Only this month
        #[arg(short, long)]
        month: Option<u32>,
        /// Only this status: active, voided or cancelled
        #[arg(short, long)]
        status: Option<NumberStatus>,
        /// Oldest first
        #[arg(long)]
        ascending: bool,
        /// Page size
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Entries to skip
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// List a tenant's counters
    Counters {
        /// Tenant id
        #[arg(short, long)]
        tenant: TenantId,
    },

    /// Configure an organization's number template
    SetFormat {
        /// Tenant id
        #[arg(short, long)]
        tenant: TenantId,
        /// Organization id
        #[arg(short, long)]
        org: OrganizationId,
        /// Template, e.g. "INV-{YYYY}-{SEQ:4}"
        template: String,
    },

    /// Show the template new counters of an organization would use
    GetFormat {
        /// Tenant id
        #[arg(short, long)]
        tenant: TenantId,
        /// Organization id
        #[arg(short, long)]
        org: OrganizationId,
    },

    /// Render a template without touching any counter
    Render {
        /// Template, e.g. "INV-{YYYY}-{SEQ:4}"
        template: String,
        /// Year
        year: i32,
        /// Month
        month: u32,
        /// Sequence
        sequence: u64,
    },
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error: &'a str,
    message: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Logs on stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,invoice_numbering=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Rendering is pure; no store needed
    if let Commands::Render {
        template,
        year,
        month,
        sequence,
    } = &cli.command
    {
        print_json(&render(template, *year, *month, *sequence))?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    tracing::debug!(
        data_dir = %config.data_dir,
        default_format = ?config.default_format,
        max_issue_attempts = config.max_issue_attempts,
        "Configuration loaded"
    );

    let store = open_store(&config)?;
    let service = InvoiceNumbering::new(store, &config)?;

    match run(&service, cli.command).await {
        Ok(output) => {
            print_json(&output)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!(kind = e.kind().as_str(), error = %e, "Command failed");
            print_json(&ErrorOutput {
                error: e.kind().as_str(),
                message: e.to_string(),
            })?;
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    Ok(Arc::new(invoice_numbering_store::RocksStore::open(
        &config.data_dir,
    )?))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::warn!(
        path = %config.data_dir,
        "Built without RocksDB; using a memory store that is discarded on exit"
    );
    Ok(Arc::new(invoice_numbering_store::MemoryStore::new()))
}

async fn run(
    service: &InvoiceNumbering,
    command: Commands,
) -> Result<serde_json::Value, NumberingError> {
    let value = match command {
        Commands::Next { scope, reference } => {
            let (year, month) = scope.period();
            let reference = reference.parse()?;
            to_json(
                &service
                    .generate_next_with_reference(scope.tenant, scope.org, year, month, reference)
                    .await?,
            )?
        }
        Commands::Peek { scope } => {
            let (year, month) = scope.period();
            to_json(
                &service
                    .peek_current(scope.tenant, scope.org, year, month)
                    .await?,
            )?
        }
        Commands::Void {
            tenant,
            number,
            reason,
        } => to_json(&service.void_number(tenant, &number, &reason).await?)?,
        Commands::Cancel {
            tenant,
            number,
            reason,
        } => to_json(&service.cancel_number(tenant, &number, &reason).await?)?,
        Commands::Attach {
            tenant,
            number,
            reference_type,
            reference_id,
        } => {
            let reference = DocumentReference::parse(&reference_type, reference_id)?;
            to_json(&service.attach_reference(tenant, &number, reference).await?)?
        }
        Commands::Show { tenant, number } => {
            to_json(&service.find_number(tenant, &number).await?)?
        }
        Commands::History {
            tenant,
            org,
            year,
            month,
            status,
            ascending,
            limit,
            offset,
        } => {
            let filter = HistoryFilter {
                organization_id: org,
                year,
                month,
                status,
                order: if ascending {
                    SortOrder::Ascending
                } else {
                    SortOrder::Descending
                },
                limit,
                offset,
            };
            to_json(&service.list_history(tenant, filter).await?)?
        }
        Commands::Counters { tenant } => to_json(&service.list_counters(tenant).await?)?,
        Commands::SetFormat {
            tenant,
            org,
            template,
        } => to_json(&service.set_format(tenant, org, &template).await?)?,
        Commands::GetFormat { tenant, org } => {
            to_json(&service.get_format(tenant, org).await?)?
        }
        Commands::Render {
            template,
            year,
            month,
            sequence,
        } => serde_json::Value::String(render(&template, year, month, sequence)),
    };
    Ok(value)
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, NumberingError> {
    serde_json::to_value(value).map_err(|e| NumberingError::Internal(e.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
