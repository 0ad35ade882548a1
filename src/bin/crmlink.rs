//! crmlink CLI: resolve CRM objects and push quote records.
//!
//! Usage:
//!   crmlink resolve <object> [--config path]
//!   crmlink fields <object> [--config path]
//!   crmlink push --object <object> --fields <file.json> [--contact id] [--note text]
//!
//! Credentials come from CRM_ACCESS_TOKEN and CRM_LOCATION_ID.

use clap::{Parser, Subcommand};
use crmlink::{
    CrmAdapter, CrmConfig, CrmGateway, Credentials, EventDispatcher, HttpGateway,
    OpportunityDraft, QuoteEvent, SyncOutcome,
};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "crmlink",
    version,
    about = "CRM custom-object record integration"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to the YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a logical object name to its remote identity
    Resolve {
        /// Logical object name, e.g. quotes
        object: String,
    },
    /// Show the remote field schema of an object
    Fields {
        /// Logical object name, e.g. quotes
        object: String,
    },
    /// Create a record (and its note and opportunity) from a JSON field file
    Push {
        /// Logical object name
        #[arg(long, default_value = "quotes")]
        object: String,
        /// JSON file holding an object of logical field → value
        #[arg(long)]
        fields: PathBuf,
        /// Contact to link the record to
        #[arg(long)]
        contact: Option<String>,
        /// Note to add to the contact
        #[arg(long)]
        note: Option<String>,
        /// Open a pipeline opportunity with this name
        #[arg(long)]
        opportunity: Option<String>,
        /// Monetary value of the opportunity
        #[arg(long, requires = "opportunity")]
        value: Option<f64>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<CrmConfig, String> {
    match path {
        Some(p) => CrmConfig::load(&p).map_err(|e| format!("Failed to load {}: {}", p.display(), e)),
        None => CrmConfig::load_or_default(&CrmConfig::default_path())
            .map_err(|e| format!("Failed to load config: {}", e)),
    }
}

fn open_gateway(config: &CrmConfig) -> Result<Arc<dyn CrmGateway>, String> {
    let credentials = Credentials::from_env().map_err(|e| e.to_string())?;
    let gateway = HttpGateway::new(config, credentials).map_err(|e| e.to_string())?;
    Ok(Arc::new(gateway))
}

fn read_fields(path: &Path) -> Result<Map<String, Value>, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(format!("'{}' must hold a JSON object", path.display())),
        Err(e) => Err(format!("'{}' is not valid JSON: {}", path.display(), e)),
    }
}

async fn cmd_resolve(adapter: &CrmAdapter, object: &str) -> i32 {
    match adapter.resolver().resolve_with_log(object).await {
        Ok((descriptor, log)) => {
            println!("Object:      {}", descriptor.logical_name);
            println!("Object id:   {}", descriptor.object_id.as_deref().unwrap_or("-"));
            println!("Schema key:  {}", descriptor.schema_key.as_deref().unwrap_or("-"));
            println!("Strategies:  {}", log.labels().join(" → "));
            0
        }
        Err(e) => {
            eprintln!("Error: {} ({})", e, e.classification());
            1
        }
    }
}

async fn cmd_fields(adapter: &CrmAdapter, object: &str) -> i32 {
    let mut descriptor = match adapter.resolver().resolve(object).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {} ({})", e, e.classification());
            return 1;
        }
    };
    if let Err(e) = adapter.mapper().load_fields(&mut descriptor).await {
        eprintln!("Error: {} ({})", e, e.classification());
        return 1;
    }
    if descriptor.fields.is_empty() {
        println!("No fields defined.");
        return 0;
    }
    println!("{:<48}  {:<28}  {:<14}", "KEY", "NAME", "TYPE");
    println!("{}", "-".repeat(94));
    for field in &descriptor.fields {
        println!(
            "{:<48}  {:<28}  {:<14}",
            field.remote_key,
            field.display_name,
            format!("{:?}", field.data_type)
        );
    }
    0
}

async fn cmd_push(dispatcher: &EventDispatcher, event: QuoteEvent) -> i32 {
    let report = dispatcher.dispatch(&event).await;
    println!("Correlation: {}", report.correlation_id);

    let code = match &report.record {
        SyncOutcome::Complete(record) => {
            println!("Record:      created {} ({})", record.id, record.shape);
            0
        }
        SyncOutcome::Degraded { value, degradations } => {
            println!("Record:      created {} ({})", value.id, value.shape);
            for d in degradations {
                println!("  degraded:  {:?} after {} attempt(s): {}", d.feature, d.attempts, d.message);
            }
            0
        }
        SyncOutcome::Failed(e) => {
            eprintln!("Error: record not created: {} ({})", e, e.classification());
            1
        }
    };
    println!("Note:        {}", report.note);
    println!("Opportunity: {}", report.opportunity);
    code
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crmlink=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match load_config(cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let gateway = match open_gateway(&config) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Resolve { object } => {
            let adapter = CrmAdapter::new(gateway, &config);
            runtime.block_on(cmd_resolve(&adapter, &object))
        }
        Commands::Fields { object } => {
            let adapter = CrmAdapter::new(gateway, &config);
            runtime.block_on(cmd_fields(&adapter, &object))
        }
        Commands::Push {
            object,
            fields,
            contact,
            note,
            opportunity,
            value,
        } => {
            let fields = match read_fields(&fields) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let mut event = QuoteEvent::new(object, fields);
            if let Some(contact) = contact {
                event = event.for_contact(contact);
            }
            if let Some(note) = note {
                event = event.with_note(note);
            }
            if let Some(name) = opportunity {
                event = event.with_opportunity(OpportunityDraft {
                    name,
                    monetary_value: value,
                });
            }
            let dispatcher = EventDispatcher::new(gateway, &config);
            runtime.block_on(cmd_push(&dispatcher, event))
        }
    };
    std::process::exit(code);
}
