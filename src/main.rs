use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use drift_sentinel::alert::engine::evaluate_alerts;
use drift_sentinel::alert::rules::AlertEventKind;
use drift_sentinel::alert::sink::{AlertSink, StdoutSink, WebhookSink};
use drift_sentinel::audit::{run_gke_audit, run_schema_audits, run_sql_audit};
use drift_sentinel::baseline::{BaselineSet, InstanceBaseline, InstanceConfigBaseline};
use drift_sentinel::config::{Config, ConfigOverrides};
use drift_sentinel::output::csv::{report_to_csv, schema_report_to_csv};
use drift_sentinel::output::json::render_json;
use drift_sentinel::output::table::{render_advisories, render_report_table, render_schema_table};
use drift_sentinel::output::yaml::render_yaml;
use drift_sentinel::report::{DriftReport, SchemaAuditRecord, SchemaAuditReport};
use drift_sentinel::schema::inspect::load_snapshot;
use drift_sentinel::schema::validator::validate_schema;
use drift_sentinel::store::{ResourceKind, SnapshotStore};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Yaml,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "drift-sentinel",
    about = "Audit cloud databases and clusters against declarative baselines"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Comma-separated project list, overriding config and baselines file.
    #[arg(short, long)]
    projects: Option<String>,
    /// Baselines YAML file, overriding the configured path.
    #[arg(short, long)]
    baselines: Option<PathBuf>,
    /// API access token, overriding config and environment.
    #[arg(long)]
    token: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Audit Cloud SQL instances against the configured baselines.
    Sql {
        /// Print a starter baselines file seeded from the first discovered
        /// instance instead of auditing.
        #[arg(long)]
        generate_baseline: bool,
    },
    /// Audit GKE clusters against the configured baselines.
    Gke,
    /// Validate database schemas against their baselines.
    Schema {
        /// Only run the named schema audit.
        #[arg(long)]
        name: Option<String>,
        /// Validate a schema snapshot file instead of connecting.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Re-render the most recent cached report.
    Report {
        #[arg(long, value_enum, default_value_t = ReportKind::Sql)]
        kind: ReportKind,
    },
    /// Re-run audits on an interval and alert on deltas.
    Watch {
        #[arg(long, default_value_t = 300)]
        interval_secs: u64,
        #[arg(long, default_value_t = 1)]
        iterations: u32,
    },
    /// Serve audits over HTTP.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Manage the app config file.
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportKind {
    Sql,
    Gke,
    Schema,
}

impl From<ReportKind> for ResourceKind {
    fn from(kind: ReportKind) -> Self {
        match kind {
            ReportKind::Sql => ResourceKind::Sql,
            ReportKind::Gke => ResourceKind::Gke,
            ReportKind::Schema => ResourceKind::Schema,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        projects: cli.projects.as_deref().map(parse_project_list).transpose()?,
        baselines_file: cli
            .baselines
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        access_token: cli.token.clone(),
    });

    if let Commands::Config { init, show } = &cli.command {
        return handle_config_command(&config, &config_path, *init, *show);
    }

    let baselines = load_baselines(&config)?;

    match &cli.command {
        Commands::Sql { generate_baseline } => {
            if *generate_baseline {
                return generate_sql_baseline(&config, &baselines).await;
            }
            let store = open_store(&config);
            let report = run_sql_audit(&config, &baselines, store.as_ref()).await?;
            persist_report(store.as_ref(), ResourceKind::Sql, &report);
            print_report(&report, cli.output)?;
        }
        Commands::Gke => {
            let store = open_store(&config);
            let report = run_gke_audit(&config, &baselines, store.as_ref()).await?;
            persist_report(store.as_ref(), ResourceKind::Gke, &report);
            print_report(&report, cli.output)?;
        }
        Commands::Schema { name, snapshot } => {
            let report = if let Some(path) = snapshot {
                validate_snapshot_file(&baselines, name.as_deref(), path)?
            } else {
                run_schema_audits(&config, &baselines, name.as_deref()).await
            };
            if let Some(store) = open_store(&config) {
                if let Err(error) =
                    store.insert_report(ResourceKind::Schema, report.generated_at, &report)
                {
                    warn!("failed caching report: {error}");
                }
            }
            print_schema_report(&report, cli.output)?;
        }
        Commands::Report { kind } => {
            let store = SnapshotStore::open(&config.resolved_db_path())?;
            match kind {
                ReportKind::Schema => {
                    let report: SchemaAuditReport = store
                        .latest_report(ResourceKind::Schema)?
                        .ok_or_else(|| anyhow!("no cached report; run an audit first"))?;
                    print_schema_report(&report, cli.output)?;
                }
                _ => {
                    let report: DriftReport = store
                        .latest_report((*kind).into())?
                        .ok_or_else(|| anyhow!("no cached report; run an audit first"))?;
                    print_report(&report, cli.output)?;
                }
            }
        }
        Commands::Watch {
            interval_secs,
            iterations,
        } => {
            run_watch_loop(&config, &baselines, *interval_secs, *iterations).await?;
        }
        Commands::Serve { host, port } => {
            let host = host.clone().unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let bind = format!("{host}:{port}");
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            drift_sentinel::server::run_server(config, baselines, addr).await?;
        }
        Commands::Config { .. } => unreachable!("config command handled before dispatch"),
    }

    Ok(())
}

fn handle_config_command(config: &Config, config_path: &PathBuf, init: bool, show: bool) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn parse_project_list(raw: &str) -> Result<Vec<String>> {
    let projects: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect();
    if projects.is_empty() {
        return Err(anyhow!("project list is empty"));
    }
    Ok(projects)
}

fn load_baselines(config: &Config) -> Result<BaselineSet> {
    let path = config.resolved_baselines_path();
    if !path.exists() {
        warn!("baselines file {} not found, auditing without baselines", path.display());
        return Ok(BaselineSet::default());
    }
    BaselineSet::load(&path)
}

/// A broken cache degrades to warnings; audits still run.
fn open_store(config: &Config) -> Option<SnapshotStore> {
    match SnapshotStore::open(&config.resolved_db_path()) {
        Ok(store) => Some(store),
        Err(error) => {
            warn!("failed opening snapshot store: {error}");
            None
        }
    }
}

fn persist_report(store: Option<&SnapshotStore>, kind: ResourceKind, report: &DriftReport) {
    if let Some(store) = store {
        if let Err(error) = store.insert_report(kind, report.generated_at, report) {
            warn!("failed caching report: {error}");
        }
    }
}

fn validate_snapshot_file(
    baselines: &BaselineSet,
    name: Option<&str>,
    path: &PathBuf,
) -> Result<SchemaAuditReport> {
    let schema = load_snapshot(path)?;
    let audit = match name {
        Some(name) => baselines
            .schema
            .iter()
            .find(|audit| audit.name == name)
            .ok_or_else(|| anyhow!("no schema baseline named {name}"))?,
        None => baselines
            .schema
            .first()
            .context("no schema baselines configured")?,
    };
    let result = validate_schema(&schema, Some(&audit.baseline));
    Ok(SchemaAuditReport::from_records(
        vec![SchemaAuditRecord {
            name: audit.name.clone(),
            database: schema.database_name.clone(),
            result,
        }],
        Vec::new(),
    ))
}

/// Snapshots the first discovered instance into a starter baselines file.
async fn generate_sql_baseline(config: &Config, baselines: &BaselineSet) -> Result<()> {
    let client = drift_sentinel::discovery::http_client(config.scan.request_timeout_secs)?;
    let token = drift_sentinel::discovery::access_token(config)?;
    let projects = drift_sentinel::audit::effective_projects(config, baselines);

    let (instances, failures) = drift_sentinel::discovery::sql::discover_instances(
        &client,
        &token,
        &projects,
        config.scan.max_concurrent_scans,
    )
    .await;
    for failure in &failures {
        warn!("{}: {}", failure.resource, failure.error);
    }
    let first = instances
        .first()
        .context("no instances discovered to seed a baseline from")?;

    let generated = BaselineSet {
        projects: vec![first.project.clone()],
        sql: vec![InstanceBaseline {
            name: format!("{}-baseline", first.name),
            filter_labels: Default::default(),
            config: InstanceConfigBaseline::from_snapshot(&first.config),
        }],
        ..Default::default()
    };
    println!("{}", render_yaml(&generated)?);
    info!("generated baseline from {}", first.identity());
    Ok(())
}

async fn run_watch_loop(
    config: &Config,
    baselines: &BaselineSet,
    interval_secs: u64,
    iterations: u32,
) -> Result<()> {
    let mut sinks: Vec<Box<dyn AlertSink>> = Vec::new();
    if config.alerts.enable_stdout {
        sinks.push(Box::new(StdoutSink));
    }
    if !config.alerts.webhook_url.trim().is_empty() {
        sinks.push(Box::new(WebhookSink::new(config.alerts.webhook_url.clone())));
    }

    let interval = Duration::from_secs(interval_secs.max(1));
    let store = open_store(config);
    let mut previous_sql: Option<DriftReport> = None;
    let mut previous_gke: Option<DriftReport> = None;
    let total_iterations = iterations.max(1);

    for i in 0..total_iterations {
        info!("watch iteration {}", i + 1);

        let sql_report = run_sql_audit(config, baselines, store.as_ref()).await?;
        persist_report(store.as_ref(), ResourceKind::Sql, &sql_report);
        let mut alerts = evaluate_alerts(previous_sql.as_ref(), &sql_report);

        if !baselines.gke.is_empty() {
            let gke_report = run_gke_audit(config, baselines, store.as_ref()).await?;
            persist_report(store.as_ref(), ResourceKind::Gke, &gke_report);
            alerts.extend(evaluate_alerts(previous_gke.as_ref(), &gke_report));
            previous_gke = Some(gke_report);
        }

        for alert in filter_alerts(alerts, config) {
            for sink in &sinks {
                if let Err(err) = sink.send(&alert).await {
                    warn!("failed sending alert: {err}");
                }
            }
        }
        previous_sql = Some(sql_report);

        if i + 1 < total_iterations {
            tokio::time::sleep(interval).await;
        }
    }
    Ok(())
}

fn filter_alerts(
    alerts: Vec<drift_sentinel::alert::engine::AlertEvent>,
    config: &Config,
) -> Vec<drift_sentinel::alert::engine::AlertEvent> {
    alerts
        .into_iter()
        .filter(|event| match event.kind {
            AlertEventKind::DriftDetected => config.alerts.rules.drift_detected,
            AlertEventKind::DriftResolved => config.alerts.rules.drift_resolved,
            AlertEventKind::CriticalDrift => config.alerts.rules.critical_drift,
            AlertEventKind::ScanFailed => config.alerts.rules.scan_failed,
        })
        .collect()
}

fn print_report(report: &DriftReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", render_report_table(report));
            let advisories = render_advisories(report);
            if !advisories.is_empty() {
                println!("Advisories:\n{advisories}");
            }
        }
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Yaml => println!("{}", render_yaml(report)?),
        OutputFormat::Csv => println!("{}", report_to_csv(report)?),
    }
    Ok(())
}

fn print_schema_report(report: &SchemaAuditReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_schema_table(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Yaml => println!("{}", render_yaml(report)?),
        OutputFormat::Csv => println!("{}", schema_report_to_csv(report)?),
    }
    Ok(())
}
