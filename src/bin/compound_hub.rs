use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use compound_hub::aggregate::{Aggregator, dedupe};
use compound_hub::config::{ConfigLoader, ResolvedConfig};
use compound_hub::domain::{CompoundQuery, PeakList, ProviderKind};
use compound_hub::error::HubError;
use compound_hub::http::{HttpBackend, ReqwestBackend};
use compound_hub::output::JsonOutput;
use compound_hub::providers::MassbankClient;
use compound_hub::server::{self, AppState};

#[derive(Parser)]
#[command(name = "compound-hub")]
#[command(about = "Search PubChem, MassBank and HMDB for chemical compounds through one endpoint")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP search gateway")]
    Serve(ServeArgs),
    #[command(about = "Search every enabled provider by name, formula or weight")]
    Search(SearchArgs),
    #[command(about = "Search MassBank by spectrum peak list")]
    Peaks(PeaksArgs),
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    enable_hmdb: bool,
}

#[derive(Args)]
struct SearchArgs {
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    formula: Option<String>,

    #[arg(long)]
    weight: Option<f64>,

    #[arg(long)]
    dedupe: bool,

    #[arg(long)]
    enable_hmdb: bool,

    #[arg(long = "provider", value_enum, help = "Only query these providers (repeatable)")]
    providers: Vec<ProviderKind>,

    #[arg(long, help = "Print per-provider outcome reports to stderr")]
    report: bool,
}

#[derive(Args)]
struct PeaksArgs {
    #[arg(help = "Peak list, e.g. \"56.04;10,69.04;42,83.06;51\"")]
    peak_list: String,

    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long, help = "Print the provider outcome report to stderr")]
    report: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        if let Some(hub) = report.downcast_ref::<HubError>() {
            return ExitCode::from(map_exit_code(hub));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HubError) -> u8 {
    match error {
        HubError::ConfigRead(_) | HubError::ConfigParse(_) | HubError::InvalidConfig(_) => 2,
        HubError::InvalidPeakList(_) => 2,
        HubError::Server(_) | HubError::HttpClient(_) => 3,
        _ => 1,
    }
}

async fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve(args) => run_serve(args, config).await,
        Commands::Search(args) => {
            if args.enable_hmdb || args.providers.contains(&ProviderKind::Hmdb) {
                config.hmdb.enabled = true;
            }
            run_search(args, config).await
        }
        Commands::Peaks(args) => run_peaks(args, config).await,
    }
}

fn backend(config: &ResolvedConfig) -> Arc<dyn HttpBackend> {
    Arc::new(ReqwestBackend::new(config.http.clone()))
}

async fn run_serve(args: ServeArgs, mut config: ResolvedConfig) -> miette::Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.enable_hmdb {
        config.hmdb.enabled = true;
    }
    let state = AppState::from_config(&config, backend(&config));
    server::serve(&config.server, state).await?;
    Ok(())
}

async fn run_search(args: SearchArgs, config: ResolvedConfig) -> miette::Result<()> {
    let aggregator = Aggregator::from_config(&config, backend(&config)).only(&args.providers);
    let query = CompoundQuery::new(args.name, args.formula, args.weight);
    if query.is_empty() {
        tracing::warn!("no search attribute given; nothing to do");
    }

    let result = aggregator.aggregate_with_reports(&query).await;
    let records = if args.dedupe || config.aggregation.dedupe {
        dedupe(result.records, config.aggregation.dedupe_weight_decimals)
    } else {
        result.records
    };

    JsonOutput::print_records(&records).into_diagnostic()?;
    if args.report {
        JsonOutput::print_reports(&result.reports).into_diagnostic()?;
    }
    Ok(())
}

async fn run_peaks(args: PeaksArgs, config: ResolvedConfig) -> miette::Result<()> {
    let peaks = PeakList::new(&args.peak_list);
    peaks.peaks()?;

    let massbank = MassbankClient::new(config.massbank.clone(), backend(&config));
    let response = massbank.search_by_peaks(&peaks, args.threshold).await;
    response.report.log();

    JsonOutput::print_records(&response.records).into_diagnostic()?;
    if args.report {
        JsonOutput::print_reports(std::slice::from_ref(&response.report)).into_diagnostic()?;
    }
    Ok(())
}
