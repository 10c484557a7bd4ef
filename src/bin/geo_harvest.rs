use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use geo_metadata_harvester::app::{App, LogSink, ProgressSink};
use geo_metadata_harvester::config::{ConfigFile, ConfigLoader, HarvestConfig};
use geo_metadata_harvester::domain::GseAccession;
use geo_metadata_harvester::error::HarvestError;
use geo_metadata_harvester::filter::FilterCriteria;
use geo_metadata_harvester::geo::{AccessionLister, EutilsHttpClient, read_accession_list};
use geo_metadata_harvester::geofetch::{
    GeofetchMaterializer, GeofetchOptions, MaterializeOutput, MetadataMaterializer,
};
use geo_metadata_harvester::output::{JsonOutput, OutputMode, TextSummary};
use geo_metadata_harvester::prompt::prompt_line;

#[derive(Parser)]
#[command(name = "geo-harvest")]
#[command(about = "Search GEO series, fetch their metadata with geofetch, and combine the raw CSV tables")]
#[command(version, author)]
struct Cli {
    /// Print JSON results and never prompt.
    #[arg(long, global = true)]
    non_interactive: bool,

    /// JSON config file (defaults to ./geo-harvest.json when present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search, fetch metadata, combine and filter")]
    Run(RunArgs),
    #[command(about = "Search GEO and write the accession list")]
    Search(SearchArgs),
    #[command(about = "Fetch metadata for every accession in a list file")]
    Fetch(FetchArgs),
    #[command(about = "Combine raw CSV files and apply filters")]
    Combine(CombineArgs),
}

#[derive(Args)]
struct RunArgs {
    /// GEO search query, e.g. "h3k4me3 AND mouse AND oocyte".
    query: Option<String>,
    #[command(flatten)]
    search: SearchOptions,
    #[command(flatten)]
    fetch: FetchOptions,
    #[command(flatten)]
    combine: CombineOptions,
}

#[derive(Args)]
struct SearchArgs {
    query: Option<String>,
    #[command(flatten)]
    search: SearchOptions,
}

#[derive(Args)]
struct FetchArgs {
    /// Accession list to read (defaults to the configured list path).
    #[arg(long)]
    list: Option<Utf8PathBuf>,
    #[command(flatten)]
    fetch: FetchOptions,
}

#[derive(Args)]
struct CombineArgs {
    #[command(flatten)]
    combine: CombineOptions,
    /// Metadata directory renamed when --target is given.
    #[arg(long)]
    metadata_dir: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct SearchOptions {
    /// Where the found accessions are written, one per line.
    #[arg(short = 'o', long = "output-list")]
    output_list: Option<Utf8PathBuf>,
    /// Maximum number of search hits to request.
    #[arg(long)]
    retmax: Option<u32>,
}

#[derive(Args)]
struct FetchOptions {
    /// Forwarded to geofetch as --discard-soft.
    #[arg(long)]
    discard_soft: bool,
    /// Directory geofetch writes into.
    #[arg(long)]
    metadata_dir: Option<Utf8PathBuf>,
    /// Fetch even when the series directory already exists.
    #[arg(long)]
    no_skip_existing: bool,
    /// Kill geofetch after this many seconds (0 disables the limit).
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args)]
struct CombineOptions {
    /// Root searched recursively for raw CSV files.
    #[arg(long)]
    raw_data_dir: Option<Utf8PathBuf>,
    /// Destination of the combined table.
    #[arg(long)]
    combined_output: Option<Utf8PathBuf>,
    /// File name pattern of the raw CSV files.
    #[arg(long)]
    raw_data_pattern: Option<String>,
    /// Keep rows whose organism contains this text.
    #[arg(long)]
    organism: Option<String>,
    /// Keep rows whose library strategy contains this text.
    #[arg(long)]
    assay: Option<String>,
    /// Keep rows whose sample name contains this text, and move outputs into a directory of that name.
    #[arg(long)]
    target: Option<String>,
    /// Insert two empty separator columns after the leading columns.
    #[arg(long)]
    separator_columns: bool,
}

impl SearchOptions {
    fn apply(self, overrides: &mut ConfigFile) {
        overrides.accession_list = self.output_list;
        overrides.retmax = self.retmax;
    }
}

impl FetchOptions {
    fn apply(self, overrides: &mut ConfigFile) {
        overrides.discard_soft = self.discard_soft.then_some(true);
        overrides.metadata_dir = self.metadata_dir.or(overrides.metadata_dir.take());
        overrides.skip_existing = self.no_skip_existing.then_some(false);
        overrides.tool_timeout_secs = self.timeout_secs;
    }
}

impl CombineOptions {
    fn apply(self, overrides: &mut ConfigFile) {
        overrides.raw_data_dir = self.raw_data_dir;
        overrides.combined_output = self.combined_output;
        overrides.raw_data_pattern = self.raw_data_pattern;
        overrides.filters = FilterCriteria {
            organism: self.organism,
            assay: self.assay,
            target: self.target,
        };
        overrides.separator_columns = self.separator_columns.then_some(true);
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::MissingQuery | HarvestError::MissingConfig(_) => 2,
        HarvestError::GeoHttp(_)
        | HarvestError::GeoStatus { .. }
        | HarvestError::GeoPayload(_)
        | HarvestError::MissingTool(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let file = ConfigLoader::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => {
            let mut overrides = ConfigFile {
                query: args.query,
                ..ConfigFile::default()
            };
            args.search.apply(&mut overrides);
            args.combine.apply(&mut overrides);
            args.fetch.apply(&mut overrides);
            let config = with_query(ConfigLoader::resolve(file, overrides), output_mode)?;
            run_pipeline(config, output_mode)
        }
        Commands::Search(args) => {
            let mut overrides = ConfigFile {
                query: args.query,
                ..ConfigFile::default()
            };
            args.search.apply(&mut overrides);
            let config = with_query(ConfigLoader::resolve(file, overrides), output_mode)?;
            run_search(config, output_mode)
        }
        Commands::Fetch(args) => {
            let mut overrides = ConfigFile {
                accession_list: args.list,
                ..ConfigFile::default()
            };
            args.fetch.apply(&mut overrides);
            run_fetch(ConfigLoader::resolve(file, overrides), output_mode)
        }
        Commands::Combine(args) => {
            let mut overrides = ConfigFile {
                metadata_dir: args.metadata_dir,
                ..ConfigFile::default()
            };
            args.combine.apply(&mut overrides);
            run_combine(ConfigLoader::resolve(file, overrides), output_mode)
        }
    }
}

fn with_query(mut config: HarvestConfig, output_mode: OutputMode) -> miette::Result<HarvestConfig> {
    let missing = config
        .query
        .as_deref()
        .is_none_or(|query| query.trim().is_empty());
    if missing && matches!(output_mode, OutputMode::Interactive) {
        config.query = prompt_line("GEO search query").into_diagnostic()?;
    }
    Ok(config)
}

fn sink_for(output_mode: OutputMode) -> Box<dyn ProgressSink> {
    match output_mode {
        OutputMode::NonInteractive => Box::new(JsonOutput),
        OutputMode::Interactive => Box::new(LogSink),
    }
}

fn materializer(config: &HarvestConfig) -> Result<GeofetchMaterializer, HarvestError> {
    GeofetchMaterializer::new(GeofetchOptions {
        discard_soft: config.discard_soft,
        timeout: config.tool_timeout(),
    })
}

fn run_pipeline(config: HarvestConfig, output_mode: OutputMode) -> miette::Result<()> {
    let lister = EutilsHttpClient::new(config.retmax)?;
    let app = App::new(lister, materializer(&config)?);
    let result = app.run(&config, sink_for(output_mode).as_ref())?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_run(&result).into_diagnostic()?,
        OutputMode::Interactive => TextSummary::print_run(&result),
    }
    Ok(())
}

fn run_search(config: HarvestConfig, output_mode: OutputMode) -> miette::Result<()> {
    let app = App::new(EutilsHttpClient::new(config.retmax)?, NopMaterializer);
    let result = app.search(&config, sink_for(output_mode).as_ref())?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_search(&result).into_diagnostic()?,
        OutputMode::Interactive => TextSummary::print_search(&result),
    }
    Ok(())
}

fn run_fetch(config: HarvestConfig, output_mode: OutputMode) -> miette::Result<()> {
    let accessions: Vec<GseAccession> = read_accession_list(config.accession_list.as_std_path())?;
    let app = App::new(NopLister, materializer(&config)?);
    let result = app.materialize_all(&accessions, &config, sink_for(output_mode).as_ref())?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_materialize(&result).into_diagnostic()?,
        OutputMode::Interactive => TextSummary::print_materialize(&result),
    }
    Ok(())
}

fn run_combine(config: HarvestConfig, output_mode: OutputMode) -> miette::Result<()> {
    let app = App::new(NopLister, NopMaterializer);
    let sink = sink_for(output_mode);
    let mut result = app.combine(&config, sink.as_ref())?;
    if !result.no_data {
        result.relocation = app.relocate(&config, &result.outputs(), sink.as_ref());
    }
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_combine(&result).into_diagnostic()?,
        OutputMode::Interactive => TextSummary::print_combine(&result),
    }
    Ok(())
}

struct NopLister;
struct NopMaterializer;

impl AccessionLister for NopLister {
    fn search(&self, _query: &str) -> Result<Vec<GseAccession>, HarvestError> {
        Err(HarvestError::GeoHttp("search client not configured".to_string()))
    }
}

impl MetadataMaterializer for NopMaterializer {
    fn materialize(
        &self,
        _accession: &GseAccession,
        _destination: &std::path::Path,
    ) -> Result<MaterializeOutput, HarvestError> {
        Err(HarvestError::MissingTool("geofetch not configured".to_string()))
    }
}
