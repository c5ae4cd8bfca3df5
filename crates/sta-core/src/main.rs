//! Spatio-Temporal Analysis Core - dataset alignment and model handoff
//!
//! The main entry point for sta-core, handling:
//! - Loading observations, roster, and covariates
//! - Aligning them onto the dense unit × time grid
//! - Preparing validated input for the external MCMC sampler
//! - Comparing two models' predictions and mapping the result

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use sta_common::{Error, OutputFormat, Result, StructuredError, SCHEMA_VERSION};
use sta_config::{load_config, AnalysisConfig, ConfigError, DatasetLayout, ResolvedConfig};
use sta_core::align::{align, AlignedTable};
use sta_core::compare::{merge_predictions, unit_means, Side};
use sta_core::data::{
    read_covariates, read_neighbour_matrix, read_observations, read_predictions, read_roster,
    CovariateTable, DataStore, DirectoryStore,
};
use sta_core::exit_codes::ExitCode;
use sta_core::geometry::read_polygons;
use sta_core::log_event;
use sta_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogLevel, Stage,
};
use sta_core::output::{format_aligned, format_unit_means};
use sta_core::render::{GeoJsonRenderer, Renderer};
use sta_core::sampler::{Formula, SamplerRequest};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Spatio-Temporal Analysis Core - align, prepare, and compare areal models
#[derive(Parser)]
#[command(name = "sta-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to analysis.json (otherwise STA_CONFIG, STA_CONFIG_DIR, XDG, /etc/sta)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Align observations, roster, and covariates into the unit × time table
    Align(AlignArgs),

    /// Align, build the model frame, validate, and write sampler input
    Prepare(PrepareArgs),

    /// Merge two prediction tables and report per-unit means
    Compare(CompareArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Print version information
    Version,
}

/// Where the input tables come from.
///
/// Explicit paths win; otherwise files are looked up in the data store
/// (`--store`/`--dataset`, falling back to the `datasets` config section).
#[derive(Args, Debug)]
struct DataArgs {
    /// Data store root directory
    #[arg(long)]
    store: Option<PathBuf>,

    /// Dataset name within the store
    #[arg(long)]
    dataset: Option<String>,

    /// Observations CSV (code,date,cases[,population])
    #[arg(long)]
    observations: Option<PathBuf>,

    /// Population roster CSV (code,population)
    #[arg(long)]
    roster: Option<PathBuf>,

    /// Covariates CSV (code,<columns...>)
    #[arg(long, conflicts_with = "no_covariates")]
    covariates: Option<PathBuf>,

    /// Align without covariates
    #[arg(long)]
    no_covariates: bool,
}

#[derive(Args, Debug)]
struct AlignArgs {
    #[command(flatten)]
    data: DataArgs,
}

#[derive(Args, Debug)]
struct PrepareArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Neighbourhood matrix CSV (square 0/1, optional header row of unit codes)
    #[arg(long)]
    adjacency: Option<PathBuf>,

    /// Model formula (overrides model.formula)
    #[arg(long)]
    formula: Option<String>,

    /// Write sampler input JSON here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// First prediction table (code,date,value)
    #[arg(long)]
    left: PathBuf,

    /// Second prediction table (code,date,value)
    #[arg(long)]
    right: PathBuf,

    /// Label for the first table
    #[arg(long, default_value = "left")]
    left_name: String,

    /// Label for the second table
    #[arg(long, default_value = "right")]
    right_name: String,

    /// Unit polygons (GeoJSON FeatureCollection) to map the means onto
    #[arg(long, requires = "map_out")]
    geometry: Option<PathBuf>,

    /// Styled GeoJSON output path
    #[arg(long, requires = "geometry")]
    map_out: Option<PathBuf>,

    /// Which per-unit mean to map
    #[arg(long, value_enum, default_value = "left")]
    side: Side,

    /// Feature property holding the unit code (overrides datasets.unit_property)
    #[arg(long)]
    unit_property: Option<String>,

    /// Legend title (overrides render.legend_title)
    #[arg(long)]
    legend_title: Option<String>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show,

    /// Validate a configuration file
    Validate {
        /// Config file (defaults to the resolved one)
        path: Option<PathBuf>,
    },

    /// Print the JSON Schema of analysis.json
    Schema,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => std::process::exit(report_parse_error(&e).as_i32()),
    };

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    init_logging(&LogConfig::from_env(cli_level, None));

    let ctx = LogContext::new(generate_run_id());
    log_event!(ctx, DEBUG, event_names::RUN_STARTED, Stage::Init, "run started");

    let exit_code = match &cli.command {
        Commands::Align(args) => run_align(&cli.global, &ctx, args),
        Commands::Prepare(args) => run_prepare(&cli.global, &ctx, args),
        Commands::Compare(args) => run_compare(&cli.global, &ctx, args),
        Commands::Config(args) => run_config(&cli.global, args),
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    log_event!(
        ctx,
        DEBUG,
        event_names::RUN_FINISHED,
        Stage::Init,
        "run finished",
        exit_code = exit_code.as_i32()
    );
    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Print a clap parse failure and map it to an exit code.
///
/// `--help` and `--version` are not failures; every other parse error is
/// an argument error.
fn report_parse_error(error: &clap::Error) -> ExitCode {
    let _ = error.print();
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::Clean,
        _ => ExitCode::ArgsError,
    }
}

/// Print a command error to stderr and map it to an exit code.
fn output_error(global: &GlobalOpts, error: &Error) -> ExitCode {
    let structured = StructuredError::from(error);
    match global.format {
        OutputFormat::Json => eprintln!("{}", structured.to_json()),
        _ => eprintln!("{}", structured.to_human(error.headline())),
    }
    ExitCode::from(error)
}

/// Serializing an in-memory value should never fail; treat it as a bug.
fn output_internal_error(command: &str, error: &serde_json::Error) -> ExitCode {
    tracing::error!(
        target: event_names::INTERNAL_ERROR,
        stage = %Stage::Init,
        command,
        error = %error,
        "failed to serialize output"
    );
    eprintln!("{}: failed to serialize output: {}", command, error);
    ExitCode::InternalError
}

/// Output a config error in the appropriate format.
fn output_config_error(global: &GlobalOpts, error: &ConfigError) -> ExitCode {
    let (error_code, exit_code) = match error {
        ConfigError::NotFound { .. } => (30, ExitCode::ConfigError),
        ConfigError::ParseError { .. } => (30, ExitCode::ConfigError),
        ConfigError::ValidationError(e) => (e.code(), ExitCode::ConfigError),
        ConfigError::IoError { .. } => (60, ExitCode::IoError),
    };

    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "status": "error",
                "error": {
                    "code": error_code,
                    "category": "config",
                    "message": error.to_string(),
                }
            });
            eprintln!("{}", response);
        }
        _ => {
            eprintln!("✗ Configuration Error");
            eprintln!("  Reason: {}", error);
        }
    }

    exit_code
}

fn resolve_config(
    global: &GlobalOpts,
    ctx: &LogContext,
) -> std::result::Result<ResolvedConfig, ConfigError> {
    let resolved = load_config(global.config.as_deref()).inspect_err(|e| {
        log_event!(
            ctx,
            WARN,
            event_names::CONFIG_ERROR,
            Stage::Init,
            "configuration rejected",
            error = tracing::field::display(e)
        );
    })?;
    match &resolved.path {
        Some(path) => log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "configuration loaded",
            path = tracing::field::display(path.display()),
            source = tracing::field::display(&resolved.source)
        ),
        None => log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "using built-in configuration defaults"
        ),
    }
    Ok(resolved)
}

fn open_path(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    Ok(Box::new(BufReader::new(file)))
}

fn write_payload(payload: &str) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    out.write_all(payload.as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Resolves input files from explicit paths or the data store.
struct Sources<'a> {
    args: &'a DataArgs,
    layout: &'a DatasetLayout,
}

impl<'a> Sources<'a> {
    fn new(args: &'a DataArgs, layout: &'a DatasetLayout) -> Self {
        Sources { args, layout }
    }

    fn dataset(&self) -> Option<&str> {
        self.args
            .dataset
            .as_deref()
            .or(self.layout.dataset.as_deref())
    }

    fn store(&self) -> Option<DirectoryStore> {
        self.args
            .store
            .as_ref()
            .or(self.layout.store.as_ref())
            .map(DirectoryStore::new)
    }

    /// Open an input: the explicit path if given, else `filename` in the store.
    fn open(
        &self,
        explicit: Option<&Path>,
        filename: &str,
        flag: &str,
    ) -> Result<(Box<dyn Read>, String)> {
        if let Some(path) = explicit {
            return Ok((open_path(path)?, path.display().to_string()));
        }
        match (self.store(), self.dataset()) {
            (Some(store), Some(dataset)) => Ok((
                store.open(dataset, filename)?,
                store.describe(dataset, filename),
            )),
            _ => Err(Error::Config(format!(
                "no location for {}: pass --{} or --store and --dataset",
                filename, flag
            ))),
        }
    }

    fn covariates(&self) -> Result<Option<(Box<dyn Read>, String)>> {
        if self.args.no_covariates {
            return Ok(None);
        }
        if let Some(path) = &self.args.covariates {
            return self.open(Some(path.as_path()), "covariates", "covariates").map(Some);
        }
        match (&self.layout.covariates, self.store().is_some() && self.dataset().is_some()) {
            (Some(filename), true) => self.open(None, filename, "covariates").map(Some),
            _ => Ok(None),
        }
    }
}

fn load_and_align(sources: &Sources<'_>, ctx: &LogContext) -> Result<AlignedTable> {
    let (input, name) = sources.open(
        sources.args.observations.as_deref(),
        &sources.layout.observations,
        "observations",
    )?;
    let observations = read_observations(input, &name)?;
    log_event!(
        ctx,
        INFO,
        event_names::LOAD_TABLE,
        Stage::Load,
        "observations loaded",
        source = tracing::field::display(&name),
        rows = observations.len()
    );

    let (input, name) =
        sources.open(sources.args.roster.as_deref(), &sources.layout.roster, "roster")?;
    let roster = read_roster(input, &name)?;
    log_event!(
        ctx,
        INFO,
        event_names::LOAD_TABLE,
        Stage::Load,
        "roster loaded",
        source = tracing::field::display(&name),
        rows = roster.len()
    );

    let covariates = match sources.covariates()? {
        Some((input, name)) => {
            let table = read_covariates(input, &name)?;
            log_event!(
                ctx,
                INFO,
                event_names::LOAD_TABLE,
                Stage::Load,
                "covariates loaded",
                source = tracing::field::display(&name),
                rows = table.len(),
                columns = table.names().len()
            );
            table
        }
        None => CovariateTable::empty(),
    };

    align(&observations, &roster, &covariates).inspect_err(|e| {
        log_event!(
            ctx,
            WARN,
            event_names::ALIGN_INTEGRITY_ERROR,
            Stage::Align,
            "alignment failed",
            code = e.code()
        );
    })
}

fn context_for(ctx: &LogContext, args: &DataArgs, config: &AnalysisConfig) -> LogContext {
    match args.dataset.as_ref().or(config.datasets.dataset.as_ref()) {
        Some(dataset) => ctx.clone().with_dataset(dataset.clone()),
        None => ctx.clone(),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn run_align(global: &GlobalOpts, ctx: &LogContext, args: &AlignArgs) -> ExitCode {
    let resolved = match resolve_config(global, ctx) {
        Ok(r) => r,
        Err(e) => return output_config_error(global, &e),
    };
    let ctx = context_for(ctx, &args.data, &resolved.config);
    let sources = Sources::new(&args.data, &resolved.config.datasets);

    let result = load_and_align(&sources, &ctx)
        .and_then(|table| format_aligned(&table, global.format))
        .and_then(|payload| write_payload(&payload));
    match result {
        Ok(()) => ExitCode::Clean,
        Err(e) => output_error(global, &e),
    }
}

fn run_prepare(global: &GlobalOpts, ctx: &LogContext, args: &PrepareArgs) -> ExitCode {
    let resolved = match resolve_config(global, ctx) {
        Ok(r) => r,
        Err(e) => return output_config_error(global, &e),
    };
    let ctx = context_for(ctx, &args.data, &resolved.config);
    match prepare(global, &ctx, args, &resolved.config) {
        Ok(()) => ExitCode::Clean,
        Err(e) => output_error(global, &e),
    }
}

fn prepare(
    global: &GlobalOpts,
    ctx: &LogContext,
    args: &PrepareArgs,
    config: &AnalysisConfig,
) -> Result<()> {
    let sources = Sources::new(&args.data, &config.datasets);
    let table = load_and_align(&sources, ctx)?;

    let formula: Formula = args
        .formula
        .as_deref()
        .unwrap_or(config.model.formula.as_str())
        .parse()?;

    let (input, name) =
        sources.open(args.adjacency.as_deref(), &config.datasets.adjacency, "adjacency")?;
    let neighbours = read_neighbour_matrix(input, &name)?;
    log_event!(
        ctx,
        INFO,
        event_names::LOAD_MATRIX,
        Stage::Load,
        "neighbourhood matrix loaded",
        source = tracing::field::display(&name),
        units = neighbours.n(),
        edges = neighbours.n_edges()
    );

    let request = SamplerRequest::new(formula, &table, &neighbours, config.sampler.clone())?;
    let input = request.to_input();
    let body = format!("{}\n", serde_json::to_string_pretty(&input)?);

    let Some(out) = &args.out else {
        return write_payload(&body);
    };
    let mut writer = BufWriter::new(File::create(out)?);
    writer.write_all(body.as_bytes())?;
    writer.flush()?;
    log_event!(
        ctx,
        INFO,
        event_names::MODEL_INPUT_WRITTEN,
        Stage::Model,
        "sampler input written",
        path = tracing::field::display(out.display())
    );

    let payload = match global.format {
        OutputFormat::Json => format!(
            "{}\n",
            serde_json::to_string_pretty(&serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "written": out.display().to_string(),
                "formula": input.formula,
                "family": input.family,
                "units": input.units.len(),
                "time_steps": input.dates.len(),
                "rows": input.response.len(),
                "design_columns": input.design_columns,
                "retained_draws": input.settings.retained_draws(),
            }))?
        ),
        _ => format!(
            "prepared {} rows ({} units x {} time steps) for {} sampler -> {}\n",
            input.response.len(),
            input.units.len(),
            input.dates.len(),
            input.family,
            out.display()
        ),
    };
    write_payload(&payload)
}

fn run_compare(global: &GlobalOpts, ctx: &LogContext, args: &CompareArgs) -> ExitCode {
    let resolved = match resolve_config(global, ctx) {
        Ok(r) => r,
        Err(e) => return output_config_error(global, &e),
    };
    match compare(global, ctx, args, &resolved.config) {
        Ok(()) => ExitCode::Clean,
        Err(e) => output_error(global, &e),
    }
}

fn compare(
    global: &GlobalOpts,
    ctx: &LogContext,
    args: &CompareArgs,
    config: &AnalysisConfig,
) -> Result<()> {
    let left = read_predictions(
        open_path(&args.left)?,
        &args.left.display().to_string(),
        &args.left_name,
    )?;
    let right = read_predictions(
        open_path(&args.right)?,
        &args.right.display().to_string(),
        &args.right_name,
    )?;
    let means = unit_means(&merge_predictions(&left, &right)?);

    if let (Some(geometry), Some(map_out)) = (&args.geometry, &args.map_out) {
        let property = args
            .unit_property
            .as_deref()
            .unwrap_or(config.datasets.unit_property.as_str());
        let polygons =
            read_polygons(open_path(geometry)?, &geometry.display().to_string(), property)?;
        log_event!(
            ctx,
            INFO,
            event_names::LOAD_GEOMETRY,
            Stage::Load,
            "polygons loaded",
            source = tracing::field::display(geometry.display()),
            features = polygons.len()
        );

        let mut options = config.render.clone();
        if let Some(title) = &args.legend_title {
            options.legend_title = title.clone();
        }
        let domain = means.domain_for(polygons.units(), args.side);
        let mut renderer = GeoJsonRenderer::new(BufWriter::new(File::create(map_out)?));
        renderer.render(&polygons, &domain, &options)?;
    }

    write_payload(&format_unit_means(&means, global.format)?)
}

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    let ctx = LogContext::new(generate_run_id());
    match &args.command {
        ConfigCommands::Show => match resolve_config(global, &ctx) {
            Ok(resolved) => print_config(global, &resolved),
            Err(e) => output_config_error(global, &e),
        },
        ConfigCommands::Validate { path } => {
            let path = path.as_deref().or(global.config.as_deref());
            match load_config(path) {
                Ok(resolved) => {
                    let snapshot = resolved.snapshot();
                    let payload = match global.format {
                        OutputFormat::Json => serde_json::json!({
                            "schema_version": SCHEMA_VERSION,
                            "status": "valid",
                            "source": snapshot,
                        })
                        .to_string(),
                        _ => format!(
                            "config validate: OK ({})",
                            snapshot
                                .path
                                .as_ref()
                                .map(|p| p.display().to_string())
                                .unwrap_or_else(|| "built-in defaults".to_string())
                        ),
                    };
                    println!("{}", payload);
                    ExitCode::Clean
                }
                Err(e) => output_config_error(global, &e),
            }
        }
        ConfigCommands::Schema => {
            let schema = schemars::schema_for!(AnalysisConfig);
            match serde_json::to_string_pretty(&schema) {
                Ok(s) => {
                    println!("{}", s);
                    ExitCode::Clean
                }
                Err(e) => output_internal_error("config schema", &e),
            }
        }
    }
}

fn print_config(global: &GlobalOpts, resolved: &ResolvedConfig) -> ExitCode {
    let snapshot = resolved.snapshot();
    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "source": snapshot,
                "config": resolved.config,
            });
            match serde_json::to_string_pretty(&response) {
                Ok(s) => println!("{}", s),
                Err(e) => return output_internal_error("config show", &e),
            }
        }
        OutputFormat::Summary => {
            println!(
                "config: source={} formula=\"{}\" family={}",
                snapshot.source, resolved.config.model.formula, resolved.config.sampler.family
            );
        }
        _ => {
            let config = &resolved.config;
            println!("# sta-core config show");
            println!();
            match &snapshot.path {
                Some(path) => {
                    println!("Source: {} ({})", path.display(), snapshot.source);
                    println!("Hash: {}", snapshot.hash.as_deref().unwrap_or("n/a"));
                }
                None => println!("Source: **built-in defaults**"),
            }
            println!();
            println!("## Model");
            println!("Formula: {}", config.model.formula);
            println!();
            println!("## Sampler");
            println!("Family: {}", config.sampler.family);
            println!(
                "Burn-in: {}  Samples: {}  Thin: {}  AR order: {}",
                config.sampler.burn_in,
                config.sampler.n_sample,
                config.sampler.thin,
                config.sampler.ar_order
            );
            println!("Retained draws: {}", config.sampler.retained_draws());
            println!();
            println!("## Render");
            println!("Palette: {}  Legend: {}", config.render.palette, config.render.legend_title);
        }
    }
    ExitCode::Clean
}

fn print_version(global: &GlobalOpts) {
    let version = env!("CARGO_PKG_VERSION");
    match global.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "name": "sta-core",
                "version": version,
                "schema_version": SCHEMA_VERSION,
            })
        ),
        _ => println!("sta-core {}", version),
    }
}
