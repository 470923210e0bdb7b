use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use procflow_app::{AppController, AppError, AppSettings, EngineCommand};
use procflow_core::{EngineOutput, FilterConfig, LayoutDirection, NodeId, TimeUnit, WeightMetric};
use procflow_events::{Event, EventBus};
use procflow_graph::{Palette, PathSortKey, sort_paths};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on how long a single pipeline run may take.
const PIPELINE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file to use instead of the per-user one
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Edge colour palette (blues, viridis, heat, grayscale)
    #[arg(long, global = true)]
    palette: Option<Palette>,

    /// Lay out top to bottom instead of left to right
    #[arg(long, global = true)]
    vertical: bool,

    /// Maximum edges in a single path
    #[arg(long, global = true)]
    max_path_length: Option<usize>,

    /// Stop the search after this many paths
    #[arg(long, global = true)]
    max_paths: Option<usize>,

    /// Write JSON here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and lay out the graph of an engine JSON document
    Render {
        /// Engine output document
        input: PathBuf,
        /// Highlight this mined variant, with ghosts for hops outside the filter
        #[arg(long)]
        variant: Option<usize>,
        /// Restrict the variant to node indices START:END
        #[arg(long, requires = "variant", value_parser = parse_window)]
        window: Option<(usize, usize)>,
    },
    /// Enumerate every simple path between two activities
    Paths {
        /// Engine output document
        input: PathBuf,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Sort key (hops, total, average)
        #[arg(long)]
        sort: Option<PathSortKey>,
    },
    /// Run the mining engine on an event log, then render the result
    Run(RunArgs),
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// Event log (.csv or .pkl)
    log: PathBuf,
    #[arg(long)]
    start_date: NaiveDate,
    #[arg(long)]
    end_date: NaiveDate,
    #[arg(long)]
    min_cases: Option<u64>,
    #[arg(long)]
    max_cases: Option<u64>,
    /// Lower bound on mean transition time, in `--time-unit`
    #[arg(long)]
    min_mean: Option<u64>,
    /// Upper bound on mean transition time, in `--time-unit`
    #[arg(long)]
    max_mean: Option<u64>,
    /// Edge weight metric (cases, mean_time)
    #[arg(long, default_value = "cases")]
    weight_metric: WeightMetric,
    /// Unit for duration bounds (s, m, h, d, w)
    #[arg(long, default_value = "d")]
    time_unit: TimeUnit,
    /// Engine program, overriding the configured one
    #[arg(long)]
    engine: Option<String>,
    /// Engine script arguments placed before the generated flags
    #[arg(long = "engine-arg")]
    engine_args: Vec<String>,
}

impl RunArgs {
    fn filter(&self) -> Result<FilterConfig> {
        Ok(FilterConfig {
            min_cases: self.min_cases,
            max_cases: self.max_cases,
            min_mean_seconds: self.mean_seconds("--min-mean", self.min_mean)?,
            max_mean_seconds: self.mean_seconds("--max-mean", self.max_mean)?,
            weight_metric: self.weight_metric,
            time_unit: self.time_unit,
            ..FilterConfig::new(self.start_date, self.end_date)
        })
    }

    fn mean_seconds(&self, flag: &str, value: Option<u64>) -> Result<Option<u64>> {
        value
            .map(|v| {
                v.checked_mul(self.time_unit.seconds())
                    .ok_or_else(|| anyhow!("{flag} {v} is too large for time unit {:?}", self.time_unit))
            })
            .transpose()
    }
}

fn parse_window(value: &str) -> Result<(usize, usize), String> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got {value}"))?;
    let index = |s: &str| s.trim().parse::<usize>().map_err(|e| format!("{s}: {e}"));
    let (start, end) = (index(start)?, index(end)?);
    if start >= end {
        return Err(format!("window start {start} must be before end {end}"));
    }
    Ok((start, end))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let mut settings = match &args.settings {
        Some(path) => AppSettings::load_from(path),
        None => AppSettings::load(),
    };
    apply_overrides(&mut settings, &args);

    match &args.command {
        Command::Render {
            input,
            variant,
            window,
        } => {
            let mut controller = AppController::with_process_engine(settings);
            controller.load_output(read_engine_output(input)?);
            settle(&controller)?;
            if let Some(index) = *variant {
                let bus = EventBus::new();
                bus.publish(Event::SelectVariant {
                    index,
                    window: *window,
                });
                bus.dispatch_to(&mut controller);
                settle(&controller)?;
                if controller.with_interaction(|s| s.selected_path().is_none()) {
                    bail!("No variant {} with window {:?}", index, window);
                }
            }
            emit(args.output.as_deref(), &controller.graph())
        }
        Command::Paths {
            input,
            from,
            to,
            sort,
        } => {
            let controller = AppController::with_process_engine(settings);
            controller.load_output(read_engine_output(input)?);
            settle(&controller)?;
            let search = controller
                .search(&NodeId::new(from.as_str()), &NodeId::new(to.as_str()))
                .map_err(user_error)?;
            let base = controller.base_graph();
            let paths = match sort {
                Some(key) => sort_paths(search.paths, *key, &base.edge_lookup()),
                None => search.paths,
            };
            if search.stats.truncated {
                tracing::warn!("Result truncated at {} paths", paths.len());
            }
            tracing::info!("Found {} paths from {} to {}", paths.len(), from, to);
            emit(
                args.output.as_deref(),
                &serde_json::json!({ "paths": paths, "stats": search.stats }),
            )
        }
        Command::Run(run) => {
            if let Some(program) = &run.engine {
                settings.engine = EngineCommand {
                    program: program.clone(),
                    args: run.engine_args.clone(),
                };
            }
            let controller = AppController::with_process_engine(settings);
            controller.load(&run.log, &run.filter()?).map_err(user_error)?;
            settle(&controller)?;
            emit(args.output.as_deref(), &controller.graph())
        }
    }
}

fn apply_overrides(settings: &mut AppSettings, args: &Args) {
    if let Some(palette) = args.palette {
        settings.palette = palette;
    }
    if args.vertical {
        settings.layout.direction = LayoutDirection::Vertical;
    }
    if let Some(limit) = args.max_path_length {
        settings.pathfinding.max_path_length = limit;
    }
    if let Some(limit) = args.max_paths {
        settings.pathfinding.max_paths = limit;
    }
}

fn user_error(err: AppError) -> anyhow::Error {
    anyhow!(err.user_message())
}

fn read_engine_output(path: &Path) -> Result<EngineOutput> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not an engine output document", path.display()))
}

/// Drive the pipeline to completion and surface the first failure.
fn settle(controller: &AppController) -> Result<()> {
    if !controller.wait_idle(PIPELINE_TIMEOUT) {
        bail!("Timed out after {:?} waiting for the pipeline", PIPELINE_TIMEOUT);
    }
    for event in controller.events().try_iter() {
        match event {
            Event::LayoutFailed { error } | Event::ShowError { message: error } => bail!(error),
            Event::ShowInfo { message } => tracing::info!("{}", message),
            Event::LayoutReady {
                node_count,
                edge_count,
            } => tracing::info!("Laid out {} nodes and {} edges", node_count, edge_count),
            _ => {}
        }
    }
    Ok(())
}

fn emit<T: serde::Serialize>(output: Option<&Path>, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}
