//! Tessella CLI
//!
//! Compile MapCSS stylesheets, inspect cascaded styles and spatial queries,
//! and render tiles through the job coordinator with the JSON scene backend.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use serde_json::json;
use tessella_css::{CompileOptions, ParseError, Stylesheet, compile_with, evaluate, evaluate_all};
use tessella_geo::{BoundingBox, MemoryStore, ObjectId, ObjectStore, SpatialIndex};
use tessella_render::{Coordinator, CoordinatorConfig, MetaId, SceneBackend, TileId};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Tessella: MapCSS tile rendering core
#[derive(Parser, Debug)]
#[command(name = "tessella")]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"EXAMPLES:
    # Check a stylesheet for errors
    tessella check style.mapcss

    # Print the cascaded style of one way at zoom 15
    tessella style style.mapcss data.json --zoom 15 --id way/42

    # List objects inside a bounding box
    tessella query data.json 8.5 47.3 8.6 47.4

    # Render a tile as a JSON scene
    tessella render style.mapcss data.json 15/17161/11476.svg --out tile.json
"#)]
struct Cli {
    /// Coordinator settings as JSON; omitted fields keep their defaults
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a stylesheet and report its rule count
    Check {
        /// MapCSS stylesheet
        stylesheet: PathBuf,
    },
    /// Print resolved attributes as JSON
    Style {
        /// MapCSS stylesheet
        stylesheet: PathBuf,
        /// Object dump
        data: PathBuf,
        /// Zoom level to evaluate at
        #[arg(short, long)]
        zoom: u8,
        /// Only this object, e.g. `way/42`
        #[arg(long)]
        id: Option<ObjectId>,
    },
    /// List the objects whose bounds intersect a box
    Query {
        /// Object dump
        data: PathBuf,
        /// Western edge
        #[arg(allow_negative_numbers = true)]
        min_lon: f64,
        /// Southern edge
        #[arg(allow_negative_numbers = true)]
        min_lat: f64,
        /// Eastern edge
        #[arg(allow_negative_numbers = true)]
        max_lon: f64,
        /// Northern edge
        #[arg(allow_negative_numbers = true)]
        max_lat: f64,
    },
    /// Render one tile with the scene backend
    Render {
        /// MapCSS stylesheet
        stylesheet: PathBuf,
        /// Object dump
        data: PathBuf,
        /// Tile as `z/x/y.png` or `z/x/y.svg`
        tile: TileId,
        /// Write the tile here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Prerender the tile's block and its children down to this zoom
        /// first (overrides `prerender_level`)
        #[arg(long, value_name = "ZOOM")]
        prerender: Option<u8>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(diagnostic) = err.downcast_ref::<Diagnostic>() {
                let (path, source, parse) = diagnostic.parts();
                print_diagnostic(path, source, parse);
            } else {
                eprintln!("{} {err:#}", "error:".red().bold());
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let options = CompileOptions {
        strict_attributes: config.strict_attributes,
    };

    match cli.command {
        Command::Check { stylesheet } => {
            let source = read(&stylesheet)?;
            let sheet = compile(&stylesheet, &source, &options, &MemoryStore::new())?;
            println!(
                "{} {}: {} rules, {} canvas attributes",
                "ok".green().bold(),
                stylesheet.display(),
                sheet.len(),
                sheet.canvas.len()
            );
        }
        Command::Style {
            stylesheet,
            data,
            zoom,
            id,
        } => {
            let store = load_store(&data)?;
            let source = read(&stylesheet)?;
            let sheet = compile(&stylesheet, &source, &options, &store)?;
            let output = if let Some(id) = id {
                let object = store
                    .resolve(id)
                    .with_context(|| format!("{id} is not in {}", data.display()))?;
                serde_json::to_value(evaluate(object, zoom, &sheet, &store))?
            } else {
                let ids: Vec<ObjectId> = store.objects().map(|object| object.id()).collect();
                let styled = evaluate_all(&ids, zoom, &sheet, &store);
                styled
                    .iter()
                    .map(|object| json!({ "id": object.id.to_string(), "attributes": object.attributes }))
                    .collect()
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Query {
            data,
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        } => {
            let store = load_store(&data)?;
            let index = SpatialIndex::from_store(&store, config.index)?;
            let mut hits = index.query(&BoundingBox::new(min_lon, min_lat, max_lon, max_lat));
            hits.sort_unstable();
            debug!(indexed = index.len(), hits = hits.len(), "query finished");
            for id in hits {
                println!("{id}");
            }
        }
        Command::Render {
            stylesheet,
            data,
            tile,
            out,
            prerender,
        } => {
            let store = load_store(&data)?;
            let source = read(&stylesheet)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start the runtime")?;
            let bytes = runtime.block_on(render(
                config, store, &stylesheet, &source, tile, prerender,
            ))?;
            match out {
                Some(path) => {
                    fs::write(&path, &bytes)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(tile = %tile, path = %path.display(), size = bytes.len(), "tile written");
                }
                None => println!("{}", String::from_utf8_lossy(&bytes)),
            }
        }
    }
    Ok(())
}

async fn render(
    config: CoordinatorConfig,
    store: MemoryStore,
    stylesheet: &Path,
    source: &str,
    tile: TileId,
    prerender: Option<u8>,
) -> Result<Vec<u8>> {
    let prerender = prerender.unwrap_or(config.prerender_level);
    let block = config.meta_tile_size;
    let coordinator = Coordinator::new(
        config,
        Arc::new(store),
        Arc::new(SceneBackend { pretty: true }),
    )?;
    coordinator
        .reload_stylesheet(source)
        .map_err(|err| Diagnostic::new(stylesheet, source, err))?;

    if prerender > tile.zoom {
        let blocks = coordinator
            .prerender(MetaId::for_tile(&tile, block), prerender)
            .await?;
        info!(blocks, max_zoom = prerender, "prerendered");
    }
    let bytes = coordinator.request_tile(tile, None).await?;
    let stats = coordinator.stats();
    debug!(?stats, hit_ratio = stats.hit_ratio(), "coordinator stats");
    Ok(bytes.to_vec())
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<CoordinatorConfig> {
    let Some(path) = path else {
        return Ok(CoordinatorConfig::default());
    };
    let config: CoordinatorConfig = serde_json::from_str(&read(path)?)
        .with_context(|| format!("invalid config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

fn load_store(path: &Path) -> Result<MemoryStore> {
    let store = MemoryStore::from_json(&read(path)?)
        .with_context(|| format!("failed to load {}", path.display()))?;
    if store.is_empty() {
        bail!("{} contains no objects", path.display());
    }
    Ok(store)
}

fn compile(
    path: &Path,
    source: &str,
    options: &CompileOptions,
    store: &dyn ObjectStore,
) -> Result<Stylesheet> {
    compile_with(source, options, store.interner())
        .map_err(|err| Diagnostic::new(path, source, err).into())
}

/// A compile error together with the source it points into.
#[derive(Debug)]
struct Diagnostic {
    path: PathBuf,
    source: String,
    error: ParseError,
}

impl Diagnostic {
    fn new(path: &Path, source: &str, error: ParseError) -> Self {
        Self {
            path: path.to_path_buf(),
            source: source.to_string(),
            error,
        }
    }

    fn parts(&self) -> (&Path, &str, &ParseError) {
        (&self.path, &self.source, &self.error)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

impl std::error::Error for Diagnostic {}

/// Print a compile error with the offending line and a caret under the
/// column.
fn print_diagnostic(path: &Path, source: &str, error: &ParseError) {
    let position = error.position;
    let line = source.lines().nth(position.line.saturating_sub(1)).unwrap_or("");
    let gutter = position.line.to_string().len();

    eprintln!(
        "{}{} {}",
        format!("error[{}]", error.kind).red().bold(),
        ":".bold(),
        error.message.bold()
    );
    eprintln!(
        "{:gutter$}{} {}:{position}",
        "",
        "-->".blue().bold(),
        path.display()
    );
    eprintln!("{:gutter$} {}", "", "|".blue().bold());
    eprintln!("{} {} {line}", position.line.blue().bold(), "|".blue().bold());
    eprintln!(
        "{:gutter$} {} {}{}",
        "",
        "|".blue().bold(),
        " ".repeat(position.column.saturating_sub(1)),
        "^".red().bold()
    );
}
