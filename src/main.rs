//! certrender CLI
//!
//! Reads service payloads from a file or stdin and prints the JSON response.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use certrender::batch::BatchOrchestrator;
use certrender::model::ErrorResponse;
use certrender::storage::{LocalStorage, MemoryStorage, ObjectStore, DEFAULT_PRESIGN_TTL_SECS};
use certrender::{CanvasSize, RenderConfig};

#[derive(Parser)]
#[command(name = "certrender")]
#[command(about = "Batch certificate renderer", long_about = None)]
struct Cli {
    /// Directory holding persisted artifacts
    #[arg(long, env = "CERTRENDER_STORAGE_ROOT", default_value = "./public")]
    storage_dir: PathBuf,

    /// Base URL presigned links point at
    #[arg(long, env = "CERTRENDER_PUBLIC_URL", default_value = "http://localhost:8000/file")]
    public_url: String,

    /// Secret used to sign presigned links
    #[arg(long, env = "CERTRENDER_PRESIGN_SECRET", default_value = "", hide_env_values = true)]
    signing_secret: String,

    /// Directory relative image sources resolve against
    #[arg(long, env = "CERTRENDER_ASSET_ROOT")]
    asset_root: Option<PathBuf>,

    /// Per-image fetch timeout in milliseconds
    #[arg(long, env = "CERTRENDER_IMAGE_TIMEOUT_MS", default_value_t = 10_000)]
    image_timeout_ms: u64,

    /// Skip embedded images entirely
    #[arg(long)]
    no_images: bool,

    /// Keep artifacts in memory instead of writing them
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one certificate per participant and bundle them
    Render {
        /// Request body (`-` for stdin)
        #[arg(long, default_value = "-")]
        request: String,
    },
    /// Render a preview of an unmodified design
    Thumbnail {
        #[arg(long, default_value = "-")]
        request: String,
        /// Overrides the request's width
        #[arg(long)]
        width: Option<u32>,
        /// Overrides the request's height
        #[arg(long)]
        height: Option<u32>,
    },
    /// Print a time-limited URL for a stored artifact
    Presign {
        #[arg(long)]
        key: String,
        #[arg(long, default_value_t = DEFAULT_PRESIGN_TTL_SECS)]
        ttl: u64,
    },
    /// List stored artifact keys
    List {
        #[arg(long, default_value = "")]
        prefix: String,
    },
}

fn read_request(source: &str) -> Result<Vec<u8>> {
    if source == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf).context("reading request from stdin")?;
        Ok(buf)
    } else {
        std::fs::read(source).with_context(|| format!("reading request from {}", source))
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the failure body and pick the exit status: 2 for caller mistakes
fn fail(summary: &str, err: &certrender::Error) -> Result<i32> {
    log::error!("{}: {}", summary, err);
    print_json(&ErrorResponse::new(summary, err))?;
    Ok(if err.is_client_error() { 2 } else { 1 })
}

async fn run(cli: Cli) -> Result<i32> {
    let store: Arc<dyn ObjectStore> = if cli.dry_run {
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(LocalStorage::new(&cli.storage_dir, cli.public_url, cli.signing_secret))
    };

    let config = RenderConfig {
        canvas: CanvasSize::default(),
        image_timeout_ms: cli.image_timeout_ms,
        enable_images: !cli.no_images,
        asset_root: cli.asset_root,
        ..Default::default()
    };

    match cli.command {
        Commands::Render { request } => {
            let body = read_request(&request)?;
            let orchestrator = BatchOrchestrator::with_canvas_renderer(config, store)?;
            match orchestrator.handle_render(&body).await {
                Ok(result) => print_json(&result).map(|_| 0),
                Err(e) => fail("Failed to process request", &e),
            }
        }
        Commands::Thumbnail { request, width, height } => {
            let body = read_request(&request)?;
            let orchestrator = BatchOrchestrator::with_canvas_renderer(config, store)?;
            let request = match certrender::model::ThumbnailRequest::from_json(&body) {
                Ok(request) => request,
                Err(e) => return fail("Failed to generate thumbnail", &e),
            };
            let width = width.or(request.width);
            let height = height.or(request.height);
            match orchestrator.render_thumbnail(&request.design, width, height).await {
                Ok(key) => print_json(&certrender::model::ThumbnailResponse::new(key)).map(|_| 0),
                Err(e) => fail("Failed to generate thumbnail", &e),
            }
        }
        Commands::Presign { key, ttl } => {
            let url = store.presign(&key, ttl).await?;
            println!("{}", url);
            Ok(0)
        }
        Commands::List { prefix } => {
            for key in store.list(&prefix).await? {
                println!("{}", key);
            }
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let code = run(cli).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
