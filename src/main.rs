//! Shape Panel server entry point
//!
//! Loads settings, seeds the initial population, starts the simulation clock
//! and serves the HTTP/WebSocket surface.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use shape_panel::server::{self, AppState};
use shape_panel::{Settings, ShapeCounts, SimError};

#[derive(Debug, Parser)]
#[command(name = "shape-panel", version, about = "Bouncing shapes streamed over WebSocket")]
struct Cli {
    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides settings)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings)
    #[arg(short, long)]
    port: Option<u16>,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Initial circles
    #[arg(long)]
    circles: Option<u32>,

    /// Initial rectangles
    #[arg(long)]
    rects: Option<u32>,

    /// Initial triangles
    #[arg(long)]
    triangles: Option<u32>,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if self.seed.is_some() {
            settings.seed = self.seed;
        }

        let initial = &mut settings.initial_shapes;
        if let Some(circles) = self.circles {
            initial.circles = circles;
        }
        if let Some(rects) = self.rects {
            initial.rects = rects;
        }
        if let Some(triangles) = self.triangles {
            initial.triangles = triangles;
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Shape Panel starting...");

    if let Err(err) = run(Cli::parse()).await {
        log::error!("{err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), SimError> {
    let mut settings = Settings::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut settings);
    settings.validate()?;

    let state = AppState::from_settings(&settings);

    let initial: ShapeCounts = settings.initial_shapes;
    if initial.total() > 0 {
        state.sim.initialize(initial);
    }

    let clock = state.sim.clock(settings.timing()).spawn();

    let listener = TcpListener::bind(settings.bind_address()).await?;
    let result = server::serve(listener, state).await;
    clock.abort();
    result
}
