use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use foundation::{Position, RenderTarget, Viewpoint};
use multiview::{Host, MapKind, MultiViewConfig, MultiViewManager, SideViewKind, SideViewSelector};
use runtime::TokioSpawner;
use sim::SimHost;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Drives the side view engine against a simulated city.
#[derive(Debug, Parser)]
struct Args {
    /// Multi-view configuration (JSON). Defaults to four oblique directions.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Camera moves to simulate.
    #[arg(long, default_value_t = 8)]
    ticks: u32,
    /// Heading change per move (degrees).
    #[arg(long, default_value_t = 45.0)]
    heading_step: f64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => MultiViewConfig::load(path)?,
        None => MultiViewConfig::default(),
    };
    info!(config = %config.to_json(), "starting");

    tokio::task::LocalSet::new().run_until(run(args, config)).await
}

async fn run(args: Args, config: MultiViewConfig) -> anyhow::Result<()> {
    let sim = SimHost::city();
    let host = Host {
        spawner: Rc::new(TokioSpawner::new()),
        ..sim.host()
    };

    let manager = MultiViewManager::new(host.clone(), config.clone());
    manager.activate().await?;
    info!(views = manager.views().len(), "multi view active");

    let ground = Position::flat(10.0, 20.0);
    for tick in 0..args.ticks {
        let heading = f64::from(tick) * args.heading_step;
        sim.move_primary(Viewpoint::looking_at(ground, 500.0, heading));
        settle().await;
        info!(tick, heading, active_view = ?manager.active_view_index(), "primary moved");
    }
    if !manager.views().is_empty() {
        manager.jump_to_view(0).await?;
    }
    manager.destroy()?;
    let metrics = manager.metrics();
    info!(
        updates = metrics.counter("sync.updates"),
        dropped = metrics.counter("sync.dropped"),
        lookups = metrics.counter("sync.elevation_lookups"),
        "multi view done"
    );

    let selector = SideViewSelector::new(host, config, RenderTarget::new("side-panel"));
    let shown = selector.initialize().await?;
    info!(?shown, available = ?selector.available_kinds(), "side view shown");
    let flat = SideViewKind::Map(MapKind::Flat);
    if selector.available_kinds().contains(&flat) {
        selector.set_active(flat).await?;
        if selector.switch_views().await? {
            info!("primary and side view switched");
        }
    }
    let enabled = selector.toggle_sync().await;
    info!(enabled, "side view sync toggled");
    if let Err(err) = selector.destroy() {
        warn!(%err, "side view teardown incomplete");
    }
    Ok(())
}

/// Lets spawned sync tasks run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
