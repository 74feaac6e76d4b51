mod scene;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use worldquat_gameplay::TRACK_ENABLED;
use worldquat_input::InputSnapshot;
use worldquat_tools::{TreeOptions, WorldInspector, format_tree};

use scene::{DemoConfig, Driver, Scene};

#[derive(Parser)]
#[command(name = "worldquat-cli", about = "Headless driver for the worldquat demo scene")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and a summary of the demo scene
    Info,
    /// Print the demo cube's asset tree
    Tree {
        /// Include capability tags
        #[arg(long)]
        caps: bool,
        /// Include node ids
        #[arg(long)]
        ids: bool,
    },
    /// Run frames through the world and report what happened
    Simulate {
        /// Number of frames to run
        #[arg(short, long, default_value = "120")]
        frames: u64,
        /// Seconds per frame
        #[arg(long, default_value = "0.016")]
        dt: f64,
        /// Drive the cube with the scripted bot instead of held keys
        #[arg(long)]
        bot: bool,
        /// Free camera with the cube turning to track it
        #[arg(long)]
        track: bool,
        /// JSON file with scene tuning
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Keys a player would hold for the whole run.
fn scripted_input(track: bool) -> InputSnapshot {
    if track {
        InputSnapshot::with_held(["KeyD"]).set_toggle(TRACK_ENABLED, true)
    } else {
        InputSnapshot::with_held(["ArrowUp", "Space"])
    }
}

fn report(scene: &Scene) {
    let world = &scene.world;
    println!("{}", WorldInspector::summary(world));
    for id in [scene.cube, scene.render_camera] {
        if let Some(info) = WorldInspector::inspect_node(world, id) {
            println!("  {info}");
        }
    }
    for (owner, stats) in scene.shots.borrow().iter() {
        let owner = owner.map_or_else(|| "unowned".to_string(), |p| p.to_string());
        println!(
            "  {owner}: shots={} dry_fires={}",
            stats.shots, stats.dry_fires
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("worldquat-cli v{}", env!("CARGO_PKG_VERSION"));
            let scene = scene::build(&DemoConfig::default(), Driver::Player, false)?;
            println!("{}", WorldInspector::summary(&scene.world));
            println!("entities: {:?}", WorldInspector::list_entities(&scene.world));
        }
        Commands::Tree { caps, ids } => {
            let scene = scene::build(&DemoConfig::default(), Driver::Player, false)?;
            let opts = TreeOptions {
                show_caps: caps,
                show_ids: ids,
                ..TreeOptions::default()
            };
            print!("{}", format_tree(&scene.world, scene.cube, opts));
            print!("{}", format_tree(&scene.world, scene.render_camera, opts));
        }
        Commands::Simulate {
            frames,
            dt,
            bot,
            track,
            config,
        } => {
            if !dt.is_finite() || dt < 0.0 {
                bail!("--dt must be a non-negative number, got {dt}");
            }
            let cfg = match &config {
                Some(path) => DemoConfig::load(path)?,
                None => DemoConfig::default(),
            };
            let driver = if bot { Driver::Bot } else { Driver::Player };
            let mut scene = scene::build(&cfg, driver, track)?;

            println!("Simulating {frames} frames at dt={dt} ({driver:?}, track={track})");
            let input = scripted_input(track);
            for _ in 0..frames {
                match driver {
                    Driver::Player => scene.world.step(dt, Some(&input)),
                    Driver::Bot => scene.world.step(dt, None),
                }
            }
            debug!(leftover = scene.world.events().len(), "simulation done");
            report(&scene);
        }
    }

    Ok(())
}
