use std::{fs::File, io::BufReader, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use nbody_galaxy::{Config, World};

/// Headless Barnes-Hut galaxy simulation
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// YAML file with simulation settings
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Number of stars (overrides the config file)
    #[arg(short, long)]
    stars: Option<usize>,
    /// Number of worker threads (overrides the config file)
    #[arg(short, long)]
    workers: Option<usize>,
    /// Seed for the initial disc (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,
    /// Number of frames to simulate
    #[arg(short = 'n', long, default_value_t = 100)]
    steps: usize,
    /// Elapsed seconds fed to every frame
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,
    /// Log a progress line every this many frames
    #[arg(long, default_value_t = 10)]
    report_every: usize,
    /// Print the resolved settings as YAML and exit
    #[arg(long)]
    dump_config: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            serde_yaml::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(stars) = args.stars {
        config.stars = stars;
    }
    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;

    if args.dump_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let mut world = World::new(config).context("failed to create world")?;
    let mut build = Duration::ZERO;
    let mut accel = Duration::ZERO;

    for frame in 1..=args.steps {
        world.step(args.dt)?;
        let stats = world.stats();
        build += stats.build;
        accel += stats.accel;

        if args.report_every > 0 && frame % args.report_every == 0 {
            log::info!(
                "frame {frame}: {} nodes, build {:?}, accel {:?}",
                stats.nodes,
                stats.build,
                stats.accel
            );
        }
    }

    let extent = world
        .positions()
        .iter()
        .fold(0.0f32, |extent, p| extent.max(p.x.abs()).max(p.y.abs()));
    let steps = args.steps.max(1) as u32;
    println!(
        "{} stars, {} workers, {} frames: mean build {:?}, mean accel {:?}, extent {extent:.1}",
        world.stars().len(),
        world.workers(),
        world.frame(),
        build / steps,
        accel / steps,
    );

    Ok(())
}
