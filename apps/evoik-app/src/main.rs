//! evoik command-line interface.
//!
//! Provides two modes of operation:
//! - `solve`: Load a URDF, chase one target with one tip, and report per-frame stats
//! - `info`: Print workspace crate versions and the default configuration

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use nalgebra::Vector3;
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use evoik_core::prelude::*;
use evoik_kinematics::MotionType;
use evoik_solver::prelude::*;
use evoik_urdf::{ImportOptions, UrdfError};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Evolutionary inverse kinematics for URDF robots.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a tip link toward a world position.
    Solve {
        /// URDF robot description.
        #[arg(long)]
        urdf: PathBuf,

        /// Link whose origin should reach the target.
        #[arg(long)]
        tip: String,

        /// Target position in the root link's frame.
        #[arg(long, required = true, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
        target: Vec<f32>,

        /// Solver configuration (TOML).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of frames to run.
        #[arg(short, long, default_value_t = 100)]
        frames: u32,

        /// Actuation time step per frame in seconds.
        #[arg(long, default_value_t = 0.01)]
        dt: f32,

        /// Random seed (overrides the configuration file).
        #[arg(short, long)]
        seed: Option<u64>,

        /// How joints follow their solved targets.
        #[arg(long, value_enum, default_value_t = Motion::Teleport)]
        motion: Motion,

        /// Acceleration bound for smooth and lively motion.
        #[arg(long, default_value_t = 10.0)]
        max_acceleration: f32,
    },

    /// Print crate information.
    Info,
}

#[derive(Clone, Copy, ValueEnum)]
enum Motion {
    Teleport,
    Smooth,
    Lively,
}

impl From<Motion> for MotionType {
    fn from(motion: Motion) -> Self {
        match motion {
            Motion::Teleport => Self::Teleport,
            Motion::Smooth => Self::Smooth,
            Motion::Lively => Self::Lively,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Urdf(#[from] UrdfError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Solver(#[from] EvoIkError),

    #[error("link '{0}' not found in robot")]
    UnknownLink(String),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

struct SolveArgs<'a> {
    urdf: &'a Path,
    tip: &'a str,
    target: Vector3<f32>,
    config: Option<&'a Path>,
    frames: u32,
    dt: f32,
    seed: Option<u64>,
    options: ImportOptions,
}

fn run_solve(args: &SolveArgs<'_>) -> Result<(), AppError> {
    let robot = evoik_urdf::parse_file(args.urdf)?;
    let topology = evoik_urdf::load_topology_with(&robot, &args.options)?;
    let root = topology
        .find(&robot.root_link)
        .ok_or_else(|| AppError::UnknownLink(robot.root_link.clone()))?;
    let tip = topology
        .find(args.tip)
        .ok_or_else(|| AppError::UnknownLink(args.tip.to_owned()))?;

    let mut config = match args.config {
        Some(path) => SolverConfig::from_file(path)?,
        None => SolverConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let objective = Objective::position(args.target);
    let mut solver = Solver::new(topology, root, vec![Tip::new(tip, objective)], config)?;
    info!(
        robot = %robot.name,
        dof = solver.evolution().dimensionality(),
        tip = args.tip,
        "solving"
    );

    let mut generations = 0;
    let mut converged_at = None;
    for frame in 0..args.frames {
        let report = solver.step_frame();
        solver.actuate(args.dt);
        generations += report.stats.generations;

        let residual = solver.residuals().first().map_or(f32::NAN, |r| r.position);
        debug!(
            frame,
            generations = report.stats.generations,
            wipeouts = report.stats.wipeouts,
            converged = report.converged,
            residual,
            "frame"
        );
        if report.converged && converged_at.is_none() {
            converged_at = Some(frame);
            info!(frame, residual, "converged");
        }
    }

    println!(
        "frames={}, generations={}, wipeouts={}, converged={}",
        args.frames,
        generations,
        solver.evolution().wipeouts(),
        converged_at.map_or_else(|| "no".to_owned(), |f| format!("frame {f}")),
    );
    let topology = solver.topology();
    for motion in solver.evolution().model().motions() {
        let name = topology
            .segment(motion.segment)
            .map_or("?", |s| s.name());
        let value = topology
            .joint(motion.segment)
            .map_or(f32::NAN, |j| j.motion(motion.axis).current());
        println!("  {name:<24} {value:>9.4}");
    }
    if let Some(pose) = topology.current_world_poses().get(tip.index()) {
        let p = pose.position;
        println!("tip {} at ({:.4}, {:.4}, {:.4})", args.tip, p.x, p.y, p.z);
    }
    Ok(())
}

fn run_info() -> Result<(), AppError> {
    println!("evoik v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  evoik-core       {}", env!("CARGO_PKG_VERSION"));
    println!("  evoik-kinematics {}", env!("CARGO_PKG_VERSION"));
    println!("  evoik-urdf       {}", env!("CARGO_PKG_VERSION"));
    println!("  evoik-solver     {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("default configuration:");
    print!("{}", toml::to_string(&SolverConfig::default())?);
    println!();
    println!("edition: 2024");
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Solve {
            urdf,
            tip,
            target,
            config,
            frames,
            dt,
            seed,
            motion,
            max_acceleration,
        } => run_solve(&SolveArgs {
            urdf: &urdf,
            tip: &tip,
            target: Vector3::from_column_slice(&target),
            config: config.as_deref(),
            frames,
            dt,
            seed,
            options: ImportOptions {
                motion_type: motion.into(),
                max_acceleration,
            },
        }),
        Commands::Info => run_info(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
