//! # Sentinel Simulator
//!
//! Headless driver for the Sentinel NPC subsystem.
//!
//! Runs a fixed-step loop over a two-room demo level:
//! - Level: navmesh and walls of two rooms joined by a corridor
//! - Session: melee, ranged and caster NPCs against a scripted target

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod level;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use sentinel_ai::{AiConfig, NpcCatalog};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::session::Simulation;

const FIXED_DT: f32 = 1.0 / 60.0;
const BUILTIN_CATALOG: &str = include_str!("../assets/npcs.ron");

/// Command line options.
#[derive(Debug, Parser)]
#[command(name = "sentinel-sim", version, about = "Runs Sentinel NPCs headless")]
struct Args {
    /// AI configuration file (TOML); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// NPC catalog (RON); the built-in demo catalog is used when omitted
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Number of fixed 1/60 s steps to simulate
    #[arg(long, default_value_t = 3600)]
    ticks: u64,

    /// Seed for every random roll in the session
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn load_config(path: Option<&PathBuf>) -> AiConfig {
    path.map_or_else(AiConfig::default, AiConfig::load_from)
}

fn load_catalog(path: Option<&PathBuf>) -> Result<NpcCatalog> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?,
        None => BUILTIN_CATALOG.to_owned(),
    };
    Ok(NpcCatalog::from_ron_str(&text)?)
}

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("sentinel=info".parse()?))
        .init();

    let args = Args::parse();
    info!("Sentinel simulator {}", env!("CARGO_PKG_VERSION"));

    let config = load_config(args.config.as_ref());
    let catalog = load_catalog(args.catalog.as_ref())?;
    let mut sim = Simulation::new(config, catalog, args.seed)?;

    for _ in 0..args.ticks {
        sim.tick(FIXED_DT);
    }

    let stats = sim.stats();
    info!(?stats, remaining = sim.npc_count(), "Simulation finished");
    println!(
        "{} ticks: {} melee, {}/{} shots hit, {} skills, {} NPC deaths, {} target deaths, {} teleports, {} NPCs left",
        stats.ticks,
        stats.melee_attacks,
        stats.shots_hit,
        stats.shots,
        stats.skills,
        stats.npc_deaths,
        stats.target_deaths,
        stats.teleports,
        sim.npc_count(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["sentinel-sim"]);
        assert_eq!(args.ticks, 3600);
        assert_eq!(args.seed, 1);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = load_catalog(None).expect("catalog");
        assert!(catalog.npc(sentinel_common::NpcTypeId::new(3)).is_some());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("ai.toml");
        let mut config = AiConfig::default();
        config.brain.neglect_timeout = 9.0;
        config.save_to(&path).expect("save");

        let loaded = load_config(Some(&path));
        assert!((loaded.brain.neglect_timeout - 9.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_catalog_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("missing.ron");
        assert!(load_catalog(Some(&path)).is_err());
        fs::write(&path, "not ron").expect("write");
        assert!(load_catalog(Some(&path)).is_err());
    }
}
