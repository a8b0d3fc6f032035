use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, Level};

use tracon_sim::airport::AirportData;
use tracon_sim::config::{Density, RunwayConfig, ScenarioType, SessionConfig, WeatherConfig};
use tracon_sim::session::Session;

#[derive(Parser)]
#[command(name = "tracon-sim")]
#[command(about = "TRACON sector training simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session on its own wall-clock timer until Ctrl+C.
    Run {
        #[arg(long)]
        airport: PathBuf,

        #[arg(long, value_enum, default_value_t = DensityArg::Moderate)]
        density: DensityArg,

        #[arg(long, value_enum, default_value_t = ScenarioArg::Mixed)]
        scenario: ScenarioArg,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Step a session forward a fixed number of ticks and report the final
    /// state, without a real-time wall clock. Useful for smoke-testing an
    /// airport data file or a scoring scenario.
    Demo {
        #[arg(long)]
        airport: PathBuf,

        #[arg(long, default_value_t = 60)]
        ticks: u64,

        #[arg(long, value_enum, default_value_t = DensityArg::Moderate)]
        density: DensityArg,

        #[arg(long, value_enum, default_value_t = ScenarioArg::Mixed)]
        scenario: ScenarioArg,

        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DensityArg {
    Light,
    Moderate,
    Heavy,
}

impl From<DensityArg> for Density {
    fn from(value: DensityArg) -> Self {
        match value {
            DensityArg::Light => Density::Light,
            DensityArg::Moderate => Density::Moderate,
            DensityArg::Heavy => Density::Heavy,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioArg {
    Arrivals,
    Departures,
    Mixed,
}

impl From<ScenarioArg> for ScenarioType {
    fn from(value: ScenarioArg) -> Self {
        match value {
            ScenarioArg::Arrivals => ScenarioType::Arrivals,
            ScenarioArg::Departures => ScenarioType::Departures,
            ScenarioArg::Mixed => ScenarioType::Mixed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { airport, density, scenario, seed } => run_live(airport, density.into(), scenario.into(), seed).await,
        Commands::Demo { airport, ticks, density, scenario, seed } => run_demo(airport, ticks, density.into(), scenario.into(), seed),
    }
}

fn session_config(airport: &AirportData, density: Density, scenario_type: ScenarioType, seed: Option<u64>) -> SessionConfig {
    let mut runways = airport.runways.iter().map(|r| r.id.clone());
    let arrival_runways = runways.next().into_iter().collect();
    let departure_runways = runways.next().into_iter().collect();

    SessionConfig {
        airport_icao: airport.icao.clone(),
        density,
        scenario_type,
        runway_config: RunwayConfig { arrival_runways, departure_runways },
        weather: WeatherConfig::default(),
        rng_seed: seed,
    }
}

fn run_demo(airport_path: PathBuf, ticks: u64, density: Density, scenario_type: ScenarioType, seed: Option<u64>) -> Result<()> {
    let airport = AirportData::load(&airport_path)?;
    let config = session_config(&airport, density, scenario_type, seed);
    let icao = airport.icao.clone();

    let mut session = Session::new("demo", config, airport);
    session.start();
    for _ in 0..ticks {
        session.tick();
    }

    let snapshot = session.snapshot();
    info!(
        airport = %icao,
        tick = snapshot.tick,
        aircraft = snapshot.aircraft.len(),
        score = snapshot.score.overall_score,
        grade = ?snapshot.score.grade,
        "demo run complete"
    );
    for ac in &snapshot.aircraft {
        info!(
            callsign = %ac.callsign,
            phase = ?ac.phase,
            altitude_ft = ac.altitude_ft,
            heading_deg = ac.heading_deg,
            ground_speed_kt = ac.ground_speed_kt,
            "aircraft state"
        );
    }

    Ok(())
}

/// Drives a session in real time until Ctrl+C, logging a line per tick.
/// `_command_tx` is never sent on, but keeping it alive holds the channel
/// open so the session's receiver doesn't see a closed channel and spin.
async fn run_live(airport_path: PathBuf, density: Density, scenario_type: ScenarioType, seed: Option<u64>) -> Result<()> {
    let airport = AirportData::load(&airport_path)?;
    let config = session_config(&airport, density, scenario_type, seed);
    let icao = airport.icao.clone();

    let mut session = Session::new("live", config, airport);
    session.start();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })?;

    let (_command_tx, command_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel();

    let driver = tokio::spawn(session.run(command_rx, snapshot_tx, shutdown_rx));

    info!(airport = %icao, "session running, press ctrl-c to stop");
    while let Some(snapshot) = snapshot_rx.recv().await {
        info!(tick = snapshot.tick, aircraft = snapshot.aircraft.len(), score = snapshot.score.overall_score, "tick");
    }

    driver.await??;
    Ok(())
}
