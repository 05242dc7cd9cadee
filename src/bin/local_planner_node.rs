use anyhow::{anyhow, bail, Context, Result};
use prometheus_local_planner::control::SimulatedMover;
use prometheus_local_planner::navigation::{
    GeometryCache, InMemoryObstacleMap, NavigationStack, PlannerEvent,
};
use prometheus_local_planner::perception::SimulatedRangeSensor;
use prometheus_local_planner::{LocalPlannerConfig, NavigationError, Point2D, Pose};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

enum Command {
    Goal(Point2D),
    Quit,
}

/// Operator commands, one per line: `goal <x> <y>` or `quit`
fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    match words.next() {
        None => Ok(None),
        Some("quit") | Some("exit") => Ok(Some(Command::Quit)),
        Some("goal") => {
            let x: f64 = words
                .next()
                .ok_or_else(|| anyhow!("goal needs an x coordinate"))?
                .parse()
                .context("goal x is not a number")?;
            let y: f64 = words
                .next()
                .ok_or_else(|| anyhow!("goal needs a y coordinate"))?
                .parse()
                .context("goal y is not a number")?;
            if words.next().is_some() {
                bail!("goal takes exactly two coordinates");
            }
            Ok(Some(Command::Goal(Point2D::new(x, y))))
        }
        Some(other) => bail!("unknown command `{}`", other),
    }
}

/// Arguments are an optional config file followed by `name=value` overrides
fn load_config(args: &[String]) -> Result<LocalPlannerConfig> {
    let mut config = LocalPlannerConfig::default();
    let mut params = HashMap::new();
    for arg in args {
        match arg.split_once('=') {
            Some((name, value)) => {
                let value: f64 = value
                    .parse()
                    .with_context(|| format!("parameter {} is not a number", name))?;
                params.insert(name.to_string(), value);
            }
            None => {
                config = LocalPlannerConfig::load(Path::new(arg))
                    .with_context(|| format!("failed to load configuration from {}", arg))?;
            }
        }
    }
    config.planner.configure(&params)?;
    Ok(config)
}

fn log_event(event: &PlannerEvent) {
    match event {
        PlannerEvent::TargetSet { root } => info!("event: target set to {}", root),
        PlannerEvent::TargetSelected {
            target,
            changed,
            direct,
        } => debug!(
            "event: heading for {} (changed: {}, direct: {})",
            target, changed, direct
        ),
        PlannerEvent::PositionChanged { pose } => debug!("event: at {}", pose.position),
        PlannerEvent::Sensed { pose, outcome } => debug!(
            "event: sensed at {}: {} new hits, {} known, {} candidates",
            pose.position, outcome.obstacles_recorded, outcome.hits_known, outcome.candidates_added
        ),
        PlannerEvent::CandidateBlocked { coordinate } => {
            info!("event: candidate {} blocked", coordinate)
        }
        PlannerEvent::Arrived { position } => info!("event: arrived at {}", position),
        PlannerEvent::Unreachable { root } => warn!("event: {} is unreachable", root),
        PlannerEvent::Abandoned { root } => warn!("event: gave up on {}", root),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = load_config(&args)?;
    info!("Starting local planner node with {:?}", config.planner);

    let world = config.simulation.world()?;
    let map = Arc::new(InMemoryObstacleMap::with_cache(GeometryCache::new(
        config.planner.geometry_cache_capacity,
    )));
    let sensor = Arc::new(SimulatedRangeSensor::new(
        world.clone(),
        config.simulation.sensor_max_range,
        config.simulation.sensor_rays,
    ));
    let mover = Box::new(SimulatedMover::new(Pose::default(), world));
    let nav = NavigationStack::new(config.planner.clone(), map, sensor, mover);
    let handle = nav.planner_handle();

    // the event channel is std mpsc, so drain it off the async workers
    let events = handle.subscribe()?;
    tokio::task::spawn_blocking(move || {
        for event in events {
            log_event(&event);
        }
    });

    let (goal_tx, mut goal_rx) = mpsc::channel::<Point2D>(8);

    let worker = tokio::spawn(async move {
        let mut nav = nav;
        while let Some(goal) = goal_rx.recv().await {
            let (returned, result) = tokio::task::spawn_blocking(move || {
                let result = nav.navigate_to(goal);
                (nav, result)
            })
            .await?;
            nav = returned;

            match result {
                Ok(report) => info!(
                    "Goal reached in {} steps; simplified path {:.2} m over {} points",
                    report.steps,
                    report.simplified.total_cost(),
                    report.simplified.len()
                ),
                Err(NavigationError::Unreachable { target }) => {
                    warn!("No path to {}", target)
                }
                Err(err) => error!("Navigation failed: {}", err),
            }
        }
        Ok::<(), anyhow::Error>(())
    });

    info!("Ready. Commands: `goal <x> <y>`, `quit`");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(Some(Command::Goal(goal))) => {
                // redirects only land while an episode holds an active target
                if handle.redirect(goal)? {
                    info!("Redirected running episode to {}", goal);
                } else {
                    goal_tx.send(goal).await?;
                }
            }
            Ok(Some(Command::Quit)) => break,
            Ok(None) => {}
            Err(err) => warn!("Ignoring command: {:#}", err),
        }
    }

    drop(goal_tx);
    worker.await??;
    info!("Local planner node stopped");
    Ok(())
}
