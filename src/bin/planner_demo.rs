use anyhow::{Context, Result};
use prometheus_local_planner::control::SimulatedMover;
use prometheus_local_planner::navigation::{GeometryCache, InMemoryObstacleMap, NavigationStack};
use prometheus_local_planner::perception::SimulatedRangeSensor;
use prometheus_local_planner::{LocalPlannerConfig, Point2D, Pose};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // usage: planner_demo [config.toml] [goal_x goal_y]
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.first() {
        Some(path) => LocalPlannerConfig::load(Path::new(path))
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => LocalPlannerConfig::default(),
    };
    let goal = match (args.get(1), args.get(2)) {
        (Some(x), Some(y)) => Point2D::new(
            x.parse().context("goal x is not a number")?,
            y.parse().context("goal y is not a number")?,
        ),
        _ => Point2D::new(10.0, 0.0),
    };

    let world = config.simulation.world()?;
    println!("Simulated world has {} obstacles", world.len());

    let map = Arc::new(InMemoryObstacleMap::with_cache(GeometryCache::new(
        config.planner.geometry_cache_capacity,
    )));
    let sensor = Arc::new(SimulatedRangeSensor::new(
        world.clone(),
        config.simulation.sensor_max_range,
        config.simulation.sensor_rays,
    ));
    let mover = Box::new(SimulatedMover::new(Pose::default(), world));
    let mut nav = NavigationStack::new(config.planner.clone(), map.clone(), sensor, mover);

    let report = nav.navigate_to(goal)?;

    println!("Reached {} in {} steps", goal, report.steps);
    println!(
        "Traveled path: {} points, {:.2} m",
        report.solution.len(),
        report.solution.total_cost()
    );
    for entry in report.solution.entries() {
        println!("  {} ({:.2} m to go)", entry.point, entry.cost);
    }
    println!(
        "Simplified path: {} points, {:.2} m",
        report.simplified.len(),
        report.simplified.total_cost()
    );
    for entry in report.simplified.entries() {
        println!("  {}", entry.point);
    }
    println!("Obstacles recorded: {}", map.len()?);

    Ok(())
}
