use cavity_lbm::{Config, LBMSolver, OutputSink};
use anyhow::Result;
use log::info;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let config = match args.len() {
        1 => {
            info!("No configuration given, using defaults");
            Config::default()
        }
        2 => {
            info!("Loading configuration from: {}", args[1]);
            Config::from_file(&args[1])?
        }
        _ => {
            eprintln!("Usage: {} [config.json]", args[0]);
            eprintln!("  config.json - JSON file containing simulation parameters");
            std::process::exit(1);
        }
    };

    info!("Simulation parameters:");
    info!("  Domain: {}^3, moving face {:?}", config.domain.dim, config.domain.moving_face);
    info!("  Viscosity: {}", config.physics.viscosity);
    info!("  Wall velocity: {:?}", config.physics.wall_velocity);
    info!("  Iterations: {}", config.simulation.iterations);
    info!("  Sample every: {}", config.simulation.sample_every);
    info!("  Tau (relaxation time): {}", config.tau());

    // Create and run solver
    let mut solver = LBMSolver::new(config).await?;
    let mut sink = OutputSink::new(solver.config())?;
    let metrics = solver.run(&mut sink)?;

    println!("{}", metrics.summary());
    info!("Output files written to: {}", solver.config().output.output_directory);

    Ok(())
}
