use std::sync::Arc;
use std::time::Instant;
use anyhow::Result;
use log::{debug, info};
use crate::{
    backend::{Backend, CpuBackend},
    config::{BackendKind, Config},
    distribution::Distributions,
    gpu::GPUContext,
    grid::{CellMap, Grid},
    kernels::{StepParams, init::initialize},
    layout::Layout,
    macroscopic::{MacroscopicFields, Snapshot},
    metrics::RunMetrics,
};

/// Receives sampled state while a run is in progress.
pub trait SnapshotSink {
    fn on_sample(&mut self, snapshot: &Snapshot) -> Result<()>;

    /// Called after every completed iteration.
    fn on_iteration(&mut self, _iteration: usize) {}

    /// Called once after the last iteration.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink that discards every sample.
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn on_sample(&mut self, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }
}

pub struct LBMSolver {
    config: Config,
    map: Arc<CellMap>,
    layout: Layout,
    backend: Box<dyn Backend>,
    iteration: usize,
}

impl LBMSolver {
    /// Builds the solver on the backend named in the configuration.
    pub async fn new(config: Config) -> Result<Self> {
        let (map, layout, buffers) = prepare(&config)?;
        let backend: Box<dyn Backend> = match config.simulation.backend {
            BackendKind::Cpu => Box::new(CpuBackend::new(
                Arc::clone(&map),
                StepParams::from_config(&config),
                buffers,
            )),
            BackendKind::Gpu => Box::new(GPUContext::new(&config, &map, &buffers).await?),
        };
        info!("Backend: {}", backend.name());

        Ok(Self {
            config,
            map,
            layout,
            backend,
            iteration: 0,
        })
    }

    /// Builds the solver on the host backend regardless of `simulation.backend`.
    pub fn cpu(config: Config) -> Result<Self> {
        let (map, layout, buffers) = prepare(&config)?;
        let backend = CpuBackend::new(Arc::clone(&map), StepParams::from_config(&config), buffers);
        info!("Backend: {}", backend.name());

        Ok(Self {
            config,
            map,
            layout,
            backend: Box::new(backend),
            iteration: 0,
        })
    }

    /// Runs from the current iteration up to `simulation.iterations`,
    /// sampling at iteration 0 and every `sample_every` iterations.
    pub fn run(&mut self, sink: &mut dyn SnapshotSink) -> Result<RunMetrics> {
        let target = self.config.simulation.iterations;
        let every = self.config.simulation.sample_every;
        info!("Starting LBM simulation for {} iterations", target.saturating_sub(self.iteration));

        let mut metrics = RunMetrics::new(self.backend.name(), self.config.wet_cells());
        let start = Instant::now();

        if self.should_sample(every) {
            self.sample(sink, &mut metrics)?;
        }

        while self.iteration < target {
            let step_start = Instant::now();
            self.step()?;
            metrics.compute += step_start.elapsed();
            metrics.iterations += 1;

            sink.on_iteration(self.iteration);
            if self.should_sample(every) {
                self.sample(sink, &mut metrics)?;
            }
        }

        sink.finish()?;
        metrics.total = start.elapsed();
        metrics.phases = self.backend.timings();

        info!("Simulation completed {} iterations", self.iteration);
        info!("{}", metrics.summary());
        Ok(metrics)
    }

    /// One full iteration: boundary, collision, streaming, swap.
    pub fn step(&mut self) -> Result<()> {
        self.backend.step()?;
        self.iteration += 1;
        Ok(())
    }

    pub fn boundary(&mut self) -> Result<()> {
        self.backend.boundary()
    }

    pub fn collide(&mut self) -> Result<()> {
        self.backend.collide()
    }

    pub fn stream(&mut self) -> Result<()> {
        self.backend.stream()
    }

    /// Exchanges the buffer roles, completing the current iteration.
    pub fn swap(&mut self) {
        self.backend.swap();
        self.iteration += 1;
    }

    /// Host copy of the current collide buffer.
    pub fn distributions(&mut self) -> Result<Distributions> {
        self.backend.download()
    }

    pub fn macroscopic(&mut self) -> Result<MacroscopicFields> {
        let distributions = self.backend.download()?;
        Ok(MacroscopicFields::compute(&distributions, &self.map))
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn map(&self) -> &CellMap {
        &self.map
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn should_sample(&self, every: usize) -> bool {
        every > 0 && self.iteration % every == 0
    }

    fn sample(&mut self, sink: &mut dyn SnapshotSink, metrics: &mut RunMetrics) -> Result<()> {
        let start = Instant::now();
        let distributions = self.backend.download()?;
        metrics.readback += start.elapsed();

        let fields = MacroscopicFields::compute(&distributions, &self.map);
        debug!(
            "Iteration {}: mass {:.6}, max |u| {:.6}",
            self.iteration,
            fields.total_mass(&self.map),
            fields.max_speed(&self.map)
        );

        sink.on_sample(&Snapshot {
            iteration: self.iteration,
            fields: &fields,
            distributions: &distributions,
            map: &self.map,
        })?;
        metrics.samples += 1;
        Ok(())
    }
}

/// Validates the configuration, then classifies the lattice and seeds both buffers.
fn prepare(config: &Config) -> Result<(Arc<CellMap>, Layout, [Distributions; 2])> {
    config.validate()?;

    let dim = config.domain.dim;
    info!("Initializing LBM solver with domain size: {}x{}x{}", dim, dim, dim);
    info!("Viscosity {}, tau {:.6}, omega {:.6}", config.physics.viscosity, config.tau(), config.omega());

    let grid = Grid::new(dim);
    let map = Arc::new(CellMap::classify(grid, config.domain.moving_face));
    info!(
        "Classified {} cells: {} fluid, {} boundary ({} moving), {} wall",
        map.len(),
        map.count(|c| c.is_fluid()),
        map.count(|c| c.is_boundary()),
        map.count(|c| c.is_moving()),
        map.count(|c| c.is_wall())
    );

    let layout = Layout::new(grid.cells(), config.layout.stride);
    info!("Layout: stride {}, {} blocks, {} values per buffer", layout.stride(), layout.blocks(), layout.len());

    let params = StepParams::from_config(config);
    let buffers = initialize(layout, &map, config.physics.density, &params.wall_velocity);
    Ok((map, layout, buffers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        samples: Vec<usize>,
        iterations: Vec<usize>,
        finished: bool,
    }

    impl SnapshotSink for Recorder {
        fn on_sample(&mut self, snapshot: &Snapshot) -> Result<()> {
            self.samples.push(snapshot.iteration);
            Ok(())
        }

        fn on_iteration(&mut self, iteration: usize) {
            self.iterations.push(iteration);
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.domain.dim = 6;
        config.layout.stride = 8;
        config.simulation.iterations = 7;
        config
    }

    #[test]
    fn samples_at_zero_and_every_interval() {
        let mut config = small_config();
        config.simulation.sample_every = 3;
        let mut solver = LBMSolver::cpu(config).unwrap();
        let mut recorder = Recorder::default();

        let metrics = solver.run(&mut recorder).unwrap();
        assert_eq!(recorder.samples, vec![0, 3, 6]);
        assert_eq!(recorder.iterations, (1..=7).collect::<Vec<_>>());
        assert!(recorder.finished);
        assert_eq!(metrics.iterations, 7);
        assert_eq!(metrics.samples, 3);
        assert_eq!(metrics.wet_cells, 64);
        assert_eq!(solver.iteration(), 7);
    }

    #[test]
    fn zero_interval_disables_sampling() {
        let mut config = small_config();
        config.simulation.sample_every = 0;
        let mut solver = LBMSolver::cpu(config).unwrap();
        let mut recorder = Recorder::default();

        let metrics = solver.run(&mut recorder).unwrap();
        assert!(recorder.samples.is_empty());
        assert_eq!(metrics.samples, 0);
        assert_eq!(metrics.readback, std::time::Duration::ZERO);
    }

    #[test]
    fn sub_steps_match_fused_step() {
        let config = small_config();
        let mut stepped = LBMSolver::cpu(config.clone()).unwrap();
        let mut manual = LBMSolver::cpu(config).unwrap();

        for _ in 0..3 {
            stepped.step().unwrap();
            manual.boundary().unwrap();
            manual.collide().unwrap();
            manual.stream().unwrap();
            manual.swap();
        }
        assert_eq!(stepped.iteration(), manual.iteration());
        assert_eq!(stepped.distributions().unwrap(), manual.distributions().unwrap());
    }

    #[test]
    fn invalid_config_builds_nothing() {
        let mut config = small_config();
        config.domain.dim = 2;
        assert!(LBMSolver::cpu(config).is_err());
    }
}
