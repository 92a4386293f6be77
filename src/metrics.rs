use std::time::Duration;

/// Time spent in each sub-step of the update cycle.
///
/// Backends that submit a whole iteration at once (the GPU path) account it
/// under `fused` instead of splitting it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimings {
    pub boundary: Duration,
    pub collision: Duration,
    pub streaming: Duration,
    pub fused: Duration,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.boundary + self.collision + self.streaming + self.fused
    }
}

/// Returned by a run in place of global timing state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetrics {
    pub backend: String,
    pub iterations: usize,
    /// Cells inside the wall shell, the ones a lattice update is counted for.
    pub wet_cells: usize,
    pub samples: usize,
    pub total: Duration,
    pub compute: Duration,
    pub readback: Duration,
    pub phases: PhaseTimings,
}

impl RunMetrics {
    pub fn new(backend: impl Into<String>, wet_cells: usize) -> Self {
        Self {
            backend: backend.into(),
            wet_cells,
            ..Default::default()
        }
    }

    /// Million lattice updates per second over the whole run, sampling included.
    pub fn mlups(&self) -> f64 {
        lattice_updates_per_us(self.wet_cells, self.iterations, self.total)
    }

    /// Million lattice updates per second counting compute time only.
    pub fn compute_mlups(&self) -> f64 {
        lattice_updates_per_us(self.wet_cells, self.iterations, self.compute)
    }

    pub fn summary(&self) -> String {
        format!(
            "backend {}: {} iterations, {} samples | total {:.3} ms ({:.2} MLUPS) | compute {:.3} ms ({:.2} MLUPS) | readback {:.3} ms",
            self.backend,
            self.iterations,
            self.samples,
            self.total.as_secs_f64() * 1e3,
            self.mlups(),
            self.compute.as_secs_f64() * 1e3,
            self.compute_mlups(),
            self.readback.as_secs_f64() * 1e3,
        )
    }
}

fn lattice_updates_per_us(cells: usize, iterations: usize, elapsed: Duration) -> f64 {
    let micros = elapsed.as_secs_f64() * 1e6;
    if micros == 0.0 {
        return 0.0;
    }
    (cells * iterations) as f64 / micros
}
