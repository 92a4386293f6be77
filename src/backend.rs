use std::sync::Arc;
use std::time::Instant;
use anyhow::Result;
use crate::{
    distribution::Distributions,
    grid::CellMap,
    kernels::{self, StepParams},
    metrics::PhaseTimings,
};

/// Physical buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferId {
    A,
    B,
}

impl BufferId {
    pub fn other(self) -> Self {
        match self {
            BufferId::A => BufferId::B,
            BufferId::B => BufferId::A,
        }
    }

    pub fn slot(self) -> usize {
        match self {
            BufferId::A => 0,
            BufferId::B => 1,
        }
    }
}

/// Binding of the collide and stream-target roles to the two buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPong {
    collide: BufferId,
}

impl Default for PingPong {
    fn default() -> Self {
        Self { collide: BufferId::A }
    }
}

impl PingPong {
    pub fn collide(&self) -> BufferId {
        self.collide
    }

    pub fn target(&self) -> BufferId {
        self.collide.other()
    }

    pub fn swap(&mut self) {
        self.collide = self.collide.other();
    }
}

/// Execution substrate for the update cycle.
///
/// Sub-steps must be called in the order boundary, collide, stream, swap.
/// `download` returns the current collide buffer and only after every
/// previously issued sub-step has completed.
pub trait Backend {
    fn name(&self) -> &str;

    fn boundary(&mut self) -> Result<()>;

    fn collide(&mut self) -> Result<()>;

    fn stream(&mut self) -> Result<()>;

    fn swap(&mut self);

    fn step(&mut self) -> Result<()> {
        self.boundary()?;
        self.collide()?;
        self.stream()?;
        self.swap();
        Ok(())
    }

    fn download(&mut self) -> Result<Distributions>;

    fn timings(&self) -> PhaseTimings;
}

/// Host backend: every sub-step is a rayon pass over layout blocks.
pub struct CpuBackend {
    map: Arc<CellMap>,
    params: StepParams,
    buffers: [Distributions; 2],
    roles: PingPong,
    timings: PhaseTimings,
}

impl CpuBackend {
    pub fn new(map: Arc<CellMap>, params: StepParams, buffers: [Distributions; 2]) -> Self {
        Self {
            map,
            params,
            buffers,
            roles: PingPong::default(),
            timings: PhaseTimings::default(),
        }
    }

    pub fn roles(&self) -> PingPong {
        self.roles
    }

    /// Current collide buffer, without copying.
    pub fn collide_buffer(&self) -> &Distributions {
        &self.buffers[self.roles.collide().slot()]
    }

    fn collide_buffer_mut(&mut self) -> &mut Distributions {
        &mut self.buffers[self.roles.collide().slot()]
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn boundary(&mut self) -> Result<()> {
        let start = Instant::now();
        let (map, params) = (Arc::clone(&self.map), self.params);
        kernels::boundary::apply(self.collide_buffer_mut(), &map, &params);
        self.timings.boundary += start.elapsed();
        Ok(())
    }

    fn collide(&mut self) -> Result<()> {
        let start = Instant::now();
        let (map, params) = (Arc::clone(&self.map), self.params);
        kernels::collision::apply(self.collide_buffer_mut(), &map, &params);
        self.timings.collision += start.elapsed();
        Ok(())
    }

    fn stream(&mut self) -> Result<()> {
        let start = Instant::now();
        let [a, b] = &mut self.buffers;
        let (source, target) = match self.roles.collide() {
            BufferId::A => (&*a, b),
            BufferId::B => (&*b, a),
        };
        kernels::streaming::apply(source, target, &self.map);
        self.timings.streaming += start.elapsed();
        Ok(())
    }

    fn swap(&mut self) {
        self.roles.swap();
    }

    fn download(&mut self) -> Result<Distributions> {
        // Every pass has joined its workers by the time it returns.
        Ok(self.collide_buffer().clone())
    }

    fn timings(&self) -> PhaseTimings {
        self.timings
    }
}
