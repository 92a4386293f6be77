pub mod backend;
pub mod cell;
pub mod config;
pub mod distribution;
pub mod gpu;
pub mod grid;
pub mod kernels;
pub mod lattice;
pub mod layout;
pub mod macroscopic;
pub mod metrics;
pub mod output;
pub mod solver;

pub use backend::{Backend, CpuBackend};
pub use cell::CellType;
pub use config::{BackendKind, Config, ConfigError, Face};
pub use distribution::Distributions;
pub use gpu::GPUContext;
pub use grid::{CellMap, Grid};
pub use lattice::{CellMoments, D3Q19};
pub use layout::Layout;
pub use macroscopic::{MacroscopicFields, Snapshot};
pub use metrics::{PhaseTimings, RunMetrics};
pub use output::{OutputSink, VTKWriter};
pub use solver::{LBMSolver, NullSink, SnapshotSink};

pub type Float = f32;
