use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::Float;

/// Largest work group the GPU backend accepts (wgpu's default
/// `max_compute_invocations_per_workgroup`).
pub const MAX_WORK_GROUP_INVOCATIONS: u32 = 256;

/// Per-axis work-group limits (wgpu's default `max_compute_workgroup_size_{x,y,z}`).
pub const MAX_WORK_GROUP_SIZE: [u32; 3] = [256, 256, 64];

/// Largest layout stride accepted.
pub const MAX_STRIDE: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub domain: DomainConfig,
    pub physics: PhysicsConfig,
    pub simulation: SimulationConfig,
    pub layout: LayoutConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Side of the cubic lattice, wall shell included.
    pub dim: usize,
    /// Face whose boundary cells are driven at `wall_velocity`; `None` closes the cavity.
    pub moving_face: Option<Face>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub viscosity: Float,
    pub wall_velocity: [Float; 3],
    pub density: Float,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub iterations: usize,
    /// Sample macroscopic fields every N iterations (0 disables sampling).
    pub sample_every: usize,
    pub backend: BackendKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Cells per block of the strided structure-of-arrays layout.
    pub stride: usize,
    /// Work-group shape of the GPU dispatch.
    pub work_group: [u32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_directory: String,
    pub write_vti: bool,
    pub dump_map: bool,
    pub dump_f: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    Left,
    Right,
    Bottom,
    Top,
    Back,
    Front,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Cpu,
    Gpu,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("lattice dimension must be at least 3, got {0}")]
    DimensionTooSmall(usize),

    #[error("viscosity must be a finite non-negative number, got {0}")]
    InvalidViscosity(Float),

    #[error("initial density must be finite and positive, got {0}")]
    InvalidDensity(Float),

    #[error("wall velocity must be finite, got {0:?}")]
    InvalidWallVelocity([Float; 3]),

    #[error("layout stride must be non-zero")]
    ZeroStride,

    #[error("layout stride {0} exceeds the maximum of 65536")]
    StrideTooLarge(usize),

    #[error("work group {0:?} must be non-empty, within [256, 256, 64] per axis and hold at most 256 invocations")]
    InvalidWorkGroup([u32; 3]),
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            dim: 8,
            moving_face: Some(Face::Front),
        }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            viscosity: 0.0089,
            wall_velocity: [0.05, 0.0, 0.0],
            density: 1.0,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            sample_every: 1,
            backend: BackendKind::Cpu,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            stride: 32,
            work_group: [4, 4, 4],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_directory: "./results".to_string(),
            write_vti: true,
            dump_map: false,
            dump_f: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations no simulation state may be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.dim < 3 {
            return Err(ConfigError::DimensionTooSmall(self.domain.dim));
        }
        let nu = self.physics.viscosity;
        if !nu.is_finite() || nu < 0.0 {
            return Err(ConfigError::InvalidViscosity(nu));
        }
        let rho = self.physics.density;
        if !rho.is_finite() || rho <= 0.0 {
            return Err(ConfigError::InvalidDensity(rho));
        }
        if self.physics.wall_velocity.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidWallVelocity(self.physics.wall_velocity));
        }
        if self.layout.stride == 0 {
            return Err(ConfigError::ZeroStride);
        }
        if self.layout.stride > MAX_STRIDE {
            return Err(ConfigError::StrideTooLarge(self.layout.stride));
        }
        let work_group = self.layout.work_group;
        let [wx, wy, wz] = work_group;
        let invocations = wx as u64 * wy as u64 * wz as u64;
        let axis_too_large = work_group.iter().zip(MAX_WORK_GROUP_SIZE).any(|(&w, max)| w > max);
        if invocations == 0 || invocations > MAX_WORK_GROUP_INVOCATIONS as u64 || axis_too_large {
            return Err(ConfigError::InvalidWorkGroup(work_group));
        }
        Ok(())
    }

    /// Relaxation time in lattice units (dx = dt = 1).
    pub fn tau(&self) -> Float {
        3.0 * self.physics.viscosity + 0.5
    }

    /// Relaxation rate 1/tau.
    pub fn omega(&self) -> Float {
        1.0 / self.tau()
    }

    /// Number of cells that carry fluid, i.e. everything inside the wall shell.
    pub fn wet_cells(&self) -> usize {
        let inner = self.domain.dim.saturating_sub(2);
        inner * inner * inner
    }
}
