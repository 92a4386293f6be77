use std::fmt::Write as _;
use std::time::Instant;
use wgpu::util::DeviceExt;
use anyhow::{Result, bail};
use log::{debug, info};
use crate::{
    Float,
    backend::{Backend, PingPong},
    cell::CellType,
    config::Config,
    distribution::Distributions,
    grid::CellMap,
    kernels::StepParams,
    lattice::D3Q19,
    layout::Layout,
    metrics::PhaseTimings,
};

const SHADER_BODY: &str = include_str!("shaders/lbm.wgsl");

/// wgpu compute backend. Both population buffers live on the device for the
/// whole run; the role swap is a choice between two prebuilt bind groups.
pub struct GPUContext {
    device: wgpu::Device,
    queue: wgpu::Queue,

    // Compute pipelines
    boundary_pipeline: wgpu::ComputePipeline,
    collision_pipeline: wgpu::ComputePipeline,
    streaming_pipeline: wgpu::ComputePipeline,

    // Buffers
    f_buffers: [wgpu::Buffer; 2],
    _map_buffer: wgpu::Buffer,
    _params_buffer: wgpu::Buffer,

    // bind_groups[slot] binds buffer `slot` as collide and the other as target
    bind_groups: [wgpu::BindGroup; 2],

    roles: PingPong,
    layout: Layout,
    dispatch: [u32; 3],
    timings: PhaseTimings,
}

impl GPUContext {
    pub async fn new(config: &Config, map: &CellMap, initial: &[Distributions; 2]) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await?;

        let adapter_info = adapter.get_info();
        info!("GPU Adapter Selected: {} ({:?}, {:?}, {:?})",
              adapter_info.name, adapter_info.vendor, adapter_info.device_type, adapter_info.backend);

        let limits = adapter.limits();
        check_work_group(config.layout.work_group, &limits)?;
        let layout = initial[0].layout();
        let f_size = (layout.len() * std::mem::size_of::<Float>()) as wgpu::BufferAddress;
        if f_size > limits.max_storage_buffer_binding_size as u64 {
            bail!(
                "distribution buffer of {} bytes exceeds the adapter's storage binding limit of {} bytes",
                f_size,
                limits.max_storage_buffer_binding_size
            );
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    label: Some("LBM Device"),
                    memory_hints: wgpu::MemoryHints::Performance,
                    ..Default::default()
                },
            )
            .await?;

        let dim = map.grid().dim() as u32;
        let work_group = config.layout.work_group;
        let dispatch = [
            dim.div_ceil(work_group[0]),
            dim.div_ceil(work_group[1]),
            dim.div_ceil(work_group[2]),
        ];

        // Population buffers, seeded from the host-side initializer
        let f_buffers = [0, 1].map(|slot| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(if slot == 0 { "Distribution Buffer A" } else { "Distribution Buffer B" }),
                contents: bytemuck::cast_slice(initial[slot].as_slice()),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            })
        });

        let map_bits = map.bits();
        let map_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cell Map Buffer"),
            contents: bytemuck::cast_slice(&map_bits),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let params = StepParams::from_config(config);
        let gpu_params = GPUParams {
            dim,
            stride: layout.stride() as u32,
            stride_shift: layout.stride().trailing_zeros(),
            _padding0: 0,
            wall_velocity: [params.wall_velocity.x, params.wall_velocity.y, params.wall_velocity.z, 0.0],
            omega: params.omega,
            _padding: [0.0; 3],
        };
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Params Buffer"),
            contents: bytemuck::cast_slice(&[gpu_params]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("LBM Shader"),
            source: wgpu::ShaderSource::Wgsl(shader_source(work_group).into()),
        });

        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("LBM Bind Group Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, false),
                storage_entry(2, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("LBM Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let make_pipeline = |label: &str, entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        let boundary_pipeline = make_pipeline("Boundary Pipeline", "boundary_pass");
        let collision_pipeline = make_pipeline("Collision Pipeline", "collide_pass");
        let streaming_pipeline = make_pipeline("Streaming Pipeline", "stream_pass");

        let bind_groups = [0usize, 1].map(|collide| {
            let target = 1 - collide;
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(if collide == 0 { "LBM Bind Group A->B" } else { "LBM Bind Group B->A" }),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: f_buffers[collide].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: f_buffers[target].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: map_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: params_buffer.as_entire_binding(),
                    },
                ],
            })
        });

        info!("GPU dispatch: {:?} work groups of {:?}", dispatch, work_group);

        Ok(Self {
            device,
            queue,
            boundary_pipeline,
            collision_pipeline,
            streaming_pipeline,
            f_buffers,
            _map_buffer: map_buffer,
            _params_buffer: params_buffer,
            bind_groups,
            roles: PingPong::default(),
            layout,
            dispatch,
            timings: PhaseTimings::default(),
        })
    }

    fn encode_pass(&self, encoder: &mut wgpu::CommandEncoder, label: &str, pipeline: &wgpu::ComputePipeline) {
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(pipeline);
        compute_pass.set_bind_group(0, &self.bind_groups[self.roles.collide().slot()], &[]);
        let [x, y, z] = self.dispatch;
        compute_pass.dispatch_workgroups(x, y, z);
    }

    /// Submits the given passes as one command buffer and waits for them.
    fn submit_and_wait(&self, passes: &[(&str, &wgpu::ComputePipeline)]) -> Result<()> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("LBM Step Encoder"),
        });
        for (label, pipeline) in passes {
            self.encode_pass(&mut encoder, label, pipeline);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::MaintainBase::Wait)?;
        Ok(())
    }

    async fn read_distributions(&self) -> Result<Distributions> {
        let buffer_size = (self.layout.len() * std::mem::size_of::<Float>()) as u64;

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Copy Encoder"),
        });
        let source = &self.f_buffers[self.roles.collide().slot()];
        encoder.copy_buffer_to_buffer(source, 0, &staging_buffer, 0, buffer_size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.device.poll(wgpu::MaintainBase::Wait)?;
        receiver.await??;

        let data = buffer_slice.get_mapped_range();
        let values: Vec<Float> = bytemuck::cast_slice(&data).to_vec();

        drop(data);
        staging_buffer.unmap();

        Distributions::from_raw(self.layout, values)
    }
}

impl Backend for GPUContext {
    fn name(&self) -> &str {
        "gpu"
    }

    fn boundary(&mut self) -> Result<()> {
        let start = Instant::now();
        self.submit_and_wait(&[("Boundary Pass", &self.boundary_pipeline)])?;
        self.timings.boundary += start.elapsed();
        Ok(())
    }

    fn collide(&mut self) -> Result<()> {
        let start = Instant::now();
        self.submit_and_wait(&[("Collision Pass", &self.collision_pipeline)])?;
        self.timings.collision += start.elapsed();
        Ok(())
    }

    fn stream(&mut self) -> Result<()> {
        let start = Instant::now();
        self.submit_and_wait(&[("Streaming Pass", &self.streaming_pipeline)])?;
        self.timings.streaming += start.elapsed();
        Ok(())
    }

    fn swap(&mut self) {
        self.roles.swap();
    }

    /// All three passes in one submission; wgpu orders dispatches within an
    /// encoder and inserts the storage barriers between them.
    fn step(&mut self) -> Result<()> {
        let start = Instant::now();
        self.submit_and_wait(&[
            ("Boundary Pass", &self.boundary_pipeline),
            ("Collision Pass", &self.collision_pipeline),
            ("Streaming Pass", &self.streaming_pipeline),
        ])?;
        self.roles.swap();

        let elapsed = start.elapsed();
        self.timings.fused += elapsed;
        if elapsed.as_millis() > 10 {
            debug!("GPU step took: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
        }
        Ok(())
    }

    fn download(&mut self) -> Result<Distributions> {
        pollster::block_on(self.read_distributions())
    }

    fn timings(&self) -> PhaseTimings {
        self.timings
    }
}

/// Rejects a work-group shape the adapter cannot dispatch.
fn check_work_group(work_group: [u32; 3], limits: &wgpu::Limits) -> Result<()> {
    let axis_limits = [
        limits.max_compute_workgroup_size_x,
        limits.max_compute_workgroup_size_y,
        limits.max_compute_workgroup_size_z,
    ];
    if work_group.iter().zip(axis_limits).any(|(&w, max)| w > max) {
        bail!("work group {:?} exceeds the adapter's per-axis limits {:?}", work_group, axis_limits);
    }
    let invocations = work_group.iter().map(|&w| w as u64).product::<u64>();
    if invocations > limits.max_compute_invocations_per_workgroup as u64 {
        bail!(
            "work group {:?} has {} invocations, the adapter allows {}",
            work_group,
            invocations,
            limits.max_compute_invocations_per_workgroup
        );
    }
    Ok(())
}

/// Full WGSL source: a prelude generated from the lattice tables and cell
/// flags, followed by the kernels. Keeping the tables in one place means the
/// device evaluates exactly the stencil the host does.
pub fn shader_source(work_group: [u32; 3]) -> String {
    let mut prelude = String::new();
    let _ = writeln!(prelude, "const Q: u32 = {}u;", D3Q19::Q);
    for (name, flag) in [
        ("FLUID", CellType::FLUID),
        ("MOVING", CellType::MOVING),
        ("WALL", CellType::WALL),
        ("FACES", CellType::FACES),
    ] {
        let _ = writeln!(prelude, "const {}: u32 = {}u;", name, flag.bits());
    }

    let directions: Vec<String> = D3Q19::DIRECTIONS
        .iter()
        .map(|d| format!("vec3<i32>({}, {}, {})", d.e[0], d.e[1], d.e[2]))
        .collect();
    let _ = writeln!(
        prelude,
        "var<private> E: array<vec3<i32>, 19> = array<vec3<i32>, 19>({});",
        directions.join(", ")
    );

    let weights: Vec<String> = D3Q19::DIRECTIONS.iter().map(|d| format!("{:?}", d.weight)).collect();
    let _ = writeln!(
        prelude,
        "var<private> W: array<f32, 19> = array<f32, 19>({});",
        weights.join(", ")
    );

    let pairs: Vec<String> = D3Q19::BOUNCE_BACK_PAIRS
        .iter()
        .map(|(a, b)| format!("vec2<u32>({}u, {}u)", a, b))
        .collect();
    let _ = writeln!(
        prelude,
        "var<private> BOUNCE_BACK: array<vec2<u32>, 9> = array<vec2<u32>, 9>({});",
        pairs.join(", ")
    );

    let [wx, wy, wz] = work_group;
    let body = SHADER_BODY.replace("WG_X, WG_Y, WG_Z", &format!("{}, {}, {}", wx, wy, wz));
    prelude + "\n" + &body
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GPUParams {
    dim: u32,                   // 16 bytes: dim, stride, stride_shift, padding
    stride: u32,
    stride_shift: u32,
    _padding0: u32,
    wall_velocity: [f32; 4],    // 16 bytes aligned, w unused
    omega: f32,                 // 16 bytes with padding
    _padding: [f32; 3],
}
