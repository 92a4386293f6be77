use approx::assert_relative_eq;
use cavity_lbm::{BackendKind, Config, LBMSolver, NullSink};

fn adapter_available() -> bool {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default())).is_ok()
}

fn config(backend: BackendKind) -> Config {
    let mut config = Config::default();
    config.domain.dim = 10;
    config.layout.stride = 16;
    config.layout.work_group = [4, 4, 2];
    config.simulation.iterations = 12;
    config.simulation.sample_every = 0;
    config.simulation.backend = backend;
    config
}

#[test_log::test]
fn gpu_matches_cpu() {
    if !adapter_available() {
        eprintln!("no GPU adapter available, skipping");
        return;
    }

    let mut gpu = pollster::block_on(LBMSolver::new(config(BackendKind::Gpu))).unwrap();
    assert_eq!(gpu.backend_name(), "gpu");
    let metrics = gpu.run(&mut NullSink).unwrap();
    assert_eq!(metrics.iterations, 12);
    assert!(metrics.phases.fused > std::time::Duration::ZERO);

    let mut cpu = LBMSolver::cpu(config(BackendKind::Cpu)).unwrap();
    cpu.run(&mut NullSink).unwrap();

    let on_device = gpu.distributions().unwrap();
    let on_host = cpu.distributions().unwrap();
    for cell in 0..on_host.cells() {
        for (a, b) in on_device.cell(cell).iter().zip(on_host.cell(cell).iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-5);
        }
    }
}

#[test_log::test]
fn gpu_sub_steps_follow_buffer_roles() {
    if !adapter_available() {
        eprintln!("no GPU adapter available, skipping");
        return;
    }

    let mut fused = pollster::block_on(LBMSolver::new(config(BackendKind::Gpu))).unwrap();
    let mut manual = pollster::block_on(LBMSolver::new(config(BackendKind::Gpu))).unwrap();
    for _ in 0..3 {
        fused.step().unwrap();
        manual.boundary().unwrap();
        manual.collide().unwrap();
        manual.stream().unwrap();
        manual.swap();
    }

    let a = fused.distributions().unwrap();
    let b = manual.distributions().unwrap();
    for cell in 0..a.cells() {
        assert_eq!(a.cell(cell), b.cell(cell), "cell {cell}");
    }
}
