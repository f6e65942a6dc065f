//! Subsurface scattering frame loop without a window
//!
//! Drives the effect through a few frames on the headless host, changes the
//! blur quality mid-run, and then repeats the specular-buffer part on a real
//! device when an adapter is available.
//!
//! Usage:
//!   sss_headless [FRAMES]

use helio_sss::headless::{HeadlessAllocator, HeadlessHost};
use helio_sss::params::names;
use helio_sss::program::ProgramLibrary;
use helio_sss::resources::gpu::WgpuTargetAllocator;
use helio_sss::{
    Extent, Feature, FeatureContext, GlobalParameters, LookupTextures, LutProfile, SssConfig, SubsurfaceScattering,
    TargetAllocator, TextureHandle,
};
use std::sync::Arc;

fn main() {
    env_logger::init();
    log::info!("Starting SSS headless example");

    let frames = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<u32>().ok())
        .unwrap_or(8);

    let headless = Arc::new(HeadlessAllocator::new());
    if let Err(e) = run(headless.clone(), frames) {
        log::error!("Headless run failed: {}", e);
        std::process::exit(1);
    }
    log::info!("Headless run finished, {} targets created, {} live", headless.total_created(), headless.live_count());

    match gpu_allocator() {
        Some(allocator) => {
            if let Err(e) = run(allocator.clone(), 2) {
                log::warn!("GPU run failed (the adapter may lack R16Float storage): {}", e);
            }
            log::info!("GPU run finished, {} targets live", allocator.live_count());
        }
        None => log::info!("No adapter available, skipping GPU run"),
    }
}

fn run(allocator: Arc<dyn TargetAllocator>, frames: u32) -> helio_sss::Result<()> {
    let mut host = HeadlessHost::new(Extent::new(1280, 720));
    let mut bus = GlobalParameters::new();
    let library = ProgramLibrary::with_effect_programs();

    let textures = LookupTextures {
        skin_jitter: Some(TextureHandle::new()),
        nvidia_diffuse: Some(TextureHandle::new()),
        nvidia_shadow: Some(TextureHandle::new()),
        deep_scatter: Some(TextureHandle::new()),
    };
    let config = SssConfig::new().with_lut_profile(LutProfile::Nvidia1);
    let mut sss = SubsurfaceScattering::new(config, textures, allocator);

    sss.on_enable(&mut FeatureContext::new(&mut host, &mut bus, &library))?;

    for frame in 0..frames {
        if frame == frames / 2 {
            sss.config_mut().blur_iterations = 5;
            host.set_viewport(Extent::new(1920, 1080));
            log::info!("Frame {}: blur iterations -> 5, viewport -> 1920x1080", frame);
        }

        let mut ctx = FeatureContext::new(&mut host, &mut bus, &library);
        sss.update(&mut ctx)?;
        sss.pre_render(&mut ctx)?;

        let blits = host.execute_frame(&mut bus)?;

        let mut ctx = FeatureContext::new(&mut host, &mut bus, &library);
        sss.post_render(&mut ctx)?;

        log::info!(
            "Frame {}: frame_count={:?} blits={} specular={:?}",
            frame,
            bus.int(names::FRAME_COUNT),
            blits,
            sss.specular().extent()
        );
    }

    log::info!(
        "Keywords: {:?}, rebuilds: {}",
        bus.enabled_keywords().collect::<Vec<_>>(),
        sss.controller().rebuild_count()
    );
    sss.on_disable(&mut FeatureContext::new(&mut host, &mut bus, &library));
    Ok(())
}

fn gpu_allocator() -> Option<Arc<WgpuTargetAllocator>> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    log::info!("Using adapter: {}", adapter.get_info().name);

    // R16Float storage textures are adapter specific
    let required_features = adapter.features() & wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
    let (device, queue) = match pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("SSS Device"),
            required_features,
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
        },
        None,
    )) {
        Ok(pair) => pair,
        Err(e) => {
            log::warn!("Failed to create device: {}", e);
            return None;
        }
    };

    Some(Arc::new(WgpuTargetAllocator::new(Arc::new(device), Arc::new(queue))))
}
