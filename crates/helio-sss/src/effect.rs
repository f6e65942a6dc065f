//! The subsurface scattering effect
//!
//! Ties the components together behind the [`Feature`] callbacks. Any
//! initialisation or allocation failure deactivates the effect: every list
//! is removed, buffers are released, and later frames pass through
//! untouched until the effect is enabled again.

use crate::config::{LookupTextures, SssConfig};
use crate::controller::ReconfigurationController;
use crate::feature::{Feature, FeatureContext};
use crate::frame::FrameCounter;
use crate::host::RenderHost;
use crate::params::{ParameterBus, ParameterStore};
use crate::program::ProgramSet;
use crate::resources::TargetAllocator;
use crate::specular::SpecularBuffers;
use crate::{Error, Result};
use std::sync::Arc;

/// Screen-space subsurface scattering for one camera
///
/// Parameter and buffer names are process-wide; two instances on two
/// cameras overwrite each other's globals.
pub struct SubsurfaceScattering {
    config: SssConfig,
    parameters: ParameterStore,
    frame: FrameCounter,
    specular: SpecularBuffers,
    controller: ReconfigurationController,
    /// `Some` while active
    programs: Option<ProgramSet>,
    enabled: bool,
}

impl SubsurfaceScattering {
    pub fn new(config: SssConfig, textures: LookupTextures, allocator: Arc<dyn TargetAllocator>) -> Self {
        Self {
            config,
            parameters: ParameterStore::new(textures),
            frame: FrameCounter::new(),
            specular: SpecularBuffers::new(allocator),
            controller: ReconfigurationController::new(),
            programs: None,
            enabled: false,
        }
    }

    pub fn config(&self) -> &SssConfig {
        &self.config
    }

    /// Mutable configuration; structural changes are picked up by the next `update`
    pub fn config_mut(&mut self) -> &mut SssConfig {
        &mut self.config
    }

    pub fn set_textures(&mut self, textures: LookupTextures) {
        self.parameters.set_textures(textures);
    }

    /// Enabled and initialised successfully
    pub fn is_active(&self) -> bool {
        self.programs.is_some()
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    pub fn specular(&self) -> &SpecularBuffers {
        &self.specular
    }

    pub fn controller(&self) -> &ReconfigurationController {
        &self.controller
    }

    pub fn frame_counter(&self) -> &FrameCounter {
        &self.frame
    }

    /// Replace the configuration outside the per-frame path
    ///
    /// Re-pushes every parameter and rebuilds the graph unconditionally. With
    /// the diffuse blur on, the rebuild drops the specular buffers so the
    /// next frame reallocates them.
    pub fn apply_settings(&mut self, config: SssConfig, ctx: &mut FeatureContext) -> Result<()> {
        self.config = config;
        let Some(programs) = self.programs.as_ref() else {
            return Err(Error::Inactive);
        };

        self.parameters.refresh(&self.config, ctx.bus);
        self.controller.invalidate();
        let result = self
            .controller
            .rebuild(ctx.host, ctx.bus, programs, &self.config, &mut self.specular);
        self.check(result, ctx)
    }

    /// Pass errors through, deactivating on anything but a guard trip
    fn check<T>(&mut self, result: Result<T>, ctx: &mut FeatureContext) -> Result<T> {
        if let Err(e) = &result {
            if !matches!(e, Error::AlreadyAcquired | Error::RebuildInProgress) {
                log::error!("Subsurface scattering disabled: {}", e);
                self.deactivate(ctx.host, ctx.bus);
            }
        }
        result
    }

    fn deactivate(&mut self, host: &mut dyn RenderHost, bus: &mut dyn ParameterBus) {
        self.controller.teardown(host);
        self.specular.release(host, bus);
        self.programs = None;
    }
}

impl Feature for SubsurfaceScattering {
    fn name(&self) -> &str {
        "subsurface_scattering"
    }

    fn on_enable(&mut self, ctx: &mut FeatureContext) -> Result<()> {
        self.enabled = true;
        let programs = match ProgramSet::resolve(ctx.programs) {
            Ok(programs) => programs,
            Err(e) => return self.check(Err(e), ctx),
        };

        self.parameters.refresh(&self.config, ctx.bus);
        let result = self
            .controller
            .rebuild(ctx.host, ctx.bus, &programs, &self.config, &mut self.specular);
        self.programs = Some(programs);
        self.check(result, ctx)?;

        log::info!(
            "Subsurface scattering enabled ({:?}, {:?} LUT, {} blur iterations)",
            self.config.pipeline,
            self.config.lut_profile,
            self.config.effective_iterations()
        );
        Ok(())
    }

    fn update(&mut self, ctx: &mut FeatureContext) -> Result<()> {
        let Some(programs) = self.programs.as_ref() else {
            return Ok(());
        };

        self.parameters.refresh(&self.config, ctx.bus);
        self.parameters
            .publish_camera(ctx.host.view_matrix(), ctx.host.projection_matrix(), ctx.bus);
        if !self.controller.needs_rebuild(&self.config) {
            return Ok(());
        }
        let result = self
            .controller
            .rebuild(ctx.host, ctx.bus, programs, &self.config, &mut self.specular);
        self.check(result, ctx)
    }

    fn pre_render(&mut self, ctx: &mut FeatureContext) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }

        let frame = self.frame.tick(ctx.bus);
        log::trace!("SSS frame {}", frame);

        if self.config.diffuse_blur_active() {
            let result = self.specular.acquire(ctx.host, ctx.bus).map(|_| ());
            self.check(result, ctx)?;
        }
        Ok(())
    }

    fn post_render(&mut self, ctx: &mut FeatureContext) -> Result<()> {
        self.specular.release(ctx.host, ctx.bus);
        Ok(())
    }

    fn on_disable(&mut self, ctx: &mut FeatureContext) {
        self.enabled = false;
        self.deactivate(ctx.host, ctx.bus);
        log::info!("Subsurface scattering disabled");
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InsertionPoint, EXTRACTION_LIST};
    use crate::headless::{HeadlessAllocator, HeadlessHost};
    use crate::config::PipelineProfile;
    use crate::params::{names, GlobalParameters};
    use crate::program::{PassProgram, ProgramLibrary, MAIN_PROGRAM, PREPASS_PROGRAM};
    use crate::resources::Extent;
    use glam::Mat4;

    fn effect(config: SssConfig) -> (SubsurfaceScattering, Arc<HeadlessAllocator>) {
        let allocator = Arc::new(HeadlessAllocator::new());
        (
            SubsurfaceScattering::new(config, LookupTextures::default(), allocator.clone()),
            allocator,
        )
    }

    #[test]
    fn missing_program_leaves_effect_inactive() {
        let (mut sss, allocator) = effect(SssConfig::new());
        let mut host = HeadlessHost::new(Extent::new(256, 256));
        let mut bus = GlobalParameters::new();
        let mut library = ProgramLibrary::new();
        library.register(PassProgram::new(PREPASS_PROGRAM, 1));

        let mut ctx = FeatureContext::new(&mut host, &mut bus, &library);
        assert!(matches!(sss.on_enable(&mut ctx), Err(Error::ProgramNotFound(name)) if name == MAIN_PROGRAM));
        assert!(!sss.is_active());

        // later callbacks are pass-through
        sss.update(&mut ctx).unwrap();
        sss.pre_render(&mut ctx).unwrap();
        sss.post_render(&mut ctx).unwrap();
        assert_eq!(host.registration_count(), 0);
        assert_eq!(allocator.live_count(), 0);
        assert!(bus.int(crate::params::names::FRAME_COUNT).is_none());
    }

    #[test]
    fn allocation_failure_deactivates() {
        let (mut sss, allocator) = effect(SssConfig::new());
        let mut host = HeadlessHost::new(Extent::new(256, 256));
        let mut bus = GlobalParameters::new();
        let library = ProgramLibrary::with_effect_programs();
        let mut ctx = FeatureContext::new(&mut host, &mut bus, &library);

        sss.on_enable(&mut ctx).unwrap();
        allocator.fail_after(1);
        assert!(matches!(sss.pre_render(&mut ctx), Err(Error::Resource(_))));
        assert!(!sss.is_active());
        assert!(sss.is_enabled());
        drop(ctx);

        assert_eq!(host.registration_count(), 0);
        assert_eq!(allocator.live_count(), 0);
    }

    #[test]
    fn double_acquire_is_a_guard_not_a_shutdown() {
        let (mut sss, allocator) = effect(SssConfig::new());
        let mut host = HeadlessHost::new(Extent::new(256, 256));
        let mut bus = GlobalParameters::new();
        let library = ProgramLibrary::with_effect_programs();
        let mut ctx = FeatureContext::new(&mut host, &mut bus, &library);

        sss.on_enable(&mut ctx).unwrap();
        sss.pre_render(&mut ctx).unwrap();
        assert!(matches!(sss.pre_render(&mut ctx), Err(Error::AlreadyAcquired)));
        assert!(sss.is_active());
        assert_eq!(allocator.live_count(), 3);
    }

    #[test]
    fn normal_only_mode_skips_specular_buffers() {
        let (mut sss, allocator) = effect(SssConfig::new().with_screen_space(false));
        let mut host = HeadlessHost::new(Extent::new(256, 256));
        let mut bus = GlobalParameters::new();
        let library = ProgramLibrary::with_effect_programs();
        let mut ctx = FeatureContext::new(&mut host, &mut bus, &library);

        sss.on_enable(&mut ctx).unwrap();
        sss.pre_render(&mut ctx).unwrap();
        assert!(!sss.specular().is_acquired());
        drop(ctx);
        assert_eq!(allocator.total_created(), 0);
        assert_eq!(host.command_lists(InsertionPoint::BeforeLighting)[0].name(), EXTRACTION_LIST);
    }

    #[test]
    fn apply_settings_forces_rebuild_and_release() {
        let (mut sss, allocator) = effect(SssConfig::new());
        let mut host = HeadlessHost::new(Extent::new(256, 256));
        let mut bus = GlobalParameters::new();
        let library = ProgramLibrary::with_effect_programs();
        let mut ctx = FeatureContext::new(&mut host, &mut bus, &library);

        sss.on_enable(&mut ctx).unwrap();
        sss.pre_render(&mut ctx).unwrap();
        let before = sss.controller().rebuild_count();

        // same settings still rebuild
        sss.apply_settings(SssConfig::new(), &mut ctx).unwrap();
        assert_eq!(sss.controller().rebuild_count(), before + 1);
        assert!(!sss.specular().is_acquired());
        assert_eq!(allocator.live_count(), 0);
    }

    #[test]
    fn screen_space_keyword_matches_specular_buffers() {
        for pipeline in PipelineProfile::ALL {
            for screen_space in [false, true] {
                let config = SssConfig::new().with_pipeline(pipeline).with_screen_space(screen_space);
                let (mut sss, _) = effect(config);
                let mut host = HeadlessHost::new(Extent::new(256, 256));
                let mut bus = GlobalParameters::new();
                let library = ProgramLibrary::with_effect_programs();
                let mut ctx = FeatureContext::new(&mut host, &mut bus, &library);

                sss.on_enable(&mut ctx).unwrap();
                sss.update(&mut ctx).unwrap();
                sss.pre_render(&mut ctx).unwrap();
                drop(ctx);

                let keyword = bus.is_keyword_enabled("SCREENSPACE_SSS");
                assert_eq!(keyword, sss.specular().is_acquired(), "{pipeline:?} screen_space={screen_space}");
                let slots = if keyword { 3 } else { 0 };
                assert_eq!(host.random_write_targets().len(), slots, "{pipeline:?} screen_space={screen_space}");
            }
        }
    }

    #[test]
    fn update_publishes_camera_matrices() {
        let (mut sss, _) = effect(SssConfig::new().with_pipeline(PipelineProfile::Standalone));
        let mut host = HeadlessHost::new(Extent::new(256, 256));
        let view = Mat4::from_translation(glam::Vec3::new(0.0, -1.6, -3.0));
        let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_3, 1.0, 0.1, 50.0);
        host.set_camera(view, projection);
        let mut bus = GlobalParameters::new();
        let library = ProgramLibrary::with_effect_programs();
        let mut ctx = FeatureContext::new(&mut host, &mut bus, &library);

        sss.on_enable(&mut ctx).unwrap();
        sss.update(&mut ctx).unwrap();
        drop(ctx);

        assert_eq!(bus.matrix(names::WORLD_TO_VIEW), Some(view));
        assert_eq!(bus.matrix(names::VIEW_TO_WORLD), Some(view.inverse()));
        assert_eq!(bus.matrix(names::VIEW_TO_CLIP), Some(projection));
        assert_eq!(bus.matrix(names::CLIP_TO_VIEW), Some(projection.inverse()));

        // moving the camera is picked up on the next update
        let moved = Mat4::from_translation(glam::Vec3::new(2.0, -1.6, -3.0));
        host.set_camera(moved, projection);
        let mut ctx = FeatureContext::new(&mut host, &mut bus, &library);
        sss.update(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(bus.matrix(names::WORLD_TO_VIEW), Some(moved));
    }

    #[test]
    fn apply_settings_on_inactive_effect() {
        let (mut sss, _) = effect(SssConfig::new());
        let mut host = HeadlessHost::new(Extent::new(256, 256));
        let mut bus = GlobalParameters::new();
        let library = ProgramLibrary::with_effect_programs();
        let mut ctx = FeatureContext::new(&mut host, &mut bus, &library);

        let config = SssConfig::new().with_blur_iterations(1);
        assert!(matches!(sss.apply_settings(config.clone(), &mut ctx), Err(Error::Inactive)));
        assert_eq!(sss.config(), &config);
    }
}
