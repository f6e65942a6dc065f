//! Feature lifecycle interface
//!
//! The host drives an effect through a fixed callback sequence:
//!
//! 1. `on_enable()` - resolve programs, build and install the pass graph
//! 2. `update()` - every frame, push parameters and apply reconfiguration
//! 3. `pre_render()` - before the host runs its command lists
//! 4. `post_render()` - after the final colour pass
//! 5. `on_disable()` - remove everything, synchronously
//!
//! All callbacks run on the render thread; none of them block.

use crate::host::RenderHost;
use crate::params::ParameterBus;
use crate::program::ProgramResolver;
use crate::Result;

/// Host collaborators handed to every callback
pub struct FeatureContext<'a> {
    pub host: &'a mut dyn RenderHost,
    pub bus: &'a mut dyn ParameterBus,
    pub programs: &'a dyn ProgramResolver,
}

impl<'a> FeatureContext<'a> {
    pub fn new(
        host: &'a mut dyn RenderHost,
        bus: &'a mut dyn ParameterBus,
        programs: &'a dyn ProgramResolver,
    ) -> Self {
        Self { host, bus, programs }
    }
}

/// A post-process effect driven by the host's frame callbacks
pub trait Feature {
    /// Unique name (lowercase snake_case)
    fn name(&self) -> &str;

    /// Called once when the effect is switched on
    ///
    /// An error leaves the effect inactive: nothing registered, nothing held.
    fn on_enable(&mut self, ctx: &mut FeatureContext) -> Result<()>;

    fn update(&mut self, ctx: &mut FeatureContext) -> Result<()>;

    fn pre_render(&mut self, ctx: &mut FeatureContext) -> Result<()>;

    fn post_render(&mut self, _ctx: &mut FeatureContext) -> Result<()> {
        Ok(())
    }

    /// Remove every registration and release every held resource before returning
    fn on_disable(&mut self, ctx: &mut FeatureContext);

    fn is_enabled(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;
    use crate::params::GlobalParameters;
    use crate::program::ProgramLibrary;
    use crate::resources::Extent;

    struct Passthrough;

    impl Feature for Passthrough {
        fn name(&self) -> &str {
            "passthrough"
        }

        fn on_enable(&mut self, _ctx: &mut FeatureContext) -> Result<()> {
            Ok(())
        }

        fn update(&mut self, _ctx: &mut FeatureContext) -> Result<()> {
            Ok(())
        }

        fn pre_render(&mut self, _ctx: &mut FeatureContext) -> Result<()> {
            Ok(())
        }

        fn on_disable(&mut self, _ctx: &mut FeatureContext) {}
    }

    #[test]
    fn default_callbacks_touch_nothing() {
        let mut host = HeadlessHost::new(Extent::new(64, 64));
        let mut bus = GlobalParameters::new();
        let library = ProgramLibrary::new();
        let mut ctx = FeatureContext::new(&mut host, &mut bus, &library);

        let mut feature = Passthrough;
        feature.post_render(&mut ctx).unwrap();
        assert!(feature.is_enabled());
        drop(ctx);
        assert_eq!(host.registration_count(), 0);
        assert!(host.random_write_targets().is_empty());
    }
}
