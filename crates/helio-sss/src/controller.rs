//! Reconfiguration controller
//!
//! Polls the configuration for structural changes and swaps the installed
//! pass graph. A rebuild always tears down first, then builds and installs
//! the replacement, all inside the calling update, so no frame ever sees a
//! half-built graph.

use crate::config::SssConfig;
use crate::graph::{BuildOptions, PassGraph, PassGraphBuilder};
use crate::host::RenderHost;
use crate::params::ParameterBus;
use crate::program::ProgramSet;
use crate::specular::SpecularBuffers;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Built,
    Rebuilding,
}

/// Owns the installed [`PassGraph`] and decides when to replace it
#[derive(Debug)]
pub struct ReconfigurationController {
    state: ControllerState,
    /// Options of the installed graph; `None` forces the next rebuild
    cached: Option<BuildOptions>,
    graph: Option<PassGraph>,
    rebuild_count: u64,
}

impl Default for ReconfigurationController {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconfigurationController {
    pub fn new() -> Self {
        Self {
            state: ControllerState::Built,
            cached: None,
            graph: None,
            rebuild_count: 0,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Completed rebuilds since creation
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    pub fn graph(&self) -> Option<&PassGraph> {
        self.graph.as_ref()
    }

    pub fn cached_options(&self) -> Option<BuildOptions> {
        self.cached
    }

    /// Whether `config` asks for a different graph than the installed one
    pub fn needs_rebuild(&self, config: &SssConfig) -> bool {
        self.cached != Some(BuildOptions::from_config(config))
    }

    /// Forget the cached options so the next poll rebuilds
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Tear down the installed graph and install one built for `config`
    ///
    /// When the new graph runs the diffuse blur the specular buffers are
    /// released too; the next acquire picks up the current size.
    pub fn rebuild(
        &mut self,
        host: &mut dyn RenderHost,
        bus: &mut dyn ParameterBus,
        programs: &ProgramSet,
        config: &SssConfig,
        specular: &mut SpecularBuffers,
    ) -> Result<()> {
        self.begin()?;
        let result = self.swap_graph(host, bus, programs, config, specular);
        self.state = ControllerState::Built;
        result
    }

    fn begin(&mut self) -> Result<()> {
        if self.state == ControllerState::Rebuilding {
            log::error!("Pass graph rebuild requested while one is in progress");
            return Err(Error::RebuildInProgress);
        }
        self.state = ControllerState::Rebuilding;
        Ok(())
    }

    fn swap_graph(
        &mut self,
        host: &mut dyn RenderHost,
        bus: &mut dyn ParameterBus,
        programs: &ProgramSet,
        config: &SssConfig,
        specular: &mut SpecularBuffers,
    ) -> Result<()> {
        let options = BuildOptions::from_config(config);
        let previous = self.cached.map(|o| o.iterations);

        self.teardown(host);
        if options.diffuse_blur {
            specular.release(host, bus);
        }

        let graph = PassGraphBuilder::new(programs, options).build()?;
        graph.install(host);
        self.graph = Some(graph);
        self.cached = Some(options);
        self.rebuild_count += 1;

        log::info!(
            "SSS pass graph rebuilt ({:?}, iterations {:?} -> {})",
            options.profile,
            previous,
            options.iterations
        );
        Ok(())
    }

    /// Remove every effect list from the host; returns how many were removed
    pub fn teardown(&mut self, host: &mut dyn RenderHost) -> usize {
        self.graph = None;
        self.cached = None;
        PassGraph::remove_all(host)
    }
}
