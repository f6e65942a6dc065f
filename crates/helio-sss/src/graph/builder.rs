//! Pass graph builder
//!
//! One builder covers every pipeline profile; the profile only decides
//! which lists exist and how many blur iterations they record.

use super::{
    BuiltinTarget, CommandList, InsertionPoint, PassGraph, TargetId, DIFFUSE_BLUR_LIST, EXTRACTION_LIST,
    NORMAL_BLUR_LIST,
};
use crate::config::{PipelineProfile, SssConfig};
use crate::params::names;
use crate::program::{MainPass, ProgramKind, ProgramSet, PREPASS_EXTRACT};
use crate::resources::TargetDesc;
use crate::Result;

const FLIP: &str = "sss_temporary_flip";
const FLOP: &str = "sss_temporary_flop";

/// Scratch format of the diffuse ping-pong pair
pub const DIFFUSE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Scratch format of the normal ping-pong pair (matches the packed normal buffer)
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgb10a2Unorm;

/// Structural inputs of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildOptions {
    pub profile: PipelineProfile,
    pub diffuse_blur: bool,
    pub iterations: u32,
}

impl BuildOptions {
    pub fn from_config(config: &SssConfig) -> Self {
        Self {
            profile: config.pipeline,
            diffuse_blur: config.diffuse_blur_active(),
            iterations: config.effective_iterations(),
        }
    }

    fn normal_blur(&self) -> bool {
        self.profile == PipelineProfile::Integrated
    }
}

/// Records the effect's command lists in registration order
pub struct PassGraphBuilder<'a> {
    programs: &'a ProgramSet,
    options: BuildOptions,
}

impl<'a> PassGraphBuilder<'a> {
    pub fn new(programs: &'a ProgramSet, options: BuildOptions) -> Self {
        Self { programs, options }
    }

    /// Build and validate the graph
    ///
    /// Extraction is always registered first since both blur lists may
    /// sample its output.
    pub fn build(self) -> Result<PassGraph> {
        let opts = self.options;
        log::debug!(
            "Building SSS pass graph ({:?}, diffuse={}, iterations={})",
            opts.profile,
            opts.diffuse_blur,
            opts.iterations
        );

        let mut graph = PassGraph::new();

        if opts.profile == PipelineProfile::HsrCompatible {
            let (list, _) = Self::extraction(wgpu::TextureFormat::R8Unorm, true);
            graph.push(InsertionPoint::AfterGBuffer, list)?;
        } else {
            let format = if opts.diffuse_blur {
                wgpu::TextureFormat::R8Unorm
            } else {
                wgpu::TextureFormat::R16Float
            };
            let (list, transmission) = Self::extraction(format, !opts.diffuse_blur);
            graph.push(InsertionPoint::BeforeLighting, list)?;

            if opts.diffuse_blur {
                graph.push(
                    InsertionPoint::AfterFinalPass,
                    Self::diffuse_blur(transmission, opts.iterations),
                )?;
            }
            if opts.normal_blur() {
                graph.push(InsertionPoint::BeforeLighting, Self::normal_blur(opts.iterations))?;
            }
        }

        graph.validate(self.programs)?;
        log::debug!("SSS pass graph built: {} lists", graph.len());
        Ok(graph)
    }

    /// Camera target -> single-channel thickness / transmission signal
    fn extraction(format: wgpu::TextureFormat, release: bool) -> (CommandList, TargetId) {
        let mut list = CommandList::new(EXTRACTION_LIST);
        let copy = list.get_temporary(names::TRANSMISSION_BUFFER, TargetDesc::temporary(format));
        list.blit_with(BuiltinTarget::CameraTarget, copy, ProgramKind::PrePass, PREPASS_EXTRACT);
        if release {
            list.release_temporary(copy);
        }
        (list, copy)
    }

    /// Separable blur of the lit colour, composited back onto the camera target
    fn diffuse_blur(transmission: TargetId, iterations: u32) -> CommandList {
        let mut list = CommandList::new(DIFFUSE_BLUR_LIST);
        list.import_temporary(transmission);

        let flip = list.get_temporary(FLIP, TargetDesc::temporary(DIFFUSE_FORMAT));
        let flop = list.get_temporary(FLOP, TargetDesc::temporary(DIFFUSE_FORMAT));

        list.blit_with(BuiltinTarget::CurrentActive, flip, ProgramKind::Main, MainPass::DiffuseSeed.index());
        for _ in 0..iterations {
            list.blit_with(flip, flop, ProgramKind::Main, MainPass::DiffuseHorizontal.index())
                .blit_with(flop, flip, ProgramKind::Main, MainPass::DiffuseVertical.index());
        }
        list.blit_with(flip, flop, ProgramKind::Main, MainPass::DiffuseCollect.index())
            .blit(flop, BuiltinTarget::CameraTarget)
            .release_temporary(flip)
            .release_temporary(flop)
            .release_temporary(transmission);
        list
    }

    /// Blurred G-buffer normals for the lighting stage
    ///
    /// With zero iterations the raw normal channel is published instead.
    fn normal_blur(iterations: u32) -> CommandList {
        let mut list = CommandList::new(NORMAL_BLUR_LIST);

        if iterations == 0 {
            list.set_global_texture(names::BLURRED_NORMAL_BUFFER, BuiltinTarget::GBufferNormal);
            return list;
        }

        let flip = list.get_temporary(FLIP, TargetDesc::temporary(NORMAL_FORMAT));
        let flop = list.get_temporary(FLOP, TargetDesc::temporary(NORMAL_FORMAT));

        list.blit_with(BuiltinTarget::GBufferNormal, flip, ProgramKind::Main, MainPass::NormalHorizontal.index())
            .blit_with(flip, flop, ProgramKind::Main, MainPass::NormalVertical.index());
        for _ in 1..iterations {
            list.blit_with(flop, flip, ProgramKind::Main, MainPass::NormalHorizontal.index())
                .blit_with(flip, flop, ProgramKind::Main, MainPass::NormalVertical.index());
        }
        list.set_global_texture(names::BLURRED_NORMAL_BUFFER, flop)
            .release_temporary(flip)
            .release_temporary(flop);
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Command, TextureSource};
    use crate::program::ProgramLibrary;

    fn programs() -> ProgramSet {
        ProgramSet::resolve(&ProgramLibrary::with_effect_programs()).unwrap()
    }

    fn build(options: BuildOptions) -> PassGraph {
        PassGraphBuilder::new(&programs(), options).build().unwrap()
    }

    fn integrated(diffuse_blur: bool, iterations: u32) -> BuildOptions {
        BuildOptions {
            profile: PipelineProfile::Integrated,
            diffuse_blur,
            iterations,
        }
    }

    #[test]
    fn normal_blur_has_one_pass_pair_per_iteration() {
        for n in 0..8 {
            let graph = build(integrated(false, n));
            let (point, normal) = graph.find(NORMAL_BLUR_LIST).unwrap();
            assert_eq!(point, InsertionPoint::BeforeLighting);

            let h = normal.pass_count(ProgramKind::Main, MainPass::NormalHorizontal.index());
            let v = normal.pass_count(ProgramKind::Main, MainPass::NormalVertical.index());
            assert_eq!((h, v), (n as usize, n as usize), "iterations={n}");
            assert_eq!(normal.blit_count(), 2 * n as usize);
        }
    }

    #[test]
    fn zero_iterations_publish_raw_normals() {
        let graph = build(integrated(false, 0));
        let (_, normal) = graph.find(NORMAL_BLUR_LIST).unwrap();
        assert_eq!(
            normal.commands(),
            &[Command::SetGlobalTexture {
                name: names::BLURRED_NORMAL_BUFFER.to_string(),
                source: TextureSource::Builtin(BuiltinTarget::GBufferNormal),
            }]
        );
    }

    #[test]
    fn diffuse_graph_for_three_iterations() {
        let graph = build(integrated(true, 3));

        let points: Vec<_> = graph.entries().iter().map(|(p, l)| (*p, l.name().to_string())).collect();
        assert_eq!(
            points,
            vec![
                (InsertionPoint::BeforeLighting, EXTRACTION_LIST.to_string()),
                (InsertionPoint::AfterFinalPass, DIFFUSE_BLUR_LIST.to_string()),
                (InsertionPoint::BeforeLighting, NORMAL_BLUR_LIST.to_string()),
            ]
        );

        let (_, diffuse) = graph.find(DIFFUSE_BLUR_LIST).unwrap();
        assert_eq!(diffuse.pass_count(ProgramKind::Main, MainPass::DiffuseSeed.index()), 1);
        assert_eq!(diffuse.pass_count(ProgramKind::Main, MainPass::DiffuseHorizontal.index()), 3);
        assert_eq!(diffuse.pass_count(ProgramKind::Main, MainPass::DiffuseVertical.index()), 3);
        assert_eq!(diffuse.pass_count(ProgramKind::Main, MainPass::DiffuseCollect.index()), 1);
        // seed + 3x2 + collect + final copy
        assert_eq!(diffuse.blit_count(), 9);
        assert!(matches!(
            diffuse.commands().iter().rev().nth(3),
            Some(Command::Blit { dst: TextureSource::Builtin(BuiltinTarget::CameraTarget), program: None, .. })
        ));

        let (_, extraction) = graph.find(EXTRACTION_LIST).unwrap();
        assert_eq!(extraction.exported_temporaries(), diffuse.imports().to_vec());
    }

    #[test]
    fn normal_only_extraction_releases_its_target() {
        let graph = build(integrated(false, 2));
        let (_, extraction) = graph.find(EXTRACTION_LIST).unwrap();
        assert!(extraction.exported_temporaries().is_empty());
        assert!(matches!(
            extraction.commands().first(),
            Some(Command::GetTemporary { desc, .. }) if desc.format == wgpu::TextureFormat::R16Float
        ));
        assert!(graph.find(DIFFUSE_BLUR_LIST).is_none());
    }

    #[test]
    fn standalone_ignores_configured_iterations() {
        let config = SssConfig::new()
            .with_blur_iterations(9)
            .with_pipeline(PipelineProfile::Standalone);
        let graph = build(BuildOptions::from_config(&config));

        assert_eq!(graph.len(), 2);
        assert!(graph.find(NORMAL_BLUR_LIST).is_none());
        let (_, diffuse) = graph.find(DIFFUSE_BLUR_LIST).unwrap();
        assert_eq!(diffuse.pass_count(ProgramKind::Main, MainPass::DiffuseHorizontal.index()), 2);
    }

    #[test]
    fn hsr_profile_is_a_single_self_releasing_list() {
        let config = SssConfig::new().with_pipeline(PipelineProfile::HsrCompatible);
        let graph = build(BuildOptions::from_config(&config));

        assert_eq!(graph.len(), 1);
        let (point, list) = graph.find(EXTRACTION_LIST).unwrap();
        assert_eq!(point, InsertionPoint::AfterGBuffer);
        assert!(list.exported_temporaries().is_empty());
    }

    #[test]
    fn ping_pong_never_aliases() {
        for n in 0..5 {
            let graph = build(integrated(true, n));
            for (_, list) in graph.entries() {
                for command in list.commands() {
                    if let Command::Blit { src, dst, .. } = command {
                        assert_ne!(src, dst);
                    }
                }
            }
        }
    }
}
