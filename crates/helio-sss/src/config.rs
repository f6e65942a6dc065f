//! Effect configuration

use crate::resources::TextureHandle;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Pre-integrated skin lookup profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LutProfile {
    /// No lookup tables; scattering comes from the screen-space blur only
    #[default]
    None,
    /// FaceWorks diffuse lookup only
    Nvidia1,
    /// FaceWorks diffuse + shadow lookups
    Nvidia2,
}

impl LutProfile {
    pub const ALL: [LutProfile; 3] = [LutProfile::None, LutProfile::Nvidia1, LutProfile::Nvidia2];
}

/// Which flavour of the pass graph to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineProfile {
    /// Extraction + optional diffuse blur + normal blur, configurable iterations
    #[default]
    Integrated,
    /// Diffuse blur only, always two iterations, screen-space keyword forced on
    Standalone,
    /// Legacy path: extraction after the G-buffer pass, no blur lists
    HsrCompatible,
}

impl PipelineProfile {
    pub const ALL: [PipelineProfile; 3] = [
        PipelineProfile::Integrated,
        PipelineProfile::Standalone,
        PipelineProfile::HsrCompatible,
    ];

    /// Iteration count used by the standalone profile regardless of config
    pub const STANDALONE_ITERATIONS: u32 = 2;
}

/// Subsurface scattering configuration
///
/// Owned by the host component and read every frame by the parameter store.
/// Only `blur_iterations`, `screen_space_sss` and `pipeline` are structural:
/// changing them requires a pass graph rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SssConfig {
    pub lut_profile: LutProfile,
    pub skin_lut_bias: f32,
    pub skin_lut_scale: f32,
    pub shadow_lut_bias: f32,
    pub shadow_lut_scale: f32,

    pub screen_space_sss: bool,
    pub blur_weight: f32,
    /// Blur kernel radius in pixels
    pub blur_radius: f32,
    /// Depth-aware falloff; scaled by 100 before it reaches the programs
    pub blur_depth_range: f32,
    /// Separable blur iterations (one horizontal + one vertical pass each)
    pub blur_iterations: u32,
    pub blur_albedo: bool,

    pub color_bleed_weights: Vec3,
    pub transmission_absorption: Vec3,

    pub baked_thickness: bool,
    pub transmission_weight: f32,
    pub transmission_shadow_weight: f32,
    pub transmission_distortion: f32,
    pub transmission_falloff: f32,
    /// Thickness bias in percent; scaled by 0.01 when published
    pub thickness_bias: f32,

    pub pipeline: PipelineProfile,
}

impl Default for SssConfig {
    fn default() -> Self {
        Self {
            lut_profile: LutProfile::None,
            skin_lut_bias: 0.0,
            skin_lut_scale: 0.5,
            shadow_lut_bias: 0.0,
            shadow_lut_scale: 1.0,
            screen_space_sss: true,
            blur_weight: 1.0,
            blur_radius: 50.0,
            blur_depth_range: 1.0,
            blur_iterations: 3,
            blur_albedo: true,
            color_bleed_weights: Vec3::new(0.40, 0.15, 0.20),
            transmission_absorption: Vec3::new(-8.0, -48.0, -64.0),
            baked_thickness: true,
            transmission_weight: 1.0,
            transmission_shadow_weight: 0.5,
            transmission_distortion: 0.5,
            transmission_falloff: 2.0,
            thickness_bias: 0.5,
            pipeline: PipelineProfile::Integrated,
        }
    }
}

impl SssConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lut_profile(mut self, profile: LutProfile) -> Self {
        self.lut_profile = profile;
        self
    }

    pub fn with_screen_space(mut self, enabled: bool) -> Self {
        self.screen_space_sss = enabled;
        self
    }

    pub fn with_blur_iterations(mut self, iterations: u32) -> Self {
        self.blur_iterations = iterations;
        self
    }

    /// Set the blur radius in pixels (clamped to be non-negative)
    pub fn with_blur_radius(mut self, radius: f32) -> Self {
        self.blur_radius = radius.max(0.0);
        self
    }

    pub fn with_blur_depth_range(mut self, range: f32) -> Self {
        self.blur_depth_range = range.max(0.0);
        self
    }

    pub fn with_blur_albedo(mut self, blur_albedo: bool) -> Self {
        self.blur_albedo = blur_albedo;
        self
    }

    pub fn with_baked_thickness(mut self, baked: bool) -> Self {
        self.baked_thickness = baked;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineProfile) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Whether the diffuse blur list is part of the graph
    pub fn diffuse_blur_active(&self) -> bool {
        match self.pipeline {
            PipelineProfile::Integrated => self.screen_space_sss,
            PipelineProfile::Standalone => true,
            PipelineProfile::HsrCompatible => false,
        }
    }

    /// Iteration count the graph is actually built with
    pub fn effective_iterations(&self) -> u32 {
        match self.pipeline {
            PipelineProfile::Standalone => PipelineProfile::STANDALONE_ITERATIONS,
            _ => self.blur_iterations,
        }
    }
}

/// Lookup and jitter textures, loaded by the host and passed in as handles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupTextures {
    pub skin_jitter: Option<TextureHandle>,
    pub nvidia_diffuse: Option<TextureHandle>,
    pub nvidia_shadow: Option<TextureHandle>,
    pub deep_scatter: Option<TextureHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SssConfig =
            serde_json::from_str(r#"{ "blur_iterations": 5, "lut_profile": "nvidia2" }"#).unwrap();
        assert_eq!(config.blur_iterations, 5);
        assert_eq!(config.lut_profile, LutProfile::Nvidia2);
        assert_eq!(config.blur_radius, 50.0);
        assert_eq!(config.pipeline, PipelineProfile::Integrated);
    }

    #[test]
    fn negative_iterations_are_rejected() {
        let parsed = serde_json::from_str::<SssConfig>(r#"{ "blur_iterations": -1 }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn standalone_pins_iterations_and_diffuse() {
        let config = SssConfig::new()
            .with_blur_iterations(7)
            .with_screen_space(false)
            .with_pipeline(PipelineProfile::Standalone);
        assert_eq!(config.effective_iterations(), 2);
        assert!(config.diffuse_blur_active());
    }

    #[test]
    fn builders_clamp() {
        let config = SssConfig::new().with_blur_radius(-3.0).with_blur_depth_range(-1.0);
        assert_eq!(config.blur_radius, 0.0);
        assert_eq!(config.blur_depth_range, 0.0);
    }
}
