//! Parameter store: configuration -> global shader state

use super::{Keywords, ParameterBus};
use crate::config::{LookupTextures, LutProfile, SssConfig};
use glam::{Mat4, Vec4};

/// Well-known global parameter names
pub mod names {
    pub const SKIN_PARAMS: &str = "deferred_skin_params";
    pub const SHADOW_PARAMS: &str = "deferred_shadow_params";
    pub const COLOR_BLEED_WEIGHTS: &str = "deferred_skin_color_bleed_ao_weights";
    pub const TRANSMISSION_ABSORPTION: &str = "deferred_skin_transmission_absorption";
    pub const BLURRED_NORMALS_PARAMS: &str = "deferred_blurred_normals_params";
    pub const BLUR_ALBEDO: &str = "blur_albedo_texture";
    pub const SKIN_JITTER: &str = "skin_jitter";
    pub const SKIN_LUT: &str = "deferred_skin_lut";
    pub const SHADOW_LUT: &str = "deferred_shadow_lut";
    pub const TRANSMISSION_LUT: &str = "deferred_transmission_lut";
    pub const THICKNESS_BIAS: &str = "deferred_thickness_bias";
    pub const TRANSMISSION_PARAMS: &str = "deferred_transmission_params";

    pub const WORLD_TO_VIEW: &str = "world_to_view_matrix";
    pub const VIEW_TO_WORLD: &str = "view_to_world_matrix";
    pub const VIEW_TO_CLIP: &str = "view_to_clip_matrix";
    pub const CLIP_TO_VIEW: &str = "clip_to_view_matrix";

    pub const FRAME_COUNT: &str = "frame_count";
    pub const TRANSMISSION_BUFFER: &str = "deferred_transmission_buffer";
    pub const BLURRED_NORMAL_BUFFER: &str = "deferred_blurred_normal_buffer";
    pub const SPECULAR_BUFFERS: [&str; 3] = ["specular_buffer_r", "specular_buffer_g", "specular_buffer_b"];
}

/// Local parameters of the main blur program, laid out for a uniform buffer
///
/// Mirrors `deferred_blurred_normals_params` + `blur_albedo_texture` for
/// hosts that bind a uniform block instead of reading the bus.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlurUniforms {
    pub blur_radius: f32,
    /// Depth range, already scaled by 100
    pub depth_range: f32,
    pub blur_albedo: u32,
    pub _pad: u32,
}

impl BlurUniforms {
    pub fn from_config(config: &SssConfig) -> Self {
        Self {
            blur_radius: config.blur_radius,
            depth_range: config.blur_depth_range * 100.0,
            blur_albedo: config.blur_albedo as u32,
            _pad: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Translates [`SssConfig`] into global shader-visible state every frame
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    textures: LookupTextures,
    uniforms: Option<BlurUniforms>,
}

impl ParameterStore {
    pub fn new(textures: LookupTextures) -> Self {
        Self {
            textures,
            uniforms: None,
        }
    }

    pub fn textures(&self) -> &LookupTextures {
        &self.textures
    }

    pub fn set_textures(&mut self, textures: LookupTextures) {
        self.textures = textures;
    }

    /// Blur uniforms from the most recent refresh
    pub fn blur_uniforms(&self) -> Option<BlurUniforms> {
        self.uniforms
    }

    /// Push the whole configuration onto the bus
    pub fn refresh(&mut self, config: &SssConfig, bus: &mut dyn ParameterBus) {
        self.refresh_skin(config, bus);
        self.refresh_blur(config, bus);
        let keywords = self.refresh_lookup(config, bus) | self.refresh_transmission(config, bus);
        keywords.apply(bus);
        log::trace!("SSS parameters refreshed (keywords: {:?})", keywords);
    }

    /// Publish the camera transforms the blur programs use to rebuild view-space positions
    pub fn publish_camera(&self, view: Mat4, projection: Mat4, bus: &mut dyn ParameterBus) {
        bus.set_matrix(names::WORLD_TO_VIEW, view);
        bus.set_matrix(names::VIEW_TO_WORLD, view.inverse());
        bus.set_matrix(names::VIEW_TO_CLIP, projection);
        bus.set_matrix(names::CLIP_TO_VIEW, projection.inverse());
    }

    fn refresh_skin(&self, config: &SssConfig, bus: &mut dyn ParameterBus) {
        bus.set_vector(
            names::SKIN_PARAMS,
            Vec4::new(1.0, config.skin_lut_bias, config.skin_lut_scale, config.blur_weight),
        );
        bus.set_vector(
            names::SHADOW_PARAMS,
            Vec4::new(config.shadow_lut_bias, config.shadow_lut_scale, 0.0, 0.0),
        );
        bus.set_vector(names::COLOR_BLEED_WEIGHTS, config.color_bleed_weights.extend(0.0));
        bus.set_vector(names::TRANSMISSION_ABSORPTION, config.transmission_absorption.extend(0.0));
    }

    fn refresh_blur(&mut self, config: &SssConfig, bus: &mut dyn ParameterBus) {
        let uniforms = BlurUniforms::from_config(config);
        bus.set_vector(
            names::BLURRED_NORMALS_PARAMS,
            Vec4::new(uniforms.blur_radius, uniforms.depth_range, 0.0, 0.0),
        );
        bus.set_int(names::BLUR_ALBEDO, uniforms.blur_albedo as i32);
        bus.set_texture(names::SKIN_JITTER, self.textures.skin_jitter);
        self.uniforms = Some(uniforms);
    }

    /// Bind the lookup textures for the profile; returns its keywords
    fn refresh_lookup(&self, config: &SssConfig, bus: &mut dyn ParameterBus) -> Keywords {
        let mut keywords = match config.lut_profile {
            LutProfile::None => {
                bus.set_texture(names::SKIN_LUT, None);
                bus.set_texture(names::SHADOW_LUT, None);
                Keywords::empty()
            }
            LutProfile::Nvidia1 => {
                bus.set_texture(names::SKIN_LUT, self.textures.nvidia_diffuse);
                bus.set_texture(names::SHADOW_LUT, None);
                Keywords::FACEWORKS_TYPE1
            }
            LutProfile::Nvidia2 => {
                bus.set_texture(names::SKIN_LUT, self.textures.nvidia_diffuse);
                bus.set_texture(names::SHADOW_LUT, self.textures.nvidia_shadow);
                Keywords::FACEWORKS_TYPE2
            }
        };

        // lighting splits specular out only when the diffuse blur composites it back
        if config.diffuse_blur_active() {
            keywords |= Keywords::SCREENSPACE_SSS;
        }
        keywords
    }

    fn refresh_transmission(&self, config: &SssConfig, bus: &mut dyn ParameterBus) -> Keywords {
        let keywords = if config.baked_thickness {
            Keywords::BAKED_THICKNESS
        } else {
            bus.set_texture(names::TRANSMISSION_LUT, self.textures.deep_scatter);
            bus.set_float(names::THICKNESS_BIAS, config.thickness_bias * 0.01);
            Keywords::empty()
        };

        bus.set_vector(
            names::TRANSMISSION_PARAMS,
            Vec4::new(
                config.transmission_weight,
                config.transmission_falloff,
                config.transmission_distortion,
                config.transmission_shadow_weight,
            ),
        );
        keywords
    }
}
