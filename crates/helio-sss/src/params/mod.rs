//! Global shader-parameter namespace
//!
//! Pass programs read scalars, vectors, textures and keyword toggles from a
//! process-wide namespace. Components never touch that namespace directly;
//! they write through an injected [`ParameterBus`].

mod store;

pub use store::{names, BlurUniforms, ParameterStore};

use crate::resources::TextureHandle;
use bitflags::bitflags;
use glam::{Mat4, Vec4};
use std::collections::{BTreeSet, HashMap};

/// Value stored under a parameter name
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Int(i32),
    Vector(Vec4),
    Matrix(Mat4),
    Texture(Option<TextureHandle>),
}

/// Write access to the global shader-parameter namespace
///
/// Writes are immediately visible to command lists dispatched afterwards.
pub trait ParameterBus {
    fn set_float(&mut self, name: &str, value: f32);
    fn set_int(&mut self, name: &str, value: i32);
    fn set_vector(&mut self, name: &str, value: Vec4);
    fn set_matrix(&mut self, name: &str, value: Mat4);
    /// Bind (or with `None`, unbind) a global texture
    fn set_texture(&mut self, name: &str, texture: Option<TextureHandle>);
    fn set_keyword(&mut self, keyword: &str, enabled: bool);
}

bitflags! {
    /// Shader keywords owned by the effect
    ///
    /// The flag names are the keyword strings seen by the pass programs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Keywords: u32 {
        const FACEWORKS_TYPE1 = 1 << 0;
        const FACEWORKS_TYPE2 = 1 << 1;
        const SCREENSPACE_SSS = 1 << 2;
        const BAKED_THICKNESS = 1 << 3;
    }
}

impl Keywords {
    /// Write every owned keyword: those in `self` enabled, the rest disabled
    pub fn apply(self, bus: &mut dyn ParameterBus) {
        for (name, flag) in Keywords::all().iter_names() {
            bus.set_keyword(name, self.contains(flag));
        }
    }
}

/// In-memory parameter namespace
///
/// Used by the headless host and by hosts that batch parameters into their
/// own uniform upload.
#[derive(Debug, Default)]
pub struct GlobalParameters {
    values: HashMap<String, ParamValue>,
    keywords: BTreeSet<String>,
}

impl GlobalParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.values.get(name) {
            Some(ParamValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.values.get(name) {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn vector(&self, name: &str) -> Option<Vec4> {
        match self.values.get(name) {
            Some(ParamValue::Vector(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn matrix(&self, name: &str) -> Option<Mat4> {
        match self.values.get(name) {
            Some(ParamValue::Matrix(m)) => Some(*m),
            _ => None,
        }
    }

    /// Currently bound texture; `None` when unset or explicitly unbound
    pub fn texture(&self, name: &str) -> Option<TextureHandle> {
        match self.values.get(name) {
            Some(ParamValue::Texture(t)) => *t,
            _ => None,
        }
    }

    pub fn is_keyword_enabled(&self, keyword: &str) -> bool {
        self.keywords.contains(keyword)
    }

    /// Enabled keywords, sorted
    pub fn enabled_keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    /// Effect keywords currently enabled, as flags
    pub fn active_keywords(&self) -> Keywords {
        let mut flags = Keywords::empty();
        for (name, flag) in Keywords::all().iter_names() {
            if self.is_keyword_enabled(name) {
                flags |= flag;
            }
        }
        flags
    }
}

impl ParameterBus for GlobalParameters {
    fn set_float(&mut self, name: &str, value: f32) {
        self.values.insert(name.to_string(), ParamValue::Float(value));
    }

    fn set_int(&mut self, name: &str, value: i32) {
        self.values.insert(name.to_string(), ParamValue::Int(value));
    }

    fn set_vector(&mut self, name: &str, value: Vec4) {
        self.values.insert(name.to_string(), ParamValue::Vector(value));
    }

    fn set_matrix(&mut self, name: &str, value: Mat4) {
        self.values.insert(name.to_string(), ParamValue::Matrix(value));
    }

    fn set_texture(&mut self, name: &str, texture: Option<TextureHandle>) {
        self.values.insert(name.to_string(), ParamValue::Texture(texture));
    }

    fn set_keyword(&mut self, keyword: &str, enabled: bool) {
        if enabled {
            self.keywords.insert(keyword.to_string());
        } else {
            self.keywords.remove(keyword);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_disables_keywords_outside_the_set() {
        let mut bus = GlobalParameters::new();
        bus.set_keyword("FACEWORKS_TYPE1", true);
        bus.set_keyword("UNRELATED", true);

        (Keywords::FACEWORKS_TYPE2 | Keywords::BAKED_THICKNESS).apply(&mut bus);

        assert!(!bus.is_keyword_enabled("FACEWORKS_TYPE1"));
        assert!(bus.is_keyword_enabled("FACEWORKS_TYPE2"));
        assert!(bus.is_keyword_enabled("BAKED_THICKNESS"));
        // keywords the effect does not own are left alone
        assert!(bus.is_keyword_enabled("UNRELATED"));
        assert_eq!(bus.active_keywords(), Keywords::FACEWORKS_TYPE2 | Keywords::BAKED_THICKNESS);
    }

    #[test]
    fn unbinding_a_texture_reads_back_as_none() {
        let mut bus = GlobalParameters::new();
        let handle = TextureHandle::new();
        bus.set_texture("lut", Some(handle));
        assert_eq!(bus.texture("lut"), Some(handle));
        bus.set_texture("lut", None);
        assert_eq!(bus.texture("lut"), None);
        assert_eq!(bus.get("lut"), Some(&ParamValue::Texture(None)));
    }
}
