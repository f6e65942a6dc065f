//! Render-target descriptions and the allocator seam
//!
//! Targets are described with plain wgpu vocabulary (format, filter, wrap,
//! usage) so the same description drives both the headless allocator and
//! [`gpu::WgpuTargetAllocator`].

pub mod gpu;

use crate::Result;
use std::fmt;

/// Opaque handle to a texture owned by an allocator or by the host
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

impl TextureHandle {
    /// Create a new, process-unique handle
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TextureHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Pixel dimensions of a render target
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn to_wgpu(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How a target's size is determined
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum TargetSize {
    /// Match the camera's output target when the list executes
    Camera,
    Fixed(Extent),
}

/// Description of a render target
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct TargetDesc {
    pub size: TargetSize,
    pub format: wgpu::TextureFormat,
    pub filter: wgpu::FilterMode,
    pub address_mode: wgpu::AddressMode,
    /// Writable from arbitrary pixel locations (storage binding)
    pub random_write: bool,
    pub mip_level_count: u32,
}

impl TargetDesc {
    /// Point-filtered, clamped, camera-sized scratch target
    pub fn temporary(format: wgpu::TextureFormat) -> Self {
        Self {
            size: TargetSize::Camera,
            format,
            filter: wgpu::FilterMode::Nearest,
            address_mode: wgpu::AddressMode::ClampToEdge,
            random_write: false,
            mip_level_count: 1,
        }
    }

    /// Single-channel half-float random-write target, no mips
    pub fn specular_accumulation(extent: Extent) -> Self {
        Self {
            size: TargetSize::Fixed(extent),
            format: wgpu::TextureFormat::R16Float,
            filter: wgpu::FilterMode::Nearest,
            address_mode: wgpu::AddressMode::ClampToEdge,
            random_write: true,
            mip_level_count: 1,
        }
    }

    /// Resolve the final size against the camera's current output size
    pub fn extent(&self, camera: Extent) -> Extent {
        match self.size {
            TargetSize::Camera => camera,
            TargetSize::Fixed(extent) => extent,
        }
    }

    pub fn usage(&self) -> wgpu::TextureUsages {
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        if self.random_write {
            usage |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        usage
    }

    pub fn to_texture_descriptor<'a>(&self, label: Option<&'a str>, camera: Extent) -> wgpu::TextureDescriptor<'a> {
        wgpu::TextureDescriptor {
            label,
            size: self.extent(camera).to_wgpu(),
            mip_level_count: self.mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: self.usage(),
            view_formats: &[],
        }
    }

    pub fn to_sampler_descriptor<'a>(&self, label: Option<&'a str>) -> wgpu::SamplerDescriptor<'a> {
        wgpu::SamplerDescriptor {
            label,
            address_mode_u: self.address_mode,
            address_mode_v: self.address_mode,
            address_mode_w: self.address_mode,
            mag_filter: self.filter,
            min_filter: self.filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        }
    }
}

/// Creates and destroys render targets outside of command lists
///
/// Methods take `&self` so one allocator can be shared (`Arc`) between the
/// effect and the [`crate::specular::FrameScope`]s it hands out.
pub trait TargetAllocator: Send + Sync {
    /// Create a target sized to `camera` (or the desc's fixed size)
    fn create(&self, label: &str, desc: &TargetDesc, camera: Extent) -> Result<TextureHandle>;

    /// Clear every texel to zero
    fn clear(&self, handle: TextureHandle) -> Result<()>;

    /// Destroy a target; unknown handles are ignored
    fn release(&self, handle: TextureHandle);

    /// Number of targets created and not yet released
    fn live_count(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specular_desc_is_random_write_without_mips() {
        let desc = TargetDesc::specular_accumulation(Extent::new(640, 360));
        let tex = desc.to_texture_descriptor(Some("specular"), Extent::new(1, 1));
        assert_eq!(tex.size.width, 640);
        assert_eq!(tex.size.height, 360);
        assert_eq!(tex.mip_level_count, 1);
        assert_eq!(tex.format, wgpu::TextureFormat::R16Float);
        assert!(tex.usage.contains(wgpu::TextureUsages::STORAGE_BINDING));

        let sampler = desc.to_sampler_descriptor(None);
        assert_eq!(sampler.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(sampler.address_mode_u, wgpu::AddressMode::ClampToEdge);
    }

    #[test]
    fn temporaries_follow_the_camera() {
        let desc = TargetDesc::temporary(wgpu::TextureFormat::Rgba16Float);
        assert_eq!(desc.extent(Extent::new(800, 600)), Extent::new(800, 600));
        assert!(!desc.usage().contains(wgpu::TextureUsages::STORAGE_BINDING));
    }

    #[test]
    fn handles_are_unique() {
        assert_ne!(TextureHandle::new(), TextureHandle::new());
    }
}
