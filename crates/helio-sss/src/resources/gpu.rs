//! wgpu-backed target allocator

use super::{Extent, TargetAllocator, TargetDesc, TextureHandle};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A live target: texture plus the view/sampler the host binds
pub struct GpuTarget {
    pub texture: wgpu::Texture,
    pub view: Arc<wgpu::TextureView>,
    pub sampler: Arc<wgpu::Sampler>,
    pub extent: Extent,
}

/// Allocates render targets on a real device
///
/// Creation runs inside a validation error scope so an unsupported
/// format/usage combination surfaces as [`Error::Resource`] instead of a
/// device-lost panic later in the frame.
pub struct WgpuTargetAllocator {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    targets: Mutex<HashMap<TextureHandle, GpuTarget>>,
}

impl WgpuTargetAllocator {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            targets: Mutex::new(HashMap::new()),
        }
    }

    /// View of a live target, for binding as a random-write / sampled texture
    pub fn view(&self, handle: TextureHandle) -> Option<Arc<wgpu::TextureView>> {
        self.targets.lock().get(&handle).map(|t| t.view.clone())
    }

    pub fn sampler(&self, handle: TextureHandle) -> Option<Arc<wgpu::Sampler>> {
        self.targets.lock().get(&handle).map(|t| t.sampler.clone())
    }

    pub fn extent(&self, handle: TextureHandle) -> Option<Extent> {
        self.targets.lock().get(&handle).map(|t| t.extent)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn pop_validation_scope(&self) -> Option<wgpu::Error> {
        pollster::block_on(self.device.pop_error_scope())
    }

    // No blocking on the web; validation errors reach the uncaptured handler.
    #[cfg(target_arch = "wasm32")]
    fn pop_validation_scope(&self) -> Option<wgpu::Error> {
        let _ = self.device.pop_error_scope();
        None
    }
}

impl TargetAllocator for WgpuTargetAllocator {
    fn create(&self, label: &str, desc: &TargetDesc, camera: Extent) -> Result<TextureHandle> {
        let extent = desc.extent(camera);
        if extent.is_empty() {
            return Err(Error::Resource(format!("'{label}' has zero size ({extent})")));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&desc.to_texture_descriptor(Some(label), camera));
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            ..Default::default()
        });
        let sampler = self.device.create_sampler(&desc.to_sampler_descriptor(Some(label)));

        if let Some(err) = self.pop_validation_scope() {
            texture.destroy();
            return Err(Error::Resource(format!("failed to create '{label}' ({:?}): {err}", desc.format)));
        }

        let handle = TextureHandle::new();
        log::debug!("Created target '{}' {} {:?} as {:?}", label, extent, desc.format, handle);
        self.targets.lock().insert(
            handle,
            GpuTarget {
                texture,
                view: Arc::new(view),
                sampler: Arc::new(sampler),
                extent,
            },
        );
        Ok(handle)
    }

    fn clear(&self, handle: TextureHandle) -> Result<()> {
        let view = self
            .view(handle)
            .ok_or_else(|| Error::Resource(format!("clear of unknown target {handle:?}")))?;

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("SSS Target Clear"),
        });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("SSS Target Clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn release(&self, handle: TextureHandle) {
        if let Some(target) = self.targets.lock().remove(&handle) {
            log::trace!("Releasing target {:?}", handle);
            target.texture.destroy();
        }
    }

    fn live_count(&self) -> usize {
        self.targets.lock().len()
    }
}
