//! Specular accumulation buffers
//!
//! Three single-channel targets (one per colour channel) that the lighting
//! stage writes specular into from arbitrary pixels. They live for exactly
//! one frame: acquired before the host runs its lists, released after the
//! final colour pass.

use crate::host::RenderHost;
use crate::params::{names, ParameterBus};
use crate::resources::{Extent, TargetAllocator, TargetDesc, TextureHandle};
use crate::{Error, Result};
use std::sync::Arc;

/// First random-write slot; R, G, B take three consecutive slots
pub const FIRST_RANDOM_WRITE_SLOT: u32 = 1;

const LABELS: [&str; 3] = ["sss_specular_r", "sss_specular_g", "sss_specular_b"];

/// The three targets of one frame
///
/// Dropping the scope releases the targets through the allocator, so an
/// early return anywhere between acquire and release still cleans up.
pub struct FrameScope {
    allocator: Arc<dyn TargetAllocator>,
    handles: [TextureHandle; 3],
    extent: Extent,
}

impl FrameScope {
    /// Create and clear all three targets, or none of them
    pub fn allocate(allocator: Arc<dyn TargetAllocator>, extent: Extent) -> Result<Self> {
        let desc = TargetDesc::specular_accumulation(extent);
        let mut created = Vec::with_capacity(LABELS.len());

        let result = LABELS.iter().try_for_each(|label| {
            let handle = allocator.create(label, &desc, extent)?;
            created.push(handle);
            allocator.clear(handle)
        });

        if let Err(e) = result {
            for handle in created {
                allocator.release(handle);
            }
            return Err(e);
        }

        let handles = [created[0], created[1], created[2]];
        log::trace!("Specular buffers acquired at {} ({:?})", extent, handles);
        Ok(Self {
            allocator,
            handles,
            extent,
        })
    }

    /// R, G, B handles
    pub fn handles(&self) -> [TextureHandle; 3] {
        self.handles
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }
}

impl Drop for FrameScope {
    fn drop(&mut self) {
        for handle in self.handles {
            self.allocator.release(handle);
        }
        log::trace!("Specular buffers released");
    }
}

/// Owns at most one [`FrameScope`] and publishes it to the host
pub struct SpecularBuffers {
    allocator: Arc<dyn TargetAllocator>,
    scope: Option<FrameScope>,
}

impl SpecularBuffers {
    pub fn new(allocator: Arc<dyn TargetAllocator>) -> Self {
        Self {
            allocator,
            scope: None,
        }
    }

    /// Allocate this frame's buffers, publish them and bind the random-write slots
    ///
    /// Size is the host's bound target texture if any, else the viewport,
    /// captured now. Calling this again before [`release`](Self::release)
    /// is a lifecycle bug and returns [`Error::AlreadyAcquired`] without
    /// touching the held buffers.
    pub fn acquire(&mut self, host: &mut dyn RenderHost, bus: &mut dyn ParameterBus) -> Result<&FrameScope> {
        if self.scope.is_some() {
            log::warn!("Specular buffers acquired twice without release");
            return Err(Error::AlreadyAcquired);
        }

        let scope = FrameScope::allocate(self.allocator.clone(), host.output_extent())?;

        host.clear_random_write_targets();
        for ((slot, name), handle) in (FIRST_RANDOM_WRITE_SLOT..)
            .zip(names::SPECULAR_BUFFERS)
            .zip(scope.handles())
        {
            bus.set_texture(name, Some(handle));
            host.set_random_write_target(slot, handle);
        }

        Ok(&*self.scope.insert(scope))
    }

    /// Release the held buffers; returns false (and does nothing) if none are held
    pub fn release(&mut self, host: &mut dyn RenderHost, bus: &mut dyn ParameterBus) -> bool {
        let Some(scope) = self.scope.take() else {
            return false;
        };

        host.clear_random_write_targets();
        for name in names::SPECULAR_BUFFERS {
            bus.set_texture(name, None);
        }
        drop(scope);
        true
    }

    pub fn is_acquired(&self) -> bool {
        self.scope.is_some()
    }

    pub fn scope(&self) -> Option<&FrameScope> {
        self.scope.as_ref()
    }

    /// Size of the held buffers
    pub fn extent(&self) -> Option<Extent> {
        self.scope.as_ref().map(FrameScope::extent)
    }
}
