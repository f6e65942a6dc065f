//! Boundary with the host rendering pipeline

use crate::graph::{CommandList, InsertionPoint};
use crate::resources::{Extent, TextureHandle};
use glam::Mat4;
use std::sync::Arc;

/// The host pipeline as seen by the effect
///
/// The host owns the fixed stage order. Lists added at the same insertion
/// point run in registration order; lists at different points run in the
/// order of [`InsertionPoint::stage_order`].
pub trait RenderHost {
    /// Register a list to run at `point` every frame
    fn add_command_list(&mut self, point: InsertionPoint, list: Arc<CommandList>);

    /// Remove the list named `name` from `point`; returns whether one was removed
    fn remove_command_list(&mut self, point: InsertionPoint, name: &str) -> bool;

    /// Lists currently registered at `point`, in execution order
    fn command_lists(&self, point: InsertionPoint) -> Vec<Arc<CommandList>>;

    /// Pixel size of the active viewport
    fn viewport(&self) -> Extent;

    /// Size of the explicitly bound output texture, if the camera has one
    fn target_texture_size(&self) -> Option<Extent>;

    /// World-to-view transform of the rendering camera
    fn view_matrix(&self) -> Mat4;

    /// View-to-clip transform of the rendering camera
    fn projection_matrix(&self) -> Mat4;

    fn clear_random_write_targets(&mut self);

    /// Bind `texture` as random-write target `slot` for later draws/dispatches
    fn set_random_write_target(&mut self, slot: u32, texture: TextureHandle);

    /// Size of whatever the camera renders into this frame
    fn output_extent(&self) -> Extent {
        self.target_texture_size().unwrap_or_else(|| self.viewport())
    }
}
