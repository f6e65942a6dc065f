//! Headless reference host and allocator
//!
//! [`HeadlessHost`] implements [`RenderHost`] in memory and runs command
//! lists symbolically: temporaries get fresh handles, blits are logged, and
//! global texture bindings go to the parameter bus. Resource rules that a
//! GPU would only hit as corruption (reading a released target, leaking a
//! temporary past the end of the frame) are reported as errors instead.
//!
//! [`HeadlessAllocator`] counts live targets and can inject failures.

use crate::graph::{BuiltinTarget, Command, CommandList, InsertionPoint, ProgramPass, TargetId, TextureSource};
use crate::host::RenderHost;
use crate::params::ParameterBus;
use crate::resources::{Extent, TargetAllocator, TargetDesc, TextureHandle};
use crate::{Error, Result};
use glam::Mat4;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One executed blit
#[derive(Debug, Clone, PartialEq)]
pub struct BlitRecord {
    pub list: String,
    pub src: TextureHandle,
    pub dst: TextureHandle,
    pub program: Option<ProgramPass>,
}

#[derive(Debug, Clone)]
struct LiveTemporary {
    handle: TextureHandle,
    extent: Extent,
}

/// In-memory host pipeline
pub struct HeadlessHost {
    lists: BTreeMap<InsertionPoint, Vec<Arc<CommandList>>>,
    viewport: Extent,
    target_texture: Option<Extent>,
    view: Mat4,
    projection: Mat4,
    random_write: BTreeMap<u32, TextureHandle>,
    camera_target: TextureHandle,
    current_active: TextureHandle,
    gbuffer_normal: TextureHandle,
    temporaries: HashMap<TargetId, LiveTemporary>,
    blits: Vec<BlitRecord>,
    frames: u64,
}

impl HeadlessHost {
    pub fn new(viewport: Extent) -> Self {
        Self {
            lists: BTreeMap::new(),
            viewport,
            target_texture: None,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            random_write: BTreeMap::new(),
            camera_target: TextureHandle::new(),
            current_active: TextureHandle::new(),
            gbuffer_normal: TextureHandle::new(),
            temporaries: HashMap::new(),
            blits: Vec::new(),
            frames: 0,
        }
    }

    pub fn set_viewport(&mut self, viewport: Extent) {
        self.viewport = viewport;
    }

    /// Bind (or unbind) an explicit output texture for the camera
    pub fn set_target_texture(&mut self, extent: Option<Extent>) {
        self.target_texture = extent;
    }

    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
    }

    pub fn builtin(&self, target: BuiltinTarget) -> TextureHandle {
        match target {
            BuiltinTarget::CameraTarget => self.camera_target,
            BuiltinTarget::CurrentActive => self.current_active,
            BuiltinTarget::GBufferNormal => self.gbuffer_normal,
        }
    }

    pub fn random_write_targets(&self) -> &BTreeMap<u32, TextureHandle> {
        &self.random_write
    }

    /// Registrations at every point
    pub fn registration_count(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    /// Whether any point holds two lists with the same name
    pub fn has_duplicate_registrations(&self) -> bool {
        self.lists.values().any(|lists| {
            lists
                .iter()
                .enumerate()
                .any(|(i, a)| lists[i + 1..].iter().any(|b| a.name() == b.name()))
        })
    }

    /// Temporaries allocated and not yet released
    pub fn live_temporaries(&self) -> usize {
        self.temporaries.len()
    }

    /// Blits executed since the start of the last frame
    pub fn blits(&self) -> &[BlitRecord] {
        &self.blits
    }

    pub fn frames_executed(&self) -> u64 {
        self.frames
    }

    /// Run every list registered at `point`; returns the number of blits
    pub fn execute(&mut self, point: InsertionPoint, bus: &mut dyn ParameterBus) -> Result<usize> {
        let lists = self.command_lists(point);
        let before = self.blits.len();
        for list in lists {
            self.execute_list(&list, bus)?;
        }
        Ok(self.blits.len() - before)
    }

    /// Run one frame: every insertion point in stage order
    ///
    /// Fails if a list leaves a temporary alive at the end of the frame.
    pub fn execute_frame(&mut self, bus: &mut dyn ParameterBus) -> Result<usize> {
        self.blits.clear();
        let mut total = 0;
        for point in InsertionPoint::ALL {
            total += self.execute(point, bus)?;
        }
        self.frames += 1;

        if !self.temporaries.is_empty() {
            let leaked = self.temporaries.len();
            self.temporaries.clear();
            return Err(Error::Graph(format!("{leaked} temporaries alive at end of frame")));
        }
        log::trace!("Headless frame {} executed {} blits", self.frames, total);
        Ok(total)
    }

    fn resolve(&self, list: &str, source: TextureSource) -> Result<TextureHandle> {
        match source {
            TextureSource::Builtin(target) => Ok(self.builtin(target)),
            TextureSource::Temporary(id) => self
                .temporaries
                .get(&id)
                .map(|t| t.handle)
                .ok_or_else(|| Error::Graph(format!("{list}: {id:?} read while not allocated"))),
        }
    }

    fn execute_list(&mut self, list: &CommandList, bus: &mut dyn ParameterBus) -> Result<()> {
        let camera = self.output_extent();
        for command in list.commands() {
            match command {
                Command::GetTemporary { id, name, desc } => {
                    if self.temporaries.contains_key(id) {
                        return Err(Error::Graph(format!("{}: '{name}' allocated twice", list.name())));
                    }
                    let temporary = LiveTemporary {
                        handle: TextureHandle::new(),
                        extent: desc.extent(camera),
                    };
                    log::trace!("{}: '{}' -> {:?} ({})", list.name(), name, temporary.handle, temporary.extent);
                    self.temporaries.insert(*id, temporary);
                }
                Command::Blit { src, dst, program } => {
                    let src = self.resolve(list.name(), *src)?;
                    let dst = self.resolve(list.name(), *dst)?;
                    if src == dst {
                        return Err(Error::Graph(format!("{}: blit reads and writes {src:?}", list.name())));
                    }
                    self.blits.push(BlitRecord {
                        list: list.name().to_string(),
                        src,
                        dst,
                        program: *program,
                    });
                }
                Command::SetGlobalTexture { name, source } => {
                    let handle = self.resolve(list.name(), *source)?;
                    bus.set_texture(name, Some(handle));
                }
                Command::ReleaseTemporary { id } => {
                    if self.temporaries.remove(id).is_none() {
                        return Err(Error::Graph(format!("{}: release of {id:?} which is not live", list.name())));
                    }
                }
            }
        }
        Ok(())
    }
}

impl RenderHost for HeadlessHost {
    fn add_command_list(&mut self, point: InsertionPoint, list: Arc<CommandList>) {
        self.lists.entry(point).or_default().push(list);
    }

    fn remove_command_list(&mut self, point: InsertionPoint, name: &str) -> bool {
        let Some(lists) = self.lists.get_mut(&point) else {
            return false;
        };
        match lists.iter().position(|l| l.name() == name) {
            Some(index) => {
                lists.remove(index);
                true
            }
            None => false,
        }
    }

    fn command_lists(&self, point: InsertionPoint) -> Vec<Arc<CommandList>> {
        self.lists.get(&point).cloned().unwrap_or_default()
    }

    fn viewport(&self) -> Extent {
        self.viewport
    }

    fn target_texture_size(&self) -> Option<Extent> {
        self.target_texture
    }

    fn view_matrix(&self) -> Mat4 {
        self.view
    }

    fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    fn clear_random_write_targets(&mut self) {
        self.random_write.clear();
    }

    fn set_random_write_target(&mut self, slot: u32, texture: TextureHandle) {
        self.random_write.insert(slot, texture);
    }
}

#[derive(Debug, Clone)]
struct AllocatedTarget {
    label: String,
    extent: Extent,
    format: wgpu::TextureFormat,
    cleared: bool,
}

#[derive(Debug, Default)]
struct AllocatorState {
    live: HashMap<TextureHandle, AllocatedTarget>,
    created: usize,
    /// Successful creates left before every create fails
    remaining: Option<usize>,
}

/// Allocator that only does bookkeeping
#[derive(Debug, Default)]
pub struct HeadlessAllocator {
    state: Mutex<AllocatorState>,
}

impl HeadlessAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `successes` more creates through, then fail every create
    pub fn fail_after(&self, successes: usize) {
        self.state.lock().remaining = Some(successes);
    }

    pub fn stop_failing(&self) {
        self.state.lock().remaining = None;
    }

    /// Targets created over the allocator's lifetime
    pub fn total_created(&self) -> usize {
        self.state.lock().created
    }

    pub fn extent_of(&self, handle: TextureHandle) -> Option<Extent> {
        self.state.lock().live.get(&handle).map(|t| t.extent)
    }

    pub fn format_of(&self, handle: TextureHandle) -> Option<wgpu::TextureFormat> {
        self.state.lock().live.get(&handle).map(|t| t.format)
    }

    pub fn label_of(&self, handle: TextureHandle) -> Option<String> {
        self.state.lock().live.get(&handle).map(|t| t.label.clone())
    }

    pub fn is_live(&self, handle: TextureHandle) -> bool {
        self.state.lock().live.contains_key(&handle)
    }

    pub fn is_cleared(&self, handle: TextureHandle) -> bool {
        self.state.lock().live.get(&handle).is_some_and(|t| t.cleared)
    }
}

impl TargetAllocator for HeadlessAllocator {
    fn create(&self, label: &str, desc: &TargetDesc, camera: Extent) -> Result<TextureHandle> {
        let mut state = self.state.lock();
        if let Some(remaining) = state.remaining.as_mut() {
            if *remaining == 0 {
                return Err(Error::Resource(format!("'{label}': allocation refused")));
            }
            *remaining -= 1;
        }

        let extent = desc.extent(camera);
        if extent.is_empty() {
            return Err(Error::Resource(format!("'{label}' has zero size ({extent})")));
        }

        let handle = TextureHandle::new();
        state.live.insert(
            handle,
            AllocatedTarget {
                label: label.to_string(),
                extent,
                format: desc.format,
                cleared: false,
            },
        );
        state.created += 1;
        Ok(handle)
    }

    fn clear(&self, handle: TextureHandle) -> Result<()> {
        match self.state.lock().live.get_mut(&handle) {
            Some(target) => {
                target.cleared = true;
                Ok(())
            }
            None => Err(Error::Resource(format!("clear of unknown target {handle:?}"))),
        }
    }

    fn release(&self, handle: TextureHandle) {
        self.state.lock().live.remove(&handle);
    }

    fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }
}
