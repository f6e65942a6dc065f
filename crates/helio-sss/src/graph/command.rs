//! Recorded command lists
//!
//! A command list is an ordered recording of blits and bindings that the
//! host executes at one insertion point. Nothing here touches the GPU; the
//! list is data until the host runs it.

use super::resource::{TargetId, TextureSource};
use crate::program::{ProgramKind, ProgramSet};
use crate::resources::TargetDesc;
use crate::{Error, Result};
use std::collections::HashSet;

/// Program + sub-pass used by a blit
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct ProgramPass {
    pub program: ProgramKind,
    pub pass: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Allocate a scratch target for the rest of this execution
    GetTemporary {
        id: TargetId,
        name: String,
        desc: TargetDesc,
    },
    /// Full-screen pass from `src` into `dst`; `None` is a plain copy
    Blit {
        src: TextureSource,
        dst: TextureSource,
        program: Option<ProgramPass>,
    },
    /// Publish a texture under a global parameter name
    SetGlobalTexture { name: String, source: TextureSource },
    ReleaseTemporary { id: TargetId },
}

/// A named, ordered command recording
#[derive(Debug, Clone, PartialEq)]
pub struct CommandList {
    name: String,
    commands: Vec<Command>,
    /// Temporaries allocated by an earlier list and consumed here
    imports: Vec<TargetId>,
}

impl CommandList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            imports: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn imports(&self) -> &[TargetId] {
        &self.imports
    }

    /// Declare a temporary that an earlier list leaves alive for this one
    pub fn import_temporary(&mut self, id: TargetId) -> &mut Self {
        self.imports.push(id);
        self
    }

    pub fn get_temporary(&mut self, name: &str, desc: TargetDesc) -> TargetId {
        let id = TargetId::named(name);
        self.commands.push(Command::GetTemporary {
            id,
            name: name.to_string(),
            desc,
        });
        id
    }

    pub fn blit(&mut self, src: impl Into<TextureSource>, dst: impl Into<TextureSource>) -> &mut Self {
        self.commands.push(Command::Blit {
            src: src.into(),
            dst: dst.into(),
            program: None,
        });
        self
    }

    pub fn blit_with(
        &mut self,
        src: impl Into<TextureSource>,
        dst: impl Into<TextureSource>,
        program: ProgramKind,
        pass: u32,
    ) -> &mut Self {
        self.commands.push(Command::Blit {
            src: src.into(),
            dst: dst.into(),
            program: Some(ProgramPass { program, pass }),
        });
        self
    }

    pub fn set_global_texture(&mut self, name: &str, source: impl Into<TextureSource>) -> &mut Self {
        self.commands.push(Command::SetGlobalTexture {
            name: name.to_string(),
            source: source.into(),
        });
        self
    }

    pub fn release_temporary(&mut self, id: TargetId) -> &mut Self {
        self.commands.push(Command::ReleaseTemporary { id });
        self
    }

    /// Every blit, program or plain
    pub fn blit_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Blit { .. }))
            .count()
    }

    /// Blits running `program` sub-pass `pass`
    pub fn pass_count(&self, program: ProgramKind, pass: u32) -> usize {
        let wanted = Some(ProgramPass { program, pass });
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Blit { program, .. } if *program == wanted))
            .count()
    }

    /// Temporaries this list allocates and leaves alive for a later list
    pub fn exported_temporaries(&self) -> Vec<TargetId> {
        let mut live = Vec::new();
        for command in &self.commands {
            match command {
                Command::GetTemporary { id, .. } => live.push(*id),
                Command::ReleaseTemporary { id } => live.retain(|t| t != id),
                _ => {}
            }
        }
        live
    }

    /// Check the recording against the resource rules
    ///
    /// - temporaries are used only between their allocation and release
    ///   (or, for imports, before their release)
    /// - a blit never reads and writes the same target
    /// - program sub-pass indices exist
    pub fn validate(&self, programs: &ProgramSet) -> Result<()> {
        let mut live: HashSet<TargetId> = self.imports.iter().copied().collect();
        let err = |msg: String| -> Result<()> { Err(Error::Graph(format!("{}: {}", self.name, msg))) };

        for (i, command) in self.commands.iter().enumerate() {
            match command {
                Command::GetTemporary { id, name, .. } => {
                    if !live.insert(*id) {
                        return err(format!("command {i}: '{name}' allocated twice"));
                    }
                }
                Command::Blit { src, dst, program } => {
                    if src == dst {
                        return err(format!("command {i}: blit reads and writes {src:?}"));
                    }
                    for target in [src, dst].into_iter().filter_map(TextureSource::temporary) {
                        if !live.contains(&target) {
                            return err(format!("command {i}: {target:?} used while not allocated"));
                        }
                    }
                    if let Some(pp) = program {
                        let resolved = programs.get(pp.program);
                        if pp.pass >= resolved.pass_count {
                            return err(format!(
                                "command {i}: {} has no pass {}",
                                resolved.name, pp.pass
                            ));
                        }
                    }
                }
                Command::SetGlobalTexture { source, .. } => {
                    if let Some(target) = source.temporary() {
                        if !live.contains(&target) {
                            return err(format!("command {i}: publishing released {target:?}"));
                        }
                    }
                }
                Command::ReleaseTemporary { id } => {
                    if !live.remove(id) {
                        return err(format!("command {i}: release of {id:?} which is not live"));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::resource::BuiltinTarget;
    use crate::program::ProgramLibrary;

    fn programs() -> ProgramSet {
        ProgramSet::resolve(&ProgramLibrary::with_effect_programs()).unwrap()
    }

    fn scratch() -> TargetDesc {
        TargetDesc::temporary(wgpu::TextureFormat::Rgba16Float)
    }

    #[test]
    fn aliasing_blit_is_rejected() {
        let mut list = CommandList::new("alias");
        let flip = list.get_temporary("flip", scratch());
        list.blit_with(flip, flip, ProgramKind::Main, 1);
        assert!(matches!(list.validate(&programs()), Err(Error::Graph(_))));
    }

    #[test]
    fn use_after_release_is_rejected() {
        let mut list = CommandList::new("late");
        let flip = list.get_temporary("flip", scratch());
        list.release_temporary(flip);
        list.blit(flip, BuiltinTarget::CameraTarget);
        assert!(list.validate(&programs()).is_err());
    }

    #[test]
    fn unknown_sub_pass_is_rejected() {
        let mut list = CommandList::new("bad-pass");
        let flip = list.get_temporary("flip", scratch());
        list.blit_with(BuiltinTarget::CurrentActive, flip, ProgramKind::PrePass, 3);
        assert!(list.validate(&programs()).is_err());
    }

    #[test]
    fn imports_may_be_released_by_the_consumer() {
        let shared = TargetId::named("shared");
        let mut list = CommandList::new("consumer");
        list.import_temporary(shared);
        list.blit(shared, BuiltinTarget::CameraTarget);
        list.release_temporary(shared);
        assert!(list.validate(&programs()).is_ok());
        assert!(list.exported_temporaries().is_empty());
    }

    #[test]
    fn counts() {
        let mut list = CommandList::new("count");
        let flip = list.get_temporary("flip", scratch());
        let flop = list.get_temporary("flop", scratch());
        list.blit_with(flip, flop, ProgramKind::Main, 1)
            .blit_with(flop, flip, ProgramKind::Main, 2)
            .blit_with(flip, flop, ProgramKind::Main, 1)
            .blit(flop, BuiltinTarget::CameraTarget)
            .release_temporary(flip);

        assert_eq!(list.blit_count(), 4);
        assert_eq!(list.pass_count(ProgramKind::Main, 1), 2);
        assert_eq!(list.pass_count(ProgramKind::Main, 2), 1);
        assert_eq!(list.exported_temporaries(), vec![flop]);
    }
}
