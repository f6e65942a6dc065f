//! Pass programs
//!
//! The blur and extraction shaders are opaque to this crate. A program is
//! known only by name and by how many sub-passes it exposes; command lists
//! refer to a program plus a sub-pass index.

use crate::{Error, Result};
use std::collections::HashMap;

/// Name of the thickness / transmission extraction program
pub const PREPASS_PROGRAM: &str = "hsss/sss_prepass";
/// Name of the blur program (diffuse + normal sub-passes)
pub const MAIN_PROGRAM: &str = "hsss/sss_main";

/// A resolved pass program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassProgram {
    pub name: String,
    pub pass_count: u32,
}

impl PassProgram {
    pub fn new(name: impl Into<String>, pass_count: u32) -> Self {
        Self {
            name: name.into(),
            pass_count,
        }
    }
}

/// Which of the two effect programs a command uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    PrePass,
    Main,
}

/// Sub-passes of the main program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MainPass {
    /// Lit colour -> flip
    DiffuseSeed = 0,
    DiffuseHorizontal = 1,
    DiffuseVertical = 2,
    /// Merge the blurred diffuse with the remaining lighting
    DiffuseCollect = 3,
    NormalHorizontal = 4,
    NormalVertical = 5,
}

impl MainPass {
    pub const COUNT: u32 = 6;

    pub fn index(self) -> u32 {
        self as u32
    }
}

/// Extraction sub-pass of the prepass program
pub const PREPASS_EXTRACT: u32 = 0;

/// Looks up compiled pass programs by name
pub trait ProgramResolver {
    fn resolve(&self, name: &str) -> Option<PassProgram>;
}

/// Name -> program table
#[derive(Debug, Default, Clone)]
pub struct ProgramLibrary {
    programs: HashMap<String, PassProgram>,
}

impl ProgramLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A library holding both effect programs
    pub fn with_effect_programs() -> Self {
        let mut library = Self::new();
        library.register(PassProgram::new(PREPASS_PROGRAM, 1));
        library.register(PassProgram::new(MAIN_PROGRAM, MainPass::COUNT));
        library
    }

    pub fn register(&mut self, program: PassProgram) {
        self.programs.insert(program.name.clone(), program);
    }
}

impl ProgramResolver for ProgramLibrary {
    fn resolve(&self, name: &str) -> Option<PassProgram> {
        self.programs.get(name).cloned()
    }
}

/// Both programs the pass graph needs, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSet {
    pub prepass: PassProgram,
    pub main: PassProgram,
}

impl ProgramSet {
    pub fn resolve(resolver: &dyn ProgramResolver) -> Result<Self> {
        let prepass = Self::resolve_one(resolver, PREPASS_PROGRAM, PREPASS_EXTRACT + 1)?;
        let main = Self::resolve_one(resolver, MAIN_PROGRAM, MainPass::COUNT)?;
        Ok(Self { prepass, main })
    }

    fn resolve_one(resolver: &dyn ProgramResolver, name: &str, min_passes: u32) -> Result<PassProgram> {
        let program = resolver
            .resolve(name)
            .ok_or_else(|| Error::ProgramNotFound(name.to_string()))?;
        if program.pass_count < min_passes {
            return Err(Error::ProgramNotFound(format!(
                "{name} exposes {} passes, {min_passes} required",
                program.pass_count
            )));
        }
        Ok(program)
    }

    pub fn get(&self, kind: ProgramKind) -> &PassProgram {
        match kind {
            ProgramKind::PrePass => &self.prepass,
            ProgramKind::Main => &self.main,
        }
    }
}
