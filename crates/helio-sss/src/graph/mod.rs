//! Pass graph: which command lists exist and where the host runs them
//!
//! The graph is built once per structural configuration and installed into
//! the host. Tearing it down removes lists by name, so it works even after
//! the graph value itself is gone.

mod builder;
mod command;
mod resource;

pub use builder::{BuildOptions, PassGraphBuilder};
pub use command::{Command, CommandList, ProgramPass};
pub use resource::{BuiltinTarget, TargetId, TextureSource};

use crate::host::RenderHost;
use crate::program::ProgramSet;
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Thickness / transmission extraction list
pub const EXTRACTION_LIST: &str = "sss.prepass";
/// Screen-space diffuse blur + composite list
pub const DIFFUSE_BLUR_LIST: &str = "sss.diffuse_blur";
/// Normal blur list
pub const NORMAL_BLUR_LIST: &str = "sss.normal_blur";

/// Every list name the effect may register
pub const LIST_NAMES: [&str; 3] = [EXTRACTION_LIST, DIFFUSE_BLUR_LIST, NORMAL_BLUR_LIST];

/// Fixed stages of the host pipeline where lists can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InsertionPoint {
    /// Legacy extraction point, right after the G-buffer is filled
    AfterGBuffer,
    /// After the G-buffer, before the deferred lighting stage
    BeforeLighting,
    /// After the final colour pass of the frame
    AfterFinalPass,
}

impl InsertionPoint {
    /// All points in host execution order
    pub const ALL: [InsertionPoint; 3] = [
        InsertionPoint::AfterGBuffer,
        InsertionPoint::BeforeLighting,
        InsertionPoint::AfterFinalPass,
    ];

    /// Position of this point in the host's stage order
    pub fn stage_order(self) -> usize {
        self as usize
    }

    /// Whether lists here run before the lighting stage consumes its inputs
    pub fn precedes_lighting(self) -> bool {
        self < InsertionPoint::AfterFinalPass
    }
}

/// Ordered `(insertion point, command list)` registrations
#[derive(Debug, Clone, Default)]
pub struct PassGraph {
    entries: Vec<(InsertionPoint, Arc<CommandList>)>,
}

impl PassGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a list; a second list with the same name at the same point is rejected
    pub fn push(&mut self, point: InsertionPoint, list: CommandList) -> Result<()> {
        if self.entries.iter().any(|(p, l)| *p == point && l.name() == list.name()) {
            return Err(Error::Graph(format!(
                "'{}' is already registered at {:?}",
                list.name(),
                point
            )));
        }
        log::debug!(
            "  {:?}: '{}' ({} commands, {} blits)",
            point,
            list.name(),
            list.commands().len(),
            list.blit_count()
        );
        self.entries.push((point, Arc::new(list)));
        Ok(())
    }

    pub fn entries(&self) -> &[(InsertionPoint, Arc<CommandList>)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lists registered at `point`, in registration order
    pub fn lists_at(&self, point: InsertionPoint) -> impl Iterator<Item = &CommandList> {
        self.entries
            .iter()
            .filter(move |(p, _)| *p == point)
            .map(|(_, l)| l.as_ref())
    }

    pub fn find(&self, name: &str) -> Option<(InsertionPoint, &CommandList)> {
        self.entries
            .iter()
            .find(|(_, l)| l.name() == name)
            .map(|(p, l)| (*p, l.as_ref()))
    }

    /// Validate every list plus the cross-list rules
    ///
    /// A list may only import temporaries exported by a list that runs
    /// earlier in the frame, and the extraction list is registered first.
    pub fn validate(&self, programs: &ProgramSet) -> Result<()> {
        if let Some((_, first)) = self.entries.first() {
            if first.name() != EXTRACTION_LIST {
                return Err(Error::Graph(format!(
                    "'{}' registered before the extraction list",
                    first.name()
                )));
            }
        }

        let mut exported: HashSet<TargetId> = HashSet::new();
        for (point, list) in self.execution_order() {
            list.validate(programs)?;
            if let Some(missing) = list.imports().iter().find(|id| !exported.contains(*id)) {
                return Err(Error::Graph(format!(
                    "'{}' at {:?} imports {:?} which no earlier list provides",
                    list.name(),
                    point,
                    missing
                )));
            }
            for id in list.imports() {
                exported.remove(id);
            }
            exported.extend(list.exported_temporaries());
        }
        Ok(())
    }

    /// Registrations in the order the host will run them
    pub fn execution_order(&self) -> Vec<(InsertionPoint, &CommandList)> {
        let mut order: Vec<_> = self.entries.iter().map(|(p, l)| (*p, l.as_ref())).collect();
        // stable: registration order is kept within a point
        order.sort_by_key(|(p, _)| p.stage_order());
        order
    }

    /// Register every list with the host
    pub fn install(&self, host: &mut dyn RenderHost) {
        for (point, list) in &self.entries {
            host.add_command_list(*point, list.clone());
        }
        log::debug!("Installed {} SSS command lists", self.entries.len());
    }

    /// Remove every effect list from every insertion point of `host`
    ///
    /// Matches by name, so it is idempotent and also cleans up lists left by
    /// a graph that is no longer around. Returns how many were removed.
    pub fn remove_all(host: &mut dyn RenderHost) -> usize {
        let mut removed = 0;
        for point in InsertionPoint::ALL {
            for list in host.command_lists(point) {
                if LIST_NAMES.contains(&list.name()) && host.remove_command_list(point, list.name()) {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            log::debug!("Removed {} SSS command lists", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_brackets_lighting() {
        assert!(InsertionPoint::AfterGBuffer.precedes_lighting());
        assert!(InsertionPoint::BeforeLighting.precedes_lighting());
        assert!(!InsertionPoint::AfterFinalPass.precedes_lighting());
        assert!(InsertionPoint::BeforeLighting.stage_order() < InsertionPoint::AfterFinalPass.stage_order());
    }

    #[test]
    fn duplicate_name_at_same_point_is_rejected() {
        let mut graph = PassGraph::new();
        graph.push(InsertionPoint::BeforeLighting, CommandList::new(EXTRACTION_LIST)).unwrap();
        let again = graph.push(InsertionPoint::BeforeLighting, CommandList::new(EXTRACTION_LIST));
        assert!(matches!(again, Err(Error::Graph(_))));
        assert_eq!(graph.len(), 1);
    }
}
