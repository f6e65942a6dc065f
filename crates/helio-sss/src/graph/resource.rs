//! Texture references inside command lists

/// List-scoped temporary target, identified by name
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct TargetId(pub u64);

impl TargetId {
    /// Create a named target id (deterministic)
    pub fn named(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Targets the host pipeline provides
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum BuiltinTarget {
    /// The camera's output colour target
    CameraTarget,
    /// Whatever target is bound when the list starts executing
    CurrentActive,
    /// G-buffer channel holding packed world normals
    GBufferNormal,
}

/// Source or destination of a blit
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum TextureSource {
    Builtin(BuiltinTarget),
    Temporary(TargetId),
}

impl TextureSource {
    pub fn temporary(&self) -> Option<TargetId> {
        match self {
            TextureSource::Temporary(id) => Some(*id),
            TextureSource::Builtin(_) => None,
        }
    }
}

impl From<BuiltinTarget> for TextureSource {
    fn from(target: BuiltinTarget) -> Self {
        TextureSource::Builtin(target)
    }
}

impl From<TargetId> for TextureSource {
    fn from(id: TargetId) -> Self {
        TextureSource::Temporary(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_ids_are_stable() {
        assert_eq!(TargetId::named("flip"), TargetId::named("flip"));
        assert_ne!(TargetId::named("flip"), TargetId::named("flop"));
    }
}
