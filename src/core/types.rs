use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// The kinds of raw component a shovel is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    Handle,
    Blade,
}

impl ComponentKind {
    /// All kinds, in the global acquisition order used by every assembly step
    pub const ALL: [ComponentKind; 2] = [ComponentKind::Handle, ComponentKind::Blade];

    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Handle => "Handle",
            ComponentKind::Blade => "Blade",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw component produced by a supplier
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Component {
    id: u64,
    kind: ComponentKind,
}

impl Component {
    pub fn new(kind: ComponentKind, id: u64) -> Self {
        Self { id, kind }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Finished good. Owns exactly one handle and one blade for its lifetime.
///
/// Neither `Component` nor `Shovel` is `Clone`: a part is moved out of its
/// buffer by the take that consumes it and lives only inside the shovel.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Shovel {
    id: u64,
    handle: Component,
    blade: Component,
}

impl Shovel {
    /// Build a shovel from one handle and one blade.
    ///
    /// Returns the parts back if either is of the wrong kind.
    pub fn assemble(
        id: u64,
        handle: Component,
        blade: Component,
    ) -> Result<Self, (Component, Component)> {
        if handle.kind != ComponentKind::Handle || blade.kind != ComponentKind::Blade {
            return Err((handle, blade));
        }
        Ok(Self { id, handle, blade })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn handle(&self) -> &Component {
        &self.handle
    }

    pub fn blade(&self) -> &Component {
        &self.blade
    }

    /// Break the shovel back into its parts
    pub fn into_parts(self) -> (Component, Component) {
        (self.handle, self.blade)
    }
}

impl fmt::Display for Shovel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Shovel {} (Handle: {}, Blade: {})",
            self.id, self.handle.id, self.blade.id
        )
    }
}

/// Hands out identifiers, one independent counter per id scope.
///
/// Every scope starts at 1. Ids are unique within their scope even when
/// allocated from many threads at once.
#[derive(Debug)]
pub struct IdAllocator {
    handles: AtomicU64,
    blades: AtomicU64,
    shovels: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            handles: AtomicU64::new(1),
            blades: AtomicU64::new(1),
            shovels: AtomicU64::new(1),
        }
    }

    pub fn next_component_id(&self, kind: ComponentKind) -> u64 {
        let counter = match kind {
            ComponentKind::Handle => &self.handles,
            ComponentKind::Blade => &self.blades,
        };
        counter.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_shovel_id(&self) -> u64 {
        self.shovels.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate a fresh component of the given kind
    pub fn make_component(&self, kind: ComponentKind) -> Component {
        Component::new(kind, self.next_component_id(kind))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
