//! The assembly step shared by assemblers and restocking dealers.

use crate::core::buffer::BoundedBuffer;
use crate::core::errors::{FactoryError, Result};
use crate::core::shutdown::ShutdownSignal;
use crate::core::types::{Component, ComponentKind, IdAllocator, Shovel};
use std::sync::Arc;
use std::time::Duration;

/// Access to both parts buffers plus everything needed to turn one handle
/// and one blade into a shovel.
///
/// Parts are always taken handle first, then blade. Every actor that
/// builds shovels goes through here, so no two of them can ever hold the
/// parts in opposite order.
#[derive(Clone)]
pub struct Workshop {
    handles: Arc<BoundedBuffer<Component>>,
    blades: Arc<BoundedBuffer<Component>>,
    ids: Arc<IdAllocator>,
    assembly_delay: Duration,
    signal: ShutdownSignal,
}

impl Workshop {
    pub fn new(
        handles: Arc<BoundedBuffer<Component>>,
        blades: Arc<BoundedBuffer<Component>>,
        ids: Arc<IdAllocator>,
        assembly_delay: Duration,
        signal: ShutdownSignal,
    ) -> Self {
        Self {
            handles,
            blades,
            ids,
            assembly_delay,
            signal,
        }
    }

    /// Take a handle, take a blade, wait out the assembly delay and return
    /// the finished shovel.
    ///
    /// Blocks while either parts buffer is empty. Returns `Cancelled` if
    /// shutdown interrupts any of the waits; parts already taken are
    /// dropped along with the unfinished shovel.
    pub fn build_shovel(&self) -> Result<Shovel> {
        let handle = self.handles.take()?;
        let blade = self.blades.take()?;

        if !self.signal.sleep(self.assembly_delay) {
            return Err(FactoryError::Cancelled);
        }

        Shovel::assemble(self.ids.next_shovel_id(), handle, blade).map_err(|(handle, blade)| {
            let found = if handle.kind() != ComponentKind::Handle {
                (ComponentKind::Handle, handle.kind())
            } else {
                (ComponentKind::Blade, blade.kind())
            };
            FactoryError::ComponentMismatch {
                expected: found.0,
                found: found.1,
            }
        })
    }

    pub fn signal(&self) -> &ShutdownSignal {
        &self.signal
    }
}
