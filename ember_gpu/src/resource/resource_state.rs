/// Per-texture barrier state tracking.
///
/// Every transition is checked against the state the tracker last recorded
/// for that texture before the barrier is put on the command list, so a
/// barrier can never claim a `before` state the resource is not in.

use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::graphics_device::{CommandList, ResourceBarrier, ResourceId, ResourceState, Texture};
use crate::engine_error;

#[derive(Default)]
pub struct ResourceStateTracker {
    states: FxHashMap<ResourceId, ResourceState>,
}

impl ResourceStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `texture` in `state` (replaces any previous entry)
    pub fn register(&mut self, texture: &dyn Texture, state: ResourceState) {
        self.states.insert(texture.id(), state);
    }

    /// Stop tracking `texture`
    pub fn forget(&mut self, texture: &dyn Texture) {
        self.states.remove(&texture.id());
    }

    pub fn state_of(&self, texture: &dyn Texture) -> Option<ResourceState> {
        self.states.get(&texture.id()).copied()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Record `before -> after` for `texture` on `cmd`
    pub fn transition(
        &mut self,
        cmd: &mut dyn CommandList,
        texture: &dyn Texture,
        before: ResourceState,
        after: ResourceState,
    ) -> Result<()> {
        match self.states.get(&texture.id()) {
            Some(&current) if current == before => {}
            Some(&current) => {
                let message = format!(
                    "barrier {:?} -> {:?} on texture {} which is in {:?}",
                    before, after, texture.id().get(), current
                );
                engine_error!("ember::FrameCore", "{}", message);
                return Err(Error::InvalidState(message));
            }
            None => {
                let message = format!("barrier on untracked texture {}", texture.id().get());
                engine_error!("ember::FrameCore", "{}", message);
                return Err(Error::InvalidState(message));
            }
        }

        cmd.resource_barrier(&ResourceBarrier::transition(texture, before, after))?;
        self.states.insert(texture.id(), after);
        Ok(())
    }
}

#[cfg(test)]
#[path = "resource_state_tests.rs"]
mod tests;
