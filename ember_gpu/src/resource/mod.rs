//! Resource module
//!
//! Buffer/texture creation and per-texture barrier state.

mod resource_factory;
mod resource_state;

pub use resource_factory::ResourceFactory;
pub use resource_state::ResourceStateTracker;
