use crate::{event::SimEvent, world::World};

/// Every simulation system implements this trait.
///
/// The engine calls `update` once per tick on each registered system
/// in registration order. A system mutates the World directly and
/// returns the events describing what it changed.
pub trait SimSystem: Send {
    /// Unique name for this system. Used in logging.
    fn name(&self) -> &'static str;

    /// Run one tick. `world.tick` is the tick being simulated.
    fn update(&mut self, world: &mut World) -> Vec<SimEvent>;
}
