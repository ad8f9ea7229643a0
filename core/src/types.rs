//! Shared primitive types used across the entire simulation.

/// A simulation tick. Twenty ticks make one real second of play.
pub type Tick = u64;

/// Opaque entity identifier. Strictly increasing, never reused.
pub type EntityId = u64;

/// The canonical run identifier used by the persistence store.
pub type RunId = String;

/// Money is tracked in whole credits and may go negative.
pub type Money = i64;
