//! Shared types: the shark attack aggregate and domain event shapes.

pub mod events;
pub mod shark_attack;

pub use events::{DomainEvent, EventFilter, ModType, StoredEvent};
pub use shark_attack::{
    ListQuery, NewSharkAttack, SharkAttackFields, SharkAttackPatch, SharkAttackRecord,
    UpsertOutcome,
};
