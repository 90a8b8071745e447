//! Stock domain: value objects, aggregates and events. No IO.
pub mod aggregates;
pub mod events;
pub mod value_objects;
