//! The core library for the textweave tagged-text storage and layout engine.
//!
//! The heart of the crate is a B-tree of logical lines built from typed
//! segments (characters, marks, tag toggles, embedded objects), overlaid
//! with a priority-ordered tag system, a display-line layout pass and an
//! asynchronous pixel-height reconciler driving a viewport.

pub mod btree;
pub mod coord;
pub mod defaults;
pub mod index;
pub mod layout;
pub mod log;
pub mod metrics;
pub mod opt;
pub mod prelude;
pub mod res;
pub mod sched;
pub mod seg;
pub mod store;
pub mod tag;
pub mod test;
pub mod view;
