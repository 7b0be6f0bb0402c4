//! Configuration replay
//!
//! Applies a captured tree onto a live target through the settable/creatable
//! [`ReplayTarget`] capability instead of reflection.

pub mod replayer;
pub mod target;

pub use replayer::{replay, ReplayStats};
pub use target::{downcast_child, ReplayRejection, ReplayTarget};
