pub mod common;
pub mod conflicts;
pub mod enqueue;
pub mod status;
pub mod sync;
pub mod watch;
