//! Event types, audit log, and read-only observers

pub mod observer;
pub mod types;

pub use observer::{MatrixObserver, TracingObserver};
pub use types::{EventLog, MatrixEvent};
