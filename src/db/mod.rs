pub mod dispatch_log;
pub mod models;

pub use dispatch_log::{DispatchKind, DispatchLog};
