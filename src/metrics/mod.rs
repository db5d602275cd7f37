//! Metrics infrastructure for target-yaml.
//!
//! - `events`: Internal event types and the `InternalEvent` trait
//! - `server`: Prometheus recorder installation and text rendering

pub mod events;
pub mod server;

pub use server::init;

/// Emit an internal event.
///
/// This macro calls the `InternalEvent::emit()` method on the given event,
/// which records the corresponding metric.
///
/// # Example
///
/// ```ignore
/// use target_yaml::metrics::events::{DocumentWritten, RecordsMerged};
///
/// emit!(RecordsMerged { count: 100, mode: "list" });
/// emit!(DocumentWritten { bytes: 1024 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
