pub mod service;
pub mod tracing;

pub use self::service::MetricsService;
pub use self::tracing::TracingService;
