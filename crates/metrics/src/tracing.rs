use edu_models::{EduError, Lesson, LogFormat, LoggingConfig, Serie};
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. WARN and ERROR go to stderr, everything
/// else (including the access log) to stdout. `RUST_LOG` overrides the
/// configured level.
pub fn init(config: &LoggingConfig) -> Result<(), EduError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    result.map_err(|e| EduError::ConfigError {
        reason: format!("failed to install tracing subscriber: {e}"),
    })
}

pub struct TracingService;

impl TracingService {
    pub fn log_serie_created(serie: &Serie) {
        info!(
            serie_id = %serie.id,
            owner = %serie.serie_user,
            published = serie.is_publish,
            topic = %serie.serie_sns.as_deref().unwrap_or("none"),
            "Serie created"
        );
    }

    pub fn log_serie_deleted(serie_id: &str) {
        info!(serie_id = %serie_id, "Serie deleted");
    }

    pub fn log_lesson_created(lesson: &Lesson) {
        info!(
            serie_id = %lesson.lesson_serie,
            lesson_id = %lesson.id,
            has_video = !lesson.lesson_video.is_empty(),
            documents = lesson.lesson_documents.len(),
            "Lesson created"
        );
    }

    pub fn log_lesson_deleted(serie_id: &str, lesson_id: &str) {
        info!(serie_id = %serie_id, lesson_id = %lesson_id, "Lesson deleted");
    }

    pub fn log_subscription_changed(serie_id: &str, user_id: &str, subscribed: bool) {
        info!(
            serie_id = %serie_id,
            user_id = %user_id,
            subscribed = subscribed,
            "Subscription changed"
        );
    }

    pub fn log_announcement_sent(serie_id: &str, recipients: usize, batches: usize) {
        info!(
            serie_id = %serie_id,
            recipients = recipients,
            batches = batches,
            "Announcement sent"
        );
    }

    pub fn log_announcement_failed(serie_id: &str, err: &EduError) {
        error!(serie_id = %serie_id, error = %err, "Failed to send announcement");
    }

    pub fn log_auth_failure(err: &EduError) {
        warn!(
            reason = %err.error_type(),
            status = err.http_status(),
            "Authentication rejected"
        );
    }

    pub fn log_stale_tabs_removed(removed: u64) {
        if removed > 0 {
            info!(removed = removed, "Removed stale lesson tabs");
        }
    }
}
