use edu_models::EduError;
use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use tracing::debug;

fn internal(e: prometheus::Error) -> EduError {
    EduError::InternalError {
        reason: e.to_string(),
    }
}

pub struct MetricsService {
    registry: Registry,
    http_requests_total: CounterVec,
    auth_failures_total: CounterVec,
    series_created_total: Counter,
    lessons_created_total: Counter,
    notifications_sent_total: Counter,
    request_duration_ms: Histogram,
}

impl MetricsService {
    pub fn new() -> Result<Self, EduError> {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("edu_http_requests_total", "Total number of HTTP requests"),
            &["method", "status"],
        )
        .map_err(internal)?;

        let auth_failures_total = CounterVec::new(
            Opts::new(
                "edu_auth_failures_total",
                "Total number of rejected authentication attempts",
            ),
            &["reason"],
        )
        .map_err(internal)?;

        let series_created_total =
            Counter::new("edu_series_created_total", "Total number of series created")
                .map_err(internal)?;

        let lessons_created_total =
            Counter::new("edu_lessons_created_total", "Total number of lessons created")
                .map_err(internal)?;

        let notifications_sent_total = Counter::new(
            "edu_notifications_sent_total",
            "Total number of announcement emails sent",
        )
        .map_err(internal)?;

        let request_duration_ms = Histogram::with_opts(
            HistogramOpts::new(
                "edu_request_duration_ms",
                "HTTP request duration in milliseconds",
            )
            .buckets(vec![
                5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 30000.0, 120000.0,
            ]),
        )
        .map_err(internal)?;

        registry
            .register(Box::new(http_requests_total.clone()))
            .map_err(internal)?;
        registry
            .register(Box::new(auth_failures_total.clone()))
            .map_err(internal)?;
        registry
            .register(Box::new(series_created_total.clone()))
            .map_err(internal)?;
        registry
            .register(Box::new(lessons_created_total.clone()))
            .map_err(internal)?;
        registry
            .register(Box::new(notifications_sent_total.clone()))
            .map_err(internal)?;
        registry
            .register(Box::new(request_duration_ms.clone()))
            .map_err(internal)?;

        Ok(Self {
            registry,
            http_requests_total,
            auth_failures_total,
            series_created_total,
            lessons_created_total,
            notifications_sent_total,
            request_duration_ms,
        })
    }

    pub fn record_request(&self, method: &str, status: u16, duration_ms: f64) {
        self.http_requests_total
            .with_label_values(&[method, &status.to_string()])
            .inc();
        self.request_duration_ms.observe(duration_ms);
    }

    pub fn record_auth_failure(&self, reason: &str) {
        self.auth_failures_total.with_label_values(&[reason]).inc();
        debug!("Recorded auth failure: {}", reason);
    }

    pub fn record_serie_created(&self) {
        self.series_created_total.inc();
    }

    pub fn record_lesson_created(&self) {
        self.lessons_created_total.inc();
    }

    pub fn record_notifications_sent(&self, recipients: usize) {
        self.notifications_sent_total.inc_by(recipients as f64);
    }

    pub fn get_prometheus_metrics(&self) -> Result<String, EduError> {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(internal)?;

        String::from_utf8(buffer).map_err(|e| EduError::InternalError {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_recorded_values() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_request("GET", 200, 12.0);
        metrics.record_auth_failure("token_expired");
        metrics.record_serie_created();
        metrics.record_notifications_sent(3);

        let text = metrics.get_prometheus_metrics().unwrap();
        assert!(text.contains(r#"edu_http_requests_total{method="GET",status="200"} 1"#));
        assert!(text.contains(r#"edu_auth_failures_total{reason="token_expired"} 1"#));
        assert!(text.contains("edu_series_created_total 1"));
        assert!(text.contains("edu_notifications_sent_total 3"));
        assert!(text.contains("edu_request_duration_ms_count 1"));
    }

    #[test]
    fn registries_are_independent() {
        let a = MetricsService::new().unwrap();
        let b = MetricsService::new().unwrap();
        a.record_lesson_created();
        let text = b.get_prometheus_metrics().unwrap();
        assert!(text.contains("edu_lessons_created_total 0"));
    }
}
