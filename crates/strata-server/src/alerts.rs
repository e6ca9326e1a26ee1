//! Alert sink that logs every alert and optionally forwards it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use strata_traits::error::TraitError;
use strata_traits::output::{AlertSeverity, AlertSink, PricingAlert};

/// Logs alerts through `tracing`, then hands them to an optional inner sink.
#[derive(Default)]
pub struct LoggingAlertSink {
    forward: Option<Arc<dyn AlertSink>>,
}

impl LoggingAlertSink {
    /// Log only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log, then forward to `sink`.
    pub fn forwarding(sink: Arc<dyn AlertSink>) -> Self {
        Self {
            forward: Some(sink),
        }
    }
}

#[async_trait]
impl AlertSink for LoggingAlertSink {
    async fn publish(&self, alert: &PricingAlert) -> Result<(), TraitError> {
        let instrument = alert
            .instrument_id
            .as_ref()
            .map(|id| id.as_str())
            .unwrap_or("-");

        match alert.severity {
            AlertSeverity::Info => info!(
                alert_type = %alert.alert_type,
                instrument,
                "{}",
                alert.message
            ),
            AlertSeverity::Warning => warn!(
                alert_type = %alert.alert_type,
                instrument,
                "{}",
                alert.message
            ),
            AlertSeverity::Error | AlertSeverity::Critical => error!(
                alert_type = %alert.alert_type,
                instrument,
                severity = ?alert.severity,
                "{}",
                alert.message
            ),
        }

        match &self.forward {
            Some(sink) => sink.publish(alert).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AlertSink for Recorder {
        async fn publish(&self, alert: &PricingAlert) -> Result<(), TraitError> {
            self.seen.lock().await.push(alert.alert_id.clone());
            Ok(())
        }
    }

    fn alert(severity: AlertSeverity) -> PricingAlert {
        PricingAlert {
            alert_id: "a-1".into(),
            severity,
            alert_type: "model_unsupported".into(),
            message: "no model".into(),
            instrument_id: Some("OPT".into()),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_log_only() {
        let sink = LoggingAlertSink::new();
        assert!(sink.publish(&alert(AlertSeverity::Error)).await.is_ok());
    }

    #[tokio::test]
    async fn test_forwards_every_severity() {
        let recorder = Arc::new(Recorder::default());
        let sink = LoggingAlertSink::forwarding(recorder.clone());

        for severity in [
            AlertSeverity::Info,
            AlertSeverity::Warning,
            AlertSeverity::Critical,
        ] {
            sink.publish(&alert(severity)).await.unwrap();
        }

        assert_eq!(recorder.seen.lock().await.len(), 3);
    }
}
