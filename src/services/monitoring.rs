// Monitoring Service with Sentry integration
use serde_json::Value;
use tracing::{error, info};

use crate::common::AppConfig;

#[derive(Debug, Clone, Default)]
pub struct MonitoringConfig {
    pub sentry_dsn: Option<String>,
    pub environment: String,
    pub enable_performance_monitoring: bool,
}

impl MonitoringConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            sentry_dsn: config.sentry_dsn.clone(),
            environment: config.environment.clone(),
            enable_performance_monitoring: config.sentry_traces,
        }
    }
}

pub struct MonitoringService {
    sentry_guard: Option<sentry::ClientInitGuard>,
}

impl std::fmt::Debug for MonitoringService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringService")
            .field("sentry_enabled", &self.is_enabled())
            .finish()
    }
}

impl MonitoringService {
    /// Initializes Sentry when a DSN is configured; otherwise reporting is log-only
    pub fn init(config: &MonitoringConfig) -> Self {
        let Some(dsn) = config.sentry_dsn.as_deref().filter(|d| !d.is_empty()) else {
            info!("Sentry DSN not configured, error reporting is log-only");
            return Self::disabled();
        };

        let guard = sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(config.environment.clone().into()),
                traces_sample_rate: if config.enable_performance_monitoring {
                    0.1
                } else {
                    0.0
                },
                ..Default::default()
            },
        ));

        info!("Sentry initialized successfully");
        Self {
            sentry_guard: Some(guard),
        }
    }

    pub fn disabled() -> Self {
        Self { sentry_guard: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sentry_guard.is_some()
    }

    /// Log an error with context and forward it to Sentry
    pub fn log_error(&self, error: &dyn std::error::Error, context: Option<Value>) {
        match &context {
            Some(ctx) => error!(error = %error, context = %ctx, "Error reported"),
            None => error!(error = %error, "Error reported"),
        }

        if !self.is_enabled() {
            return;
        }

        sentry::with_scope(
            |scope| {
                if let Some(context) = context {
                    scope.set_extra("error_context", context);
                }
            },
            || sentry::capture_error(error),
        );
    }
}

impl Drop for MonitoringService {
    fn drop(&mut self) {
        if self.sentry_guard.is_some() {
            info!("Shutting down Sentry");
        }
    }
}
