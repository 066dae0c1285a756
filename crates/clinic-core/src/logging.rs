//! Tracing subscriber setup.

use std::sync::Once;

use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

use crate::config::{LogConfig, LogFormat};

// Log targets used like `info!(target: APPOINTMENTS, ...)`.
pub const PATIENTS: &str = "clinic::patients";
pub const APPOINTMENTS: &str = "clinic::appointments";
pub const CALENDAR: &str = "clinic::calendar";
pub const CONSULTATIONS: &str = "clinic::consultations";
pub const AUDIT: &str = "clinic::audit";

static INIT: Once = Once::new();

type Subscriber = Box<dyn tracing::Subscriber + Send + Sync>;

/// Install the global subscriber. Later calls are ignored.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &LogConfig) {
    INIT.call_once(|| {
        let subscriber = build(config);
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            // Another subscriber was installed by the embedding application.
            tracing::debug!("global tracing subscriber already set");
        }
    });
}

fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()))
}

pub fn build(config: &LogConfig) -> Subscriber {
    let builder = SubscriberBuilder::default()
        .with_env_filter(env_filter(config))
        .with_target(true);

    match config.format {
        LogFormat::Pretty => Box::new(builder.pretty().finish()),
        LogFormat::Json => Box::new(builder.json().finish()),
        LogFormat::Text => Box::new(builder.finish()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_build_each_format() {
        for format in [LogFormat::Text, LogFormat::Pretty, LogFormat::Json] {
            let config = LogConfig {
                level: LogLevel::Debug,
                format,
            };
            let subscriber = build(&config);
            let _guard = tracing::subscriber::set_default(subscriber);
            tracing::info!(target: APPOINTMENTS, "subscriber built");
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LogConfig::default();
        init(&config);
        init(&config);
    }
}
