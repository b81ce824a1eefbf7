//! Logging
//!
//! Two concerns live here:
//!
//! - [`Logger`]: the diagnostic sink handed to every node constructor.
//!   It either forwards to `tracing` or to a caller supplied callback.
//! - [`init`]: installs the global `tracing` subscriber for the binary.

use crate::config::LoggingConfig;
use std::fmt;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type LogFn = dyn Fn(Level, &str) + Send + Sync;

/// Diagnostic sink accepted by the node builder.
#[derive(Clone)]
pub struct Logger {
    sink: Sink,
}

#[derive(Clone)]
enum Sink {
    Tracing,
    Callback(Arc<LogFn>),
    Silent,
}

impl Logger {
    /// Forward messages to the `tracing` macros
    pub fn tracing() -> Self {
        Self {
            sink: Sink::Tracing,
        }
    }

    /// Forward messages to a callback
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Level, &str) + Send + Sync + 'static,
    {
        Self {
            sink: Sink::Callback(Arc::new(f)),
        }
    }

    /// Discard all messages
    pub fn silent() -> Self {
        Self { sink: Sink::Silent }
    }

    /// Emit a message at the given level
    pub fn log(&self, level: Level, message: &str) {
        match &self.sink {
            Sink::Tracing => match level {
                Level::ERROR => tracing::error!("{}", message),
                Level::WARN => tracing::warn!("{}", message),
                Level::INFO => tracing::info!("{}", message),
                Level::DEBUG => tracing::debug!("{}", message),
                _ => tracing::trace!("{}", message),
            },
            Sink::Callback(f) => f(level, message),
            Sink::Silent => {}
        }
    }

    pub fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sink {
            Sink::Tracing => "tracing",
            Sink::Callback(_) => "callback",
            Sink::Silent => "silent",
        };
        f.debug_struct("Logger").field("sink", &kind).finish()
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chronicle_qp={}", config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_callback_logger() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let logger = Logger::from_fn(move |level, msg| {
            sink.lock().unwrap().push((level, msg.to_string()));
        });

        logger.error("boom");
        logger.info("hello");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (Level::ERROR, "boom".to_string()));
        assert_eq!(seen[1], (Level::INFO, "hello".to_string()));
    }

    #[test]
    fn test_silent_and_tracing_do_not_panic() {
        Logger::silent().error("ignored");
        Logger::tracing().debug("no subscriber installed");
    }

    #[test]
    fn test_logger_debug_format() {
        assert_eq!(format!("{:?}", Logger::silent()), "Logger { sink: \"silent\" }");
    }
}
