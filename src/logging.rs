use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "native_ingester=info,info";

/// Initializes console logging, plus a daily-rolling JSON file when `LOG_DIR` is set.
pub fn init_logging(app_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let console_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);

    let file_layer = std::env::var("LOG_DIR").ok().and_then(|dir| {
        if let Err(e) = fs::create_dir_all(&dir) {
            eprintln!("Could not create log directory {dir}: {e}");
            return None;
        }
        let file_appender = tracing_appender::rolling::daily(&dir, format!("{app_name}.log"));
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
        // Keep the writer alive for the life of the process so logs are flushed
        std::mem::forget(guard);
        Some(fmt::layer().json().with_writer(non_blocking_writer))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();
}
