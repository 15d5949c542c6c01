use std::path::Path;
use tracing::{info, warn};
use tracing_appender::non_blocking;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where log lines go besides the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleOutput {
    /// Mirror everything to stdout (server processes).
    Stdout,
    /// Keep the terminal clean for an interactive prompt.
    Silent,
}

/// Initialize logging for a shell process (log file + optional console)
pub fn init_service_logging(
    log_dir: &str,
    service_name: &str,
    console: ConsoleOutput,
) -> Result<(), anyhow::Error> {
    // Controlled via RUST_LOG
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let can_write_logs = std::fs::create_dir_all(log_dir)
        .and_then(|_| std::fs::File::create(format!("{log_dir}/.test_write")))
        .map(|_| std::fs::remove_file(format!("{log_dir}/.test_write")))
        .is_ok();

    if can_write_logs {
        let rotation = rotate_logs_on_startup(log_dir, service_name);

        let (non_blocking_file, guard_file) = non_blocking(log_file_appender(log_dir, service_name));

        let file_layer = fmt::layer()
            .with_writer(non_blocking_file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true);

        match console {
            ConsoleOutput::Stdout => {
                let (non_blocking_stdout, guard_stdout) = non_blocking(std::io::stdout());
                let console_layer = fmt::layer()
                    .with_writer(non_blocking_stdout)
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(file_layer)
                    .with(console_layer)
                    .init();
                std::mem::forget(guard_stdout);
            }
            ConsoleOutput::Silent => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(file_layer)
                    .init();
            }
        }

        // Guards must outlive the process or buffered lines are lost
        std::mem::forget(guard_file);

        info!("Logging initialized - logs will be written to {log_dir}/{service_name}.log");
        if let Err(e) = rotation {
            warn!("Could not back up previous log file: {e}");
        }
    } else {
        match console {
            ConsoleOutput::Stdout => {
                let (non_blocking_stdout, guard_stdout) = non_blocking(std::io::stdout());
                let console_layer = fmt::layer()
                    .with_writer(non_blocking_stdout)
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .init();
                std::mem::forget(guard_stdout);

                info!("Logging initialized - console output only (could not create log directory)");
            }
            ConsoleOutput::Silent => {
                // Nothing to write to but stderr; only surface problems there.
                let stderr_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false)
                    .compact();

                tracing_subscriber::registry()
                    .with(EnvFilter::new("warn"))
                    .with(stderr_layer)
                    .init();
            }
        }
    }

    Ok(())
}

/// Single `<service>.log` per run; the previous run's file is moved aside by
/// [`rotate_logs_on_startup`].
pub fn log_file_appender(log_dir: &str, service_name: &str) -> RollingFileAppender {
    rolling::never(log_dir, format!("{service_name}.log"))
}

pub fn rotate_logs_on_startup(log_dir: &str, service_name: &str) -> Result<(), anyhow::Error> {
    let log_file = format!("{log_dir}/{service_name}.log");
    let log_path = Path::new(&log_file);

    if log_path.exists() {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let backup_file = format!("{log_dir}/{service_name}.{timestamp}.log");

        std::fs::rename(&log_file, &backup_file)?;
        info!("Previous log file backed up to: {backup_file}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_moves_existing_log_aside() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().to_str().unwrap();
        std::fs::write(dir.path().join("svc.log"), "old line\n").unwrap();

        rotate_logs_on_startup(log_dir, "svc").unwrap();

        assert!(!dir.path().join("svc.log").exists());
        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("svc."))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn appender_writes_the_file_that_rotation_moves() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().to_str().unwrap();

        let mut appender = log_file_appender(log_dir, "svc");
        writeln!(appender, "first run").unwrap();
        appender.flush().unwrap();
        drop(appender);
        assert!(dir.path().join("svc.log").exists());

        rotate_logs_on_startup(log_dir, "svc").unwrap();
        let mut appender = log_file_appender(log_dir, "svc");
        writeln!(appender, "second run").unwrap();
        appender.flush().unwrap();

        let current = std::fs::read_to_string(dir.path().join("svc.log")).unwrap();
        assert_eq!(current, "second run\n");
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().any(|name| name != "svc.log" && name.starts_with("svc.")));
    }

    #[test]
    fn rotation_without_previous_log_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        rotate_logs_on_startup(dir.path().to_str().unwrap(), "svc").unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
