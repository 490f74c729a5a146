use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::SubscriberBuilder;

use crate::error::SetupError;

/*
    @@@
    @logs_tracing();
    . Sends lifecycle events (with timestamps, targets and levels, no ANSI) to stdout.
    . With `log_dir`, also appends them to a daily-rotating supervisor.<date>.log in that directory.
    . Writes synchronously; workers are forked from this process, so no writer thread may exist.
*/
pub fn logs_tracing(level: tracing::Level, log_dir: Option<&str>) -> Result<(), SetupError> {
    let builder = SubscriberBuilder::default()
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_max_level(level);

    let installed = match log_dir {
        Some(dir) => {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("supervisor")
                .filename_suffix("log")
                .build(dir)
                .map_err(|e| SetupError::Logging(e.to_string()))?;
            builder
                .with_writer(std::io::stdout.and(file_appender))
                .try_init()
        }
        None => builder.with_writer(std::io::stdout).try_init(),
    };

    installed.map_err(|e| SetupError::Logging(e.to_string()))
}
