use std::time::{Duration, Instant};

use log::LevelFilter;

// `tracing` doesn't support dynamic levels, so dispatch on the level by hand.
#[doc(hidden)]
#[macro_export]
macro_rules! private_tracing_dynamic_event {
    (target: $target:expr, $level:expr, $($args:tt)*) => {{
        use ::tracing::Level;

        match $level {
            Level::ERROR => ::tracing::event!(target: $target, Level::ERROR, $($args)*),
            Level::WARN => ::tracing::event!(target: $target, Level::WARN, $($args)*),
            Level::INFO => ::tracing::event!(target: $target, Level::INFO, $($args)*),
            Level::DEBUG => ::tracing::event!(target: $target, Level::DEBUG, $($args)*),
            Level::TRACE => ::tracing::event!(target: $target, Level::TRACE, $($args)*),
        }
    }};
}

/// Controls how executed statements are logged.
#[derive(Clone, Debug)]
pub struct LogSettings {
    pub statements_level: LevelFilter,
    pub slow_statements_level: LevelFilter,
    pub slow_statements_duration: Duration,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            statements_level: LevelFilter::Debug,
            slow_statements_level: LevelFilter::Warn,
            slow_statements_duration: Duration::from_secs(1),
        }
    }
}

impl LogSettings {
    pub fn log_statements(&mut self, level: LevelFilter) {
        self.statements_level = level;
    }

    pub fn log_slow_statements(&mut self, level: LevelFilter, duration: Duration) {
        self.slow_statements_level = level;
        self.slow_statements_duration = duration;
    }
}

pub(crate) fn level_filter_to_tracing(filter: LevelFilter) -> Option<tracing::Level> {
    match filter {
        LevelFilter::Error => Some(tracing::Level::ERROR),
        LevelFilter::Warn => Some(tracing::Level::WARN),
        LevelFilter::Info => Some(tracing::Level::INFO),
        LevelFilter::Debug => Some(tracing::Level::DEBUG),
        LevelFilter::Trace => Some(tracing::Level::TRACE),
        LevelFilter::Off => None,
    }
}

/// Logs one statement execution when dropped.
pub(crate) struct QueryLogger<'q> {
    sql: &'q str,
    rows_returned: u64,
    rows_affected: u64,
    start: Instant,
    settings: &'q LogSettings,
}

impl<'q> QueryLogger<'q> {
    pub(crate) fn new(sql: &'q str, settings: &'q LogSettings) -> Self {
        Self {
            sql,
            rows_returned: 0,
            rows_affected: 0,
            start: Instant::now(),
            settings,
        }
    }

    pub(crate) fn increase_rows_returned(&mut self, n: usize) {
        self.rows_returned += u64::try_from(n).unwrap_or(u64::MAX);
    }

    pub(crate) fn increase_rows_affected(&mut self, n: u64) {
        self.rows_affected += n;
    }

    pub(crate) fn finish(&self) {
        let elapsed = self.start.elapsed();

        let was_slow = elapsed >= self.settings.slow_statements_duration;

        let lvl = if was_slow {
            self.settings.slow_statements_level
        } else {
            self.settings.statements_level
        };

        let Some(level) = level_filter_to_tracing(lvl) else {
            return;
        };

        let summary = parse_query_summary(self.sql);

        if was_slow {
            private_tracing_dynamic_event!(
                target: "sqlbind::query",
                level,
                summary,
                db.statement = self.sql,
                rows_affected = self.rows_affected,
                rows_returned = self.rows_returned,
                ?elapsed,
                elapsed_secs = elapsed.as_secs_f64(),
                slow_threshold = ?self.settings.slow_statements_duration,
                "slow statement: execution time exceeded alert threshold"
            );
        } else {
            private_tracing_dynamic_event!(
                target: "sqlbind::query",
                level,
                summary,
                db.statement = self.sql,
                rows_affected = self.rows_affected,
                rows_returned = self.rows_returned,
                ?elapsed,
                elapsed_secs = elapsed.as_secs_f64(),
            );
        }
    }
}

impl Drop for QueryLogger<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

pub(crate) fn parse_query_summary(sql: &str) -> String {
    // For now, just take the first 4 words
    let mut summary = sql
        .split_whitespace()
        .take(4)
        .collect::<Vec<&str>>()
        .join(" ");

    if sql.split_whitespace().nth(4).is_some() {
        summary.push_str(" …");
    }

    summary
}
