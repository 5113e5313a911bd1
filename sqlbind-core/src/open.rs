//! Opening a session: connect, apply the schema, bind every slot.

use std::sync::Arc;
use std::time::Duration;

use log::LevelFilter;

use crate::bind::{Binder, Owner, Record};
use crate::cleanup::{Cleanup, ReleaseGuard, Resources};
use crate::driver::{Connection, Driver};
use crate::error::{Error, Result};
use crate::logger::LogSettings;
use crate::params::Params;
use crate::query_map::QueryMap;

/// Selects an extra record inside the aggregate, bound after the aggregate itself.
pub type Projection<A> = fn(&mut A) -> &mut dyn Record<A>;

/// Opens a session over an aggregate.
///
/// ```rust,ignore
/// let (db, cleanup) = Opener::new(Db::default())
///     .schema(QueryMap::from([(DRIVER_SQLITE3, "CREATE TABLE IF NOT EXISTS ..")]))
///     .record(Db::private)
///     .open(&Sqlite, "sqlite::memory:")?;
/// ```
pub struct Opener<A> {
    aggregate: A,
    schema: Option<QueryMap>,
    records: Vec<Projection<A>>,
    log_settings: LogSettings,
}

impl<A: Record<A>> Opener<A> {
    pub fn new(aggregate: A) -> Self {
        Self {
            aggregate,
            schema: None,
            records: Vec::new(),
            log_settings: LogSettings::default(),
        }
    }

    /// Schema setup text, executed once per open. The active driver must have an entry.
    pub fn schema(mut self, schema: QueryMap) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Binds the record selected by `projection` as well.
    pub fn record(mut self, projection: Projection<A>) -> Self {
        self.records.push(projection);
        self
    }

    /// Sets the level at which executed statements are logged.
    pub fn log_statements(mut self, level: LevelFilter) -> Self {
        self.log_settings.log_statements(level);
        self
    }

    /// Sets the level and threshold for logging slow statements.
    pub fn log_slow_statements(mut self, level: LevelFilter, duration: Duration) -> Self {
        self.log_settings.log_slow_statements(level, duration);
        self
    }

    pub fn disable_statement_logging(self) -> Self {
        self.log_statements(LevelFilter::Off)
            .log_slow_statements(LevelFilter::Off, Duration::default())
    }

    /// Connects with `driver` and binds every operation slot.
    ///
    /// On failure everything acquired so far is released before the error is returned.
    pub fn open(self, driver: &dyn Driver, url: &str) -> Result<(Arc<A>, Cleanup)> {
        let Opener {
            mut aggregate,
            schema,
            records,
            log_settings,
        } = self;

        let name = driver.name();
        let connection = connect_with_ping(driver, url)?;

        let resources = Resources::new(Arc::clone(&connection));
        let guard = ReleaseGuard::new(resources.clone());

        if let Some(schema) = &schema {
            let sql = schema
                .get(name)
                .ok_or_else(|| Error::unsupported_driver(name, "schema statements"))?;

            connection.execute_batch(sql)?;

            tracing::debug!(target: "sqlbind::open", driver = name, "applied schema");
        }

        let params = Params::new(name, connection, resources.clone(), log_settings);
        let cleanup = resources.cleanup();

        let mut outcome = Ok(());
        let aggregate = Arc::new_cyclic(|weak| {
            let binder = Binder::new(&params, Owner::new(weak.clone()));
            outcome = bind_all(&binder, &mut aggregate, &records, &cleanup);
            aggregate
        });
        outcome?;

        guard.disarm();

        tracing::debug!(target: "sqlbind::open", driver = name, "session ready");

        Ok((aggregate, cleanup))
    }
}

fn bind_all<A: Record<A>>(
    binder: &Binder<'_, A>,
    aggregate: &mut A,
    records: &[Projection<A>],
    cleanup: &Cleanup,
) -> Result<()> {
    binder.bind(aggregate)?;
    for projection in records {
        binder.bind(projection(aggregate))?;
    }

    binder.assign_cleanup(aggregate, cleanup)?;
    for projection in records {
        binder.assign_cleanup(projection(aggregate), cleanup)?;
    }

    Ok(())
}

/// Connects with `driver` and verifies the connection with a ping.
pub fn connect_with_ping(driver: &dyn Driver, url: &str) -> Result<Arc<dyn Connection>> {
    let connection: Arc<dyn Connection> = Arc::from(driver.connect(url).map_err(Error::connection)?);

    if let Err(error) = connection.ping() {
        if let Err(error) = connection.close() {
            tracing::warn!(target: "sqlbind::open", %error, "failed to close unreachable connection");
        }

        return Err(Error::connection(error));
    }

    Ok(connection)
}
