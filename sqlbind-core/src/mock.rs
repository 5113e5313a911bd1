//! A scripted, in-process driver.
//!
//! It records every call it receives and fails on demand, which makes it possible to
//! observe how sessions acquire and release resources without a database server.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::driver::{Connection, Driver, Statement, Transaction};
use crate::error::{DatabaseError, Error, Result};
use crate::row::{QueryResult, Row};
use crate::value::Value;

/// A call observed by the mock driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Connect(String),
    Ping,
    ExecuteBatch(String),
    Prepare(String),
    Execute(String),
    Fetch(String),
    Begin,
    Commit,
    Rollback,
    CloseStatement(String),
    CloseConnection,
}

/// Error produced by a scripted failure.
#[derive(Debug)]
pub struct MockError {
    message: String,
}

impl MockError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for MockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for MockError {}

impl DatabaseError for MockError {
    fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Default)]
struct Script {
    fail_connect: bool,
    fail_ping: bool,
    fail_batch: bool,
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,
    fail_prepare: Vec<String>,
    fail_execute: Vec<String>,
    rows: HashMap<String, Vec<Row>>,
}

#[derive(Debug, Default)]
struct Shared {
    script: Mutex<Script>,
    events: Mutex<Vec<MockEvent>>,
    open_statements: AtomicUsize,
}

impl Shared {
    fn record(&self, event: MockEvent) {
        self.events.lock().push(event);
    }

    fn check(&self, fail: impl FnOnce(&Script) -> bool, message: &str) -> Result<()> {
        if fail(&self.script.lock()) {
            return Err(MockError::new(message).into());
        }

        Ok(())
    }
}

/// A driver whose behavior is scripted by the test.
#[derive(Debug, Clone)]
pub struct MockDriver {
    name: String,
    shared: Arc<Shared>,
}

impl MockDriver {
    /// A mock answering to the driver identifier `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::default(),
        }
    }

    fn script(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.shared.script.lock());
        self
    }

    pub fn fail_connect(self) -> Self {
        self.script(|s| s.fail_connect = true)
    }

    pub fn fail_ping(self) -> Self {
        self.script(|s| s.fail_ping = true)
    }

    /// Fails every [`Connection::execute_batch`], i.e. schema setup.
    pub fn fail_batch(self) -> Self {
        self.script(|s| s.fail_batch = true)
    }

    pub fn fail_begin(self) -> Self {
        self.script(|s| s.fail_begin = true)
    }

    pub fn fail_commit(self) -> Self {
        self.script(|s| s.fail_commit = true)
    }

    pub fn fail_rollback(self) -> Self {
        self.script(|s| s.fail_rollback = true)
    }

    pub fn fail_prepare(self, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        self.script(|s| s.fail_prepare.push(sql))
    }

    pub fn fail_execute(self, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        self.script(|s| s.fail_execute.push(sql))
    }

    /// Rows returned by every fetch of `sql`.
    pub fn with_rows(self, sql: impl Into<String>, rows: Vec<Row>) -> Self {
        let sql = sql.into();
        self.script(|s| {
            s.rows.insert(sql, rows);
        })
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.shared.events.lock().clone()
    }

    /// How many times `event` was observed.
    pub fn count(&self, event: &MockEvent) -> usize {
        self.shared
            .events
            .lock()
            .iter()
            .filter(|e| *e == event)
            .count()
    }

    /// Statements prepared and not yet closed.
    pub fn open_statements(&self) -> usize {
        self.shared.open_statements.load(Ordering::SeqCst)
    }

    pub fn is_connection_closed(&self) -> bool {
        self.count(&MockEvent::CloseConnection) > 0
    }
}

impl Driver for MockDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self, url: &str) -> Result<Box<dyn Connection>> {
        self.shared.record(MockEvent::Connect(url.to_owned()));
        self.shared.check(|s| s.fail_connect, "connection refused")?;

        Ok(Box::new(MockConnection {
            shared: Arc::clone(&self.shared),
            closed: Arc::default(),
        }))
    }
}

#[derive(Debug)]
struct MockConnection {
    shared: Arc<Shared>,
    closed: Arc<AtomicBool>,
}

impl MockConnection {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed("connection"));
        }

        Ok(())
    }
}

impl Connection for MockConnection {
    fn ping(&self) -> Result<()> {
        self.ensure_open()?;
        self.shared.record(MockEvent::Ping);
        self.shared.check(|s| s.fail_ping, "server unreachable")
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        self.ensure_open()?;
        self.shared.record(MockEvent::ExecuteBatch(sql.to_owned()));
        self.shared.check(|s| s.fail_batch, "syntax error")
    }

    fn prepare(&self, sql: &str) -> Result<Box<dyn Statement>> {
        self.ensure_open()?;
        self.shared.record(MockEvent::Prepare(sql.to_owned()));
        self.shared.check(
            |s| s.fail_prepare.iter().any(|failing| failing == sql),
            "syntax error",
        )?;

        self.shared.open_statements.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockStatement {
            sql: sql.to_owned(),
            shared: Arc::clone(&self.shared),
            connection_closed: Arc::clone(&self.closed),
            closed: AtomicBool::new(false),
        }))
    }

    fn begin(&self) -> Result<Box<dyn Transaction>> {
        self.ensure_open()?;
        self.shared.record(MockEvent::Begin);
        self.shared.check(|s| s.fail_begin, "cannot begin transaction")?;

        Ok(Box::new(MockTransaction {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.record(MockEvent::CloseConnection);
        }

        Ok(())
    }
}

#[derive(Debug)]
struct MockStatement {
    sql: String,
    shared: Arc<Shared>,
    connection_closed: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl MockStatement {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed("statement"));
        }

        if self.connection_closed.load(Ordering::SeqCst) {
            return Err(Error::Closed("connection"));
        }

        Ok(())
    }
}

impl Statement for MockStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn execute(&self, _args: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        self.shared.record(MockEvent::Execute(self.sql.clone()));
        self.shared.check(
            |s| s.fail_execute.iter().any(|failing| *failing == self.sql),
            "constraint violation",
        )?;

        Ok(QueryResult {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    fn fetch_all(&self, _args: &[Value]) -> Result<Vec<Row>> {
        self.ensure_open()?;
        self.shared.record(MockEvent::Fetch(self.sql.clone()));
        self.shared.check(
            |s| s.fail_execute.iter().any(|failing| *failing == self.sql),
            "constraint violation",
        )?;

        Ok(self
            .shared
            .script
            .lock()
            .rows
            .get(&self.sql)
            .cloned()
            .unwrap_or_default())
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.open_statements.fetch_sub(1, Ordering::SeqCst);
            self.shared.record(MockEvent::CloseStatement(self.sql.clone()));
        }

        Ok(())
    }
}

#[derive(Debug)]
struct MockTransaction {
    shared: Arc<Shared>,
}

impl Transaction for MockTransaction {
    fn execute(&self, statement: &dyn Statement, args: &[Value]) -> Result<QueryResult> {
        statement.execute(args)
    }

    fn fetch_all(&self, statement: &dyn Statement, args: &[Value]) -> Result<Vec<Row>> {
        statement.fetch_all(args)
    }

    fn commit(&mut self) -> Result<()> {
        self.shared.record(MockEvent::Commit);
        self.shared.check(|s| s.fail_commit, "database is locked")
    }

    fn rollback(&mut self) -> Result<()> {
        self.shared.record(MockEvent::Rollback);
        self.shared.check(|s| s.fail_rollback, "database is locked")
    }
}
