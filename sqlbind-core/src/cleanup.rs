//! Ownership and release of everything a session acquires.

use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::driver::Connection;
use crate::error::{Error, Result};
use crate::statement::PreparedStatement;

/// Collects the connection and every statement prepared on it.
///
/// Handles are released exactly once: statements first, then the connection.
#[derive(Clone)]
pub(crate) struct Resources(Arc<ResourcesInner>);

struct ResourcesInner {
    statements: Mutex<Vec<PreparedStatement>>,
    connection: Mutex<Option<Arc<dyn Connection>>>,
    released: AtomicBool,
}

impl Resources {
    pub(crate) fn new(connection: Arc<dyn Connection>) -> Self {
        Self(Arc::new(ResourcesInner {
            statements: Mutex::new(Vec::new()),
            connection: Mutex::new(Some(connection)),
            released: AtomicBool::new(false),
        }))
    }

    /// Takes ownership of a freshly prepared statement.
    ///
    /// Fails, closing the statement, if the resources were already released.
    pub(crate) fn register(&self, statement: PreparedStatement) -> Result<PreparedStatement> {
        let mut statements = self.0.statements.lock();

        if self.0.released.load(Ordering::Acquire) {
            drop(statements);
            close_statement(&statement);
            return Err(Error::Closed("connection"));
        }

        statements.push(statement.clone());

        Ok(statement)
    }

    pub(crate) fn release(&self) {
        self.0.release();
    }

    pub(crate) fn is_released(&self) -> bool {
        self.0.released.load(Ordering::Acquire)
    }

    pub(crate) fn cleanup(&self) -> Cleanup {
        Cleanup(self.clone())
    }
}

impl ResourcesInner {
    fn release(&self) {
        // taking the statement lock first keeps `register` from racing the flag
        let statements = {
            let mut statements = self.statements.lock();

            if self.released.swap(true, Ordering::AcqRel) {
                return;
            }

            std::mem::take(&mut *statements)
        };

        tracing::debug!(
            target: "sqlbind::cleanup",
            statements = statements.len(),
            "releasing session resources"
        );

        for statement in &statements {
            close_statement(statement);
        }

        if let Some(connection) = self.connection.lock().take() {
            if let Err(error) = connection.close() {
                tracing::warn!(target: "sqlbind::cleanup", %error, "failed to close connection");
            }
        }
    }
}

fn close_statement(statement: &PreparedStatement) {
    if let Err(error) = statement.close() {
        tracing::warn!(
            target: "sqlbind::cleanup",
            %error,
            sql = statement.sql(),
            "failed to close prepared statement"
        );
    }
}

/// Releases every resource opened by a session.
///
/// This is the only way a successfully opened session is released: dropping every
/// `Cleanup` leaves the bound operations usable.
///
/// Calling it more than once, or from several threads at the same time, is safe: only
/// the first call closes anything. Every operation bound by the session fails afterwards.
#[derive(Clone)]
pub struct Cleanup(Resources);

impl Cleanup {
    pub fn call(&self) {
        self.0.release();
    }

    /// Returns `true` once the session has been released.
    pub fn is_released(&self) -> bool {
        self.0.is_released()
    }
}

impl Debug for Cleanup {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup")
            .field("released", &self.is_released())
            .finish()
    }
}

/// Releases the resources when dropped, unless disarmed first.
pub(crate) struct ReleaseGuard {
    resources: Option<Resources>,
}

impl ReleaseGuard {
    pub(crate) fn new(resources: Resources) -> Self {
        Self {
            resources: Some(resources),
        }
    }

    pub(crate) fn disarm(mut self) {
        self.resources = None;
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(resources) = self.resources.take() {
            resources.release();
        }
    }
}
