use std::collections::BTreeMap;

/// Driver identifier for SQLite.
pub const DRIVER_SQLITE3: &str = "sqlite3";

/// Driver identifier for PostgreSQL.
pub const DRIVER_POSTGRES: &str = "postgres";

/// Statement text per driver.
///
/// Immutable once built; only lookups are possible afterwards.
///
/// ```rust
/// use sqlbind_core::{QueryMap, DRIVER_POSTGRES, DRIVER_SQLITE3};
///
/// let insert = QueryMap::from([
///     (DRIVER_SQLITE3, "INSERT INTO user (name) VALUES (?)"),
///     (DRIVER_POSTGRES, "INSERT INTO users (name) VALUES ($1)"),
/// ]);
///
/// assert_eq!(insert.get("postgres"), Some("INSERT INTO users (name) VALUES ($1)"));
/// assert_eq!(insert.get("mysql"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMap {
    queries: BTreeMap<String, String>,
}

impl QueryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the statement text for `driver`, replacing any previous entry.
    pub fn with(mut self, driver: impl Into<String>, sql: impl Into<String>) -> Self {
        self.queries.insert(driver.into(), sql.into());
        self
    }

    /// Statement text for `driver`. An empty text counts as missing.
    pub fn get(&self, driver: &str) -> Option<&str> {
        self.queries
            .get(driver)
            .map(String::as_str)
            .filter(|sql| !sql.is_empty())
    }

    pub fn drivers(&self) -> impl Iterator<Item = &str> {
        self.queries.keys().map(String::as_str)
    }
}

impl<D, S> FromIterator<(D, S)> for QueryMap
where
    D: Into<String>,
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (D, S)>>(iter: I) -> Self {
        Self {
            queries: iter
                .into_iter()
                .map(|(driver, sql)| (driver.into(), sql.into()))
                .collect(),
        }
    }
}

impl<D, S, const N: usize> From<[(D, S); N]> for QueryMap
where
    D: Into<String>,
    S: Into<String>,
{
    fn from(entries: [(D, S); N]) -> Self {
        entries.into_iter().collect()
    }
}
