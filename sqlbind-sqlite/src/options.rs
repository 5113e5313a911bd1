use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use rusqlite::OpenFlags;
use sqlbind_core::Error;

/// Options and flags which can be used to configure a SQLite connection.
///
/// A value of `SqliteConnectOptions` can be parsed from a connection URL:
///
/// | URL | Description |
/// | -- | -- |
/// `:memory:`, `sqlite::memory:` | Open an in-memory database. |
/// `sqlite:data.db` | Open the file `data.db` in the current directory. |
/// `sqlite://data.db` | Open the file `data.db` in the current directory. |
/// `sqlite:///data.db` | Open the file `data.db` from the root (`/`) directory. |
/// `sqlite://data.db?mode=ro` | Open the file `data.db` for read-only access. |
/// `file:data.db?cache=shared` | Handed to SQLite as a [URI filename](https://www.sqlite.org/uri.html). |
///
/// ```rust
/// # use sqlbind_sqlite::SqliteConnectOptions;
/// let options: SqliteConnectOptions = "sqlite://users.db?mode=ro".parse()?;
/// assert!(options.is_read_only());
/// # Ok::<(), sqlbind_core::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct SqliteConnectOptions {
    pub(crate) filename: Cow<'static, Path>,
    pub(crate) in_memory: bool,
    pub(crate) uri: bool,
    pub(crate) read_only: bool,
    pub(crate) create_if_missing: bool,
    pub(crate) statement_cache_capacity: usize,
    pub(crate) busy_timeout: Duration,
    pub(crate) foreign_keys: bool,
}

impl Default for SqliteConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteConnectOptions {
    /// Options for a fresh in-memory database.
    pub fn new() -> Self {
        Self {
            filename: Cow::Borrowed(Path::new(":memory:")),
            in_memory: true,
            uri: false,
            read_only: false,
            create_if_missing: true,
            statement_cache_capacity: 100,
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
        }
    }

    /// Sets the name of the database file.
    pub fn filename(mut self, filename: impl AsRef<Path>) -> Self {
        self.filename = Cow::Owned(filename.as_ref().to_owned());
        self.in_memory = false;
        self
    }

    /// Sets the access mode to open the database for read-only access.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Sets whether to create the database file if it does not exist.
    ///
    /// By default, a new file is created.
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Sets the capacity of the connection's prepared statement cache.
    ///
    /// Every prepared statement of a session lives in this cache, so it should be at
    /// least as large as the number of operation slots.
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    /// Sets a timeout value to wait when the database is locked, before
    /// returning a busy timeout error.
    ///
    /// The default busy timeout is 5 seconds.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set the enforcement of [foreign key constraints](https://www.sqlite.org/pragma.html#pragma_foreign_keys).
    ///
    /// By default, this is enabled.
    pub fn foreign_keys(mut self, on: bool) -> Self {
        self.foreign_keys = on;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn get_filename(&self) -> &Path {
        &self.filename
    }

    pub(crate) fn open_flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_NO_MUTEX;

        if self.read_only {
            flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
        } else {
            flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;

            if self.create_if_missing {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
        }

        if self.in_memory {
            flags |= OpenFlags::SQLITE_OPEN_MEMORY;
        }

        if self.uri {
            flags |= OpenFlags::SQLITE_OPEN_URI;
        }

        flags
    }
}

// https://www.sqlite.org/uri.html

impl FromStr for SqliteConnectOptions {
    type Err = Error;

    fn from_str(mut url: &str) -> Result<Self, Self::Err> {
        let mut options = Self::new();

        // SQLite parses `file:` URIs itself, query string included
        if url.starts_with("file:") {
            options.filename = Cow::Owned(PathBuf::from(url));
            options.in_memory = false;
            options.uri = true;

            return Ok(options);
        }

        // remove scheme from the URL
        url = url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");

        let mut database_and_params = url.splitn(2, '?');

        let database = database_and_params.next().unwrap_or_default();

        if database.is_empty() || database == ":memory:" {
            options.in_memory = true;
        } else {
            // % decode to allow for `?` or `#` in the filename
            let filename = percent_decode_str(database)
                .decode_utf8()
                .map_err(Error::config)?;

            options = options.filename(&*filename);
        }

        if let Some(params) = database_and_params.next() {
            for (key, value) in url::form_urlencoded::parse(params.as_bytes()) {
                match &*key {
                    // The mode query parameter determines if the database is opened read-only,
                    // read-write, read-write and created if it does not exist, or that the
                    // database is a pure in-memory database that never interacts with disk.
                    "mode" => match &*value {
                        "ro" => {
                            options.read_only = true;
                        }

                        "rw" => {
                            options.create_if_missing = false;
                        }

                        // default
                        "rwc" => {
                            options.create_if_missing = true;
                        }

                        "memory" => {
                            options.in_memory = true;
                        }

                        _ => {
                            return Err(Error::Configuration(
                                format!("unknown value {value:?} for `mode`").into(),
                            ));
                        }
                    },

                    _ => {
                        return Err(Error::Configuration(
                            format!("unknown query parameter `{key}` while parsing connection URL")
                                .into(),
                        ));
                    }
                }
            }
        }

        Ok(options)
    }
}
