// used for persistence
use rusqlite::{Connection as RawConnection, InterruptHandle, Rows, Statement};

use parking_lot::ReentrantMutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{Connection, CredentialSupplier, Cursor, Driver, Interrupt};
use crate::error::{Error, Result};
use crate::params::{BoundParameter, ParamDirection};
use crate::value::Value;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// A private in-memory database that lives as long as the driver.
    Memory,
    File(PathBuf),
}

// The in-memory connection is re-entrant so that a row visitor may run further
// statements on it from the same thread.
enum Backing {
    Memory {
        connection: Arc<ReentrantMutex<RawConnection>>,
        interrupt: Arc<InterruptHandle>,
    },
    File(PathBuf),
}

pub struct SqliteDriver {
    target: ConnectionTarget,
    backing: Backing,
    credentials: Option<Arc<dyn CredentialSupplier>>,
    busy_timeout: Duration,
}

impl SqliteDriver {
    pub fn new(target: ConnectionTarget) -> Result<Self> {
        let backing = match &target {
            ConnectionTarget::Memory => {
                let connection = RawConnection::open_in_memory()?;
                let interrupt = Arc::new(connection.get_interrupt_handle());
                Backing::Memory {
                    connection: Arc::new(ReentrantMutex::new(connection)),
                    interrupt,
                }
            }
            ConnectionTarget::File(path) => Backing::File(path.clone()),
        };
        Ok(Self {
            target,
            backing,
            credentials: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        })
    }
    pub fn in_memory() -> Result<Self> {
        Self::new(ConnectionTarget::Memory)
    }
    /// The supplied key is applied with `PRAGMA key` whenever a file is opened.
    pub fn with_credentials(mut self, supplier: impl CredentialSupplier + 'static) -> Self {
        self.credentials = Some(Arc::new(supplier));
        self
    }
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }
    fn open_file(&self, path: &Path) -> Result<RawConnection> {
        if path.as_os_str().is_empty() {
            return Err(Error::Config(String::from("The database path is empty")));
        }
        let connection = RawConnection::open(path)?;
        if let Some(supplier) = &self.credentials {
            if let Some(key) = supplier.credential()? {
                connection.pragma_update(None, "key", key)?;
            }
        }
        Ok(connection)
    }
}

impl Driver for SqliteDriver {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        let handle = match &self.backing {
            Backing::Memory {
                connection,
                interrupt,
            } => Handle::Shared(connection.clone(), interrupt.clone()),
            Backing::File(path) => {
                let connection = self.open_file(path)?;
                let interrupt = Arc::new(connection.get_interrupt_handle());
                Handle::Owned(connection, interrupt)
            }
        };
        let busy_timeout = self.busy_timeout;
        handle.with(|c| Ok(c.busy_timeout(busy_timeout)?))?;
        Ok(Box::new(SqliteConnection { handle }))
    }
    fn name(&self) -> &str {
        "sqlite"
    }
}

enum Handle {
    Owned(RawConnection, Arc<InterruptHandle>),
    Shared(Arc<ReentrantMutex<RawConnection>>, Arc<InterruptHandle>),
}

impl Handle {
    fn with<R>(&self, f: impl FnOnce(&RawConnection) -> Result<R>) -> Result<R> {
        match self {
            Handle::Owned(connection, _) => f(connection),
            Handle::Shared(connection, _) => {
                let guard = connection.lock();
                f(&guard)
            }
        }
    }
    fn interrupt(&self) -> Arc<InterruptHandle> {
        match self {
            Handle::Owned(_, interrupt) | Handle::Shared(_, interrupt) => interrupt.clone(),
        }
    }
}

pub struct SqliteConnection {
    handle: Handle,
}

fn bind(statement: &mut Statement<'_>, params: &[BoundParameter]) -> Result<()> {
    for param in params {
        if param.direction() != ParamDirection::Input {
            return Err(Error::Unsupported(format!(
                "{:?} parameter {} (sqlite binds input parameters only)",
                param.direction(),
                param.name()
            )));
        }
        match statement.parameter_index(param.name())? {
            Some(index) => statement.raw_bind_parameter(index, param.value())?,
            None => debug!(name = param.name(), "Parameter is not referenced by the statement"),
        }
    }
    Ok(())
}

impl Connection for SqliteConnection {
    fn execute(&self, sql: &str, params: &[BoundParameter]) -> Result<usize> {
        self.handle.with(|connection| {
            let mut statement = connection.prepare(sql)?;
            bind(&mut statement, params)?;
            Ok(statement.raw_execute()?)
        })
    }
    fn query(
        &self,
        sql: &str,
        params: &[BoundParameter],
        visit: &mut dyn FnMut(&mut dyn Cursor) -> Result<()>,
    ) -> Result<()> {
        self.handle.with(|connection| {
            let mut statement = connection.prepare(sql)?;
            bind(&mut statement, params)?;
            let columns: Vec<String> = statement
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let mut cursor = SqliteCursor {
                current: Vec::with_capacity(columns.len()),
                columns,
                rows: statement.raw_query(),
            };
            visit(&mut cursor)
        })
    }
    fn interrupt_handle(&self) -> Option<Box<dyn Interrupt>> {
        Some(Box::new(SqliteInterrupt(self.handle.interrupt())))
    }
}

struct SqliteInterrupt(Arc<InterruptHandle>);

impl Interrupt for SqliteInterrupt {
    fn interrupt(&self) {
        self.0.interrupt();
    }
}

pub struct SqliteCursor<'stmt> {
    rows: Rows<'stmt>,
    columns: Vec<String>,
    current: Vec<Value>,
}

impl Cursor for SqliteCursor<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }
    fn next_row(&mut self) -> Result<Option<&[Value]>> {
        let width = self.columns.len();
        match self.rows.next()? {
            Some(row) => {
                self.current.clear();
                for i in 0..width {
                    self.current.push(Value::from(row.get_ref(i)?));
                }
                Ok(Some(&self.current))
            }
            None => Ok(None),
        }
    }
}
