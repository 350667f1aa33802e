//! The database boundary.
//!
//! A [`Driver`] hands out connections, a [`Connection`] runs a statement and
//! lends a forward-only [`Cursor`] to a visitor for the duration of the call.
//! The cursor is released when `query` returns, whichever way it returns.

pub mod sqlite;

use crate::error::Result;
use crate::hydrate::names_match;
use crate::params::BoundParameter;
use crate::value::Value;

pub use sqlite::{ConnectionTarget, SqliteDriver};

pub trait Driver: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Connection>>;
    fn name(&self) -> &str;
}

pub trait Connection: Send {
    /// Runs a statement that returns no rows and reports the affected count.
    fn execute(&self, sql: &str, params: &[BoundParameter]) -> Result<usize>;
    fn query(
        &self,
        sql: &str,
        params: &[BoundParameter],
        visit: &mut dyn FnMut(&mut dyn Cursor) -> Result<()>,
    ) -> Result<()>;
    /// A handle that aborts whatever statement is running on this connection.
    fn interrupt_handle(&self) -> Option<Box<dyn Interrupt>>;
}

pub trait Cursor {
    fn columns(&self) -> &[String];
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns().iter().position(|c| names_match(c, name))
    }
    fn next_row(&mut self) -> Result<Option<&[Value]>>;
}

pub trait Interrupt: Send + Sync {
    fn interrupt(&self);
}

/// Supplies the key for an encrypted database at connect time.
pub trait CredentialSupplier: Send + Sync {
    fn credential(&self) -> Result<Option<String>>;
}

impl<F> CredentialSupplier for F
where
    F: Fn() -> Result<Option<String>> + Send + Sync,
{
    fn credential(&self) -> Result<Option<String>> {
        self()
    }
}
