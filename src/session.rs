//! Executing compiled statements and hydrating their results.
//!
//! Blocking calls run on the calling thread. The `_async` calls run the
//! driver on tokio's blocking pool and race it against the caller's
//! [`CancelToken`] and the optional timeout in [`QueryOptions`]; when either
//! wins, the running statement is interrupted and the call returns
//! [`Error::Cancelled`] or [`Error::Timeout`].

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::driver::{Connection, Cursor, Driver, Interrupt};
use crate::error::{Error, Result};
use crate::hydrate::{Coercible, Hydrate, Hydrator, Record};
use crate::statement::CompiledStatement;
use crate::value::Value;

const STREAM_BUFFER: usize = 64;
const INTERRUPT_RETRY: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Upper bound on a non-blocking call, including connecting.
    pub timeout: Option<Duration>,
}

impl QueryOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

#[derive(Clone)]
pub struct Session {
    driver: Arc<dyn Driver>,
    hydrator: Hydrator,
    options: QueryOptions,
}

// A cursor that stops with `Error::Cancelled` once its token is cancelled.
struct Watched<'a> {
    inner: &'a mut dyn Cursor,
    cancel: &'a CancelToken,
}

impl Cursor for Watched<'_> {
    fn columns(&self) -> &[String] {
        self.inner.columns()
    }
    fn next_row(&mut self) -> Result<Option<&[Value]>> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.inner.next_row()
    }
}

fn with_cursor<R>(
    connection: &dyn Connection,
    statement: &CompiledStatement,
    cancel: Option<&CancelToken>,
    f: impl FnOnce(&mut dyn Cursor) -> Result<R>,
) -> Result<R> {
    let mut f = Some(f);
    let mut out = None;
    connection.query(statement.sql(), statement.params(), &mut |cursor| {
        if let Some(f) = f.take() {
            out = Some(match cancel {
                Some(cancel) => f(&mut Watched {
                    inner: cursor,
                    cancel,
                }),
                None => f(cursor),
            }?);
        }
        Ok(())
    })?;
    out.ok_or_else(|| Error::Driver(String::from("The driver returned without a cursor")))
}

// ------------- Operations -------------
// Each returns its result together with the number of rows it touched.

fn non_query(connection: &dyn Connection, statement: &CompiledStatement) -> Result<(usize, usize)> {
    let affected = connection.execute(statement.sql(), statement.params())?;
    Ok((affected, affected))
}

fn scalar<V: Coercible>(
    connection: &dyn Connection,
    hydrator: &Hydrator,
    statement: &CompiledStatement,
    cancel: Option<&CancelToken>,
) -> Result<(Option<V>, usize)> {
    with_cursor(connection, statement, cancel, |cursor| {
        Ok(match cursor.next_row()? {
            Some(row) => (hydrator.scalar::<V>(row), 1),
            None => (None, 0),
        })
    })
}

fn one<T: Hydrate>(
    connection: &dyn Connection,
    hydrator: &Hydrator,
    statement: &CompiledStatement,
    cancel: Option<&CancelToken>,
) -> Result<(Option<T>, usize)> {
    with_cursor(connection, statement, cancel, |cursor| {
        let columns = cursor.columns().to_vec();
        Ok(match cursor.next_row()? {
            Some(row) => (Some(hydrator.fill_one::<T>(&columns, row)), 1),
            None => (None, 0),
        })
    })
}

fn many<T: Hydrate>(
    connection: &dyn Connection,
    hydrator: &Hydrator,
    statement: &CompiledStatement,
    cancel: Option<&CancelToken>,
) -> Result<(Vec<T>, usize)> {
    with_cursor(connection, statement, cancel, |cursor| {
        let items = hydrator.fill_many::<T>(cursor)?;
        let rows = items.len();
        Ok((items, rows))
    })
}

fn record(
    connection: &dyn Connection,
    hydrator: &Hydrator,
    statement: &CompiledStatement,
    cancel: Option<&CancelToken>,
) -> Result<(Option<Record>, usize)> {
    with_cursor(connection, statement, cancel, |cursor| {
        let columns = cursor.columns().to_vec();
        Ok(match cursor.next_row()? {
            Some(row) => (Some(hydrator.record(&columns, row)), 1),
            None => (None, 0),
        })
    })
}

fn records(
    connection: &dyn Connection,
    hydrator: &Hydrator,
    statement: &CompiledStatement,
    cancel: Option<&CancelToken>,
) -> Result<(Vec<Record>, usize)> {
    with_cursor(connection, statement, cancel, |cursor| {
        let records = hydrator.records(cursor)?;
        let rows = records.len();
        Ok((records, rows))
    })
}

fn each<T, F>(
    connection: &dyn Connection,
    hydrator: &Hydrator,
    statement: &CompiledStatement,
    cancel: Option<&CancelToken>,
    f: F,
) -> Result<(usize, usize)>
where
    T: Hydrate,
    F: FnMut(T) -> ControlFlow<()>,
{
    with_cursor(connection, statement, cancel, |cursor| {
        let rows = hydrator.for_each::<T, F>(cursor, f)?;
        Ok((rows, rows))
    })
}

type InterruptSlot = Arc<Mutex<Option<Box<dyn Interrupt>>>>;

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending::<()>().await,
    }
}

// An interrupt only reaches a statement that is already stepping, so keep
// interrupting until the background work unwinds.
async fn interrupt_until_done<T>(slot: &InterruptSlot, task: &mut JoinHandle<T>) {
    loop {
        if let Some(handle) = slot.lock().as_ref() {
            handle.interrupt();
        }
        tokio::select! {
            _ = &mut *task => break,
            _ = tokio::time::sleep(INTERRUPT_RETRY) => {}
        }
    }
}

fn log_outcome<R>(statement_length: usize, params: usize, started: Instant, result: &Result<(R, usize)>) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok((_, rows)) => debug!(
            sql_length = statement_length,
            params,
            elapsed_ms,
            rows,
            "Statement executed"
        ),
        Err(Error::Cancelled) => warn!(sql_length = statement_length, params, elapsed_ms, "Statement cancelled"),
        Err(e) => warn!(
            sql_length = statement_length,
            params,
            elapsed_ms,
            error = %e,
            "Statement failed"
        ),
    }
}

impl Session {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            hydrator: Hydrator::default(),
            options: QueryOptions::default(),
        }
    }
    pub fn with_hydrator(mut self, hydrator: Hydrator) -> Self {
        self.hydrator = hydrator;
        self
    }
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }
    pub fn hydrator(&self) -> &Hydrator {
        &self.hydrator
    }
    pub fn options(&self) -> QueryOptions {
        self.options
    }

    fn run<R>(
        &self,
        statement: &CompiledStatement,
        work: impl FnOnce(&dyn Connection) -> Result<(R, usize)>,
    ) -> Result<R> {
        let started = Instant::now();
        let result = self
            .driver
            .connect()
            .and_then(|connection| work(connection.as_ref()));
        log_outcome(statement.sql().len(), statement.params().len(), started, &result);
        result.map(|(value, _)| value)
    }

    // ------------- Blocking -------------

    /// Runs a statement that returns no rows; yields the affected row count.
    pub fn execute_non_query(&self, statement: CompiledStatement) -> Result<usize> {
        self.run(&statement, |c| non_query(c, &statement))
    }
    pub fn execute_scalar<V: Coercible>(&self, statement: CompiledStatement) -> Result<Option<V>> {
        self.run(&statement, |c| scalar::<V>(c, &self.hydrator, &statement, None))
    }
    pub fn query_one<T: Hydrate>(&self, statement: CompiledStatement) -> Result<Option<T>> {
        self.run(&statement, |c| one::<T>(c, &self.hydrator, &statement, None))
    }
    pub fn query_many<T: Hydrate>(&self, statement: CompiledStatement) -> Result<Vec<T>> {
        self.run(&statement, |c| many::<T>(c, &self.hydrator, &statement, None))
    }
    pub fn query_record(&self, statement: CompiledStatement) -> Result<Option<Record>> {
        self.run(&statement, |c| record(c, &self.hydrator, &statement, None))
    }
    pub fn query_records(&self, statement: CompiledStatement) -> Result<Vec<Record>> {
        self.run(&statement, |c| records(c, &self.hydrator, &statement, None))
    }
    /// Streams filled rows into `f` without collecting them.
    pub fn for_each<T, F>(&self, statement: CompiledStatement, f: F) -> Result<usize>
    where
        T: Hydrate,
        F: FnMut(T) -> ControlFlow<()>,
    {
        self.run(&statement, |c| each::<T, F>(c, &self.hydrator, &statement, None, f))
    }

    // ------------- Non-blocking -------------

    async fn run_async<R, W>(&self, statement: CompiledStatement, cancel: &CancelToken, work: W) -> Result<R>
    where
        R: Send + 'static,
        W: FnOnce(&dyn Connection, &Hydrator, &CompiledStatement, &CancelToken) -> Result<(R, usize)>
            + Send
            + 'static,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let started = Instant::now();
        let (sql_length, params) = (statement.sql().len(), statement.params().len());
        let interrupt: InterruptSlot = Arc::default();

        let driver = self.driver.clone();
        let hydrator = self.hydrator.clone();
        let token = cancel.clone();
        let slot = interrupt.clone();
        let mut task = tokio::task::spawn_blocking(move || {
            let connection = driver.connect()?;
            *slot.lock() = connection.interrupt_handle();
            // a cancel that landed before the handle was published is caught here
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            work(connection.as_ref(), &hydrator, &statement, &token)
        });

        let timeout = self.options.timeout;
        let deadline = deadline(timeout);
        tokio::pin!(deadline);

        let stopped = tokio::select! {
            joined = &mut task => {
                let result = joined.map_err(Error::from).and_then(|r| r);
                log_outcome(sql_length, params, started, &result);
                return result.map(|(value, _)| value);
            }
            _ = cancel.cancelled() => Error::Cancelled,
            _ = &mut deadline => Error::Timeout(timeout.unwrap_or_default()),
        };
        interrupt_until_done(&interrupt, &mut task).await;
        let stopped: Result<(R, usize)> = Err(stopped);
        log_outcome(sql_length, params, started, &stopped);
        stopped.map(|(value, _)| value)
    }

    pub async fn execute_non_query_async(&self, statement: CompiledStatement, cancel: &CancelToken) -> Result<usize> {
        self.run_async(statement, cancel, |c, _, s, _| non_query(c, s)).await
    }
    pub async fn execute_scalar_async<V>(&self, statement: CompiledStatement, cancel: &CancelToken) -> Result<Option<V>>
    where
        V: Coercible + Send + 'static,
    {
        self.run_async(statement, cancel, |c, h, s, t| scalar::<V>(c, h, s, Some(t))).await
    }
    pub async fn query_one_async<T>(&self, statement: CompiledStatement, cancel: &CancelToken) -> Result<Option<T>>
    where
        T: Hydrate + Send,
    {
        self.run_async(statement, cancel, |c, h, s, t| one::<T>(c, h, s, Some(t))).await
    }
    pub async fn query_many_async<T>(&self, statement: CompiledStatement, cancel: &CancelToken) -> Result<Vec<T>>
    where
        T: Hydrate + Send,
    {
        self.run_async(statement, cancel, |c, h, s, t| many::<T>(c, h, s, Some(t))).await
    }
    pub async fn query_record_async(&self, statement: CompiledStatement, cancel: &CancelToken) -> Result<Option<Record>> {
        self.run_async(statement, cancel, |c, h, s, t| record(c, h, s, Some(t))).await
    }
    pub async fn query_records_async(&self, statement: CompiledStatement, cancel: &CancelToken) -> Result<Vec<Record>> {
        self.run_async(statement, cancel, |c, h, s, t| records(c, h, s, Some(t))).await
    }
    /// Like [`Session::for_each`]; `f` runs on the blocking pool.
    pub async fn for_each_async<T, F>(&self, statement: CompiledStatement, cancel: &CancelToken, f: F) -> Result<usize>
    where
        T: Hydrate,
        F: FnMut(T) -> ControlFlow<()> + Send + 'static,
    {
        self.run_async(statement, cancel, move |c, h, s, t| each::<T, F>(c, h, s, Some(t), f))
            .await
    }

    /// Yields filled rows as they are read. Cancellation and the timeout in
    /// [`QueryOptions`] interrupt the statement and end the stream with
    /// [`Error::Cancelled`] or [`Error::Timeout`]; dropping the stream stops
    /// the reader at the next row. Must be called from within a tokio runtime.
    pub fn query_stream<T>(&self, statement: CompiledStatement, cancel: &CancelToken) -> ReceiverStream<Result<T>>
    where
        T: Hydrate + Send,
    {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let interrupt: InterruptSlot = Arc::default();
        let halted = Arc::new(AtomicBool::new(false));

        let driver = self.driver.clone();
        let hydrator = self.hydrator.clone();
        let token = cancel.clone();
        let slot = interrupt.clone();
        let reader_halted = halted.clone();
        let reader_tx = tx.clone();
        let mut reader = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let result = driver.connect().and_then(|connection| {
                *slot.lock() = connection.interrupt_handle();
                with_cursor(connection.as_ref(), &statement, Some(&token), |cursor| {
                    hydrator.for_each::<T, _>(cursor, |item| {
                        if reader_tx.blocking_send(Ok(item)).is_err() {
                            ControlFlow::Break(())
                        } else {
                            ControlFlow::Continue(())
                        }
                    })
                })
            });
            let result = result.map(|rows| ((), rows));
            log_outcome(statement.sql().len(), statement.params().len(), started, &result);
            // exactly one of reader and watcher reports the error
            if let Err(e) = result {
                if !reader_halted.swap(true, Ordering::SeqCst) {
                    let _ = reader_tx.blocking_send(Err(e));
                }
            }
        });

        let timeout = self.options.timeout;
        let token = cancel.clone();
        tokio::spawn(async move {
            let deadline = deadline(timeout);
            tokio::pin!(deadline);
            let stopped = tokio::select! {
                biased;
                _ = &mut reader => return,
                _ = token.cancelled() => Error::Cancelled,
                _ = &mut deadline => Error::Timeout(timeout.unwrap_or_default()),
            };
            let reported = halted.swap(true, Ordering::SeqCst);
            interrupt_until_done(&interrupt, &mut reader).await;
            if !reported {
                let _ = tx.send(Err(stopped)).await;
            }
        });
        ReceiverStream::new(rx)
    }
}
