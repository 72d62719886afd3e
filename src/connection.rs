//! Oracle database connection
//!
//! This module provides the [`Driver`] that opens connections and the
//! [`Connection`] it produces.
//!
//! Opening a connection walks a fixed ladder of native calls. Each acquired
//! resource is pushed onto the connection's ownership stack, so a failure at
//! any rung releases everything acquired so far, newest first, before the
//! error is returned.
//!
//! # Example
//!
//! ```rust,no_run
//! use oracle_oci::Driver;
//!
//! # fn example() -> oracle_oci::Result<()> {
//! let driver = Driver::load()?;
//! let mut conn = driver.open("scott/tiger@dbhost:1521/ORCLPDB1?isolation=SERIALIZABLE")?;
//!
//! let tx = conn.begin()?;
//! // ... statements ...
//! tx.commit()?;
//!
//! conn.close()?;
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Dsn, Location, PrivilegedMode, TransactionMode};
use crate::constants::{ENV_MODE, TRANS_START_TIMEOUT};
use crate::error::{Error, Result};
use crate::handle::{native_error, Resource, ResourceStack};
use crate::native::{
    AttrValue, Attribute, CredentialType, HandleType, OciApi, OciLibrary, RawHandle,
};
use crate::placeholder::placeholders;

/// Default time allowed for [`Driver::connect`]
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How the driver logs on to the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogonProtocol {
    /// Allocate server, service context and session handles separately,
    /// attach, then begin the session. Required for privileged modes and
    /// external authentication.
    #[default]
    Session,
    /// A single `OCILogon` call that yields the service context
    Direct,
}

// Connection ID counter
static CONNECTION_ID_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Opens connections through an [`OciApi`] implementation.
///
/// Cloning a driver is cheap; clones share the loaded library.
#[derive(Clone)]
pub struct Driver {
    api: Arc<dyn OciApi>,
    protocol: LogonProtocol,
    connect_timeout: Duration,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("protocol", &self.protocol)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Driver {
    /// Create a driver over the given native layer
    pub fn new(api: impl OciApi + 'static) -> Self {
        Self::from_arc(Arc::new(api))
    }

    /// Create a driver over a shared native layer
    pub fn from_arc(api: Arc<dyn OciApi>) -> Self {
        Self {
            api,
            protocol: LogonProtocol::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Create a driver over the Oracle client library found via
    /// [`OciLibrary::load`]
    pub fn load() -> Result<Self> {
        Ok(Self::new(OciLibrary::load()?))
    }

    /// Create a driver over the Oracle client library at `path`
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::new(OciLibrary::load_from(path)?))
    }

    /// Select the logon protocol
    pub fn with_protocol(mut self, protocol: LogonProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the time allowed for [`Driver::connect`]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// The logon protocol in use
    pub fn protocol(&self) -> LogonProtocol {
        self.protocol
    }

    /// Parse `dsn` and open a connection.
    ///
    /// Blocks until the logon finishes.
    pub fn open(&self, dsn: &str) -> Result<Connection> {
        let dsn: Dsn = dsn.parse()?;
        self.open_dsn(&dsn)
    }

    /// Open a connection with an already parsed [`Dsn`]
    pub fn open_dsn(&self, dsn: &Dsn) -> Result<Connection> {
        let id = CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let api = self.api.as_ref();
        let mut resources = ResourceStack::new(Arc::clone(&self.api));

        let env = api.env_create(ENV_MODE).map_err(|status| {
            tracing::debug!(id, %status, "environment creation failed");
            Error::EnvironmentCreate
        })?;
        resources.push(Resource::Handle {
            handle: env,
            kind: HandleType::Environment,
        });
        tracing::debug!(id, state = "env", "acquired");

        let error = resources.alloc(env, HandleType::Error)?;
        tracing::debug!(id, state = "err", "acquired");

        let logon = match self.protocol {
            LogonProtocol::Session => session_logon(api, &mut resources, env, error, dsn, id)?,
            LogonProtocol::Direct => direct_logon(api, &mut resources, env, error, dsn, id)?,
        };

        tracing::info!(
            id,
            protocol = ?self.protocol,
            external_auth = dsn.external_auth(),
            "connection opened"
        );

        Ok(Connection {
            id,
            api: Arc::clone(&self.api),
            resources,
            env,
            error,
            service: logon.service,
            server: logon.server,
            session: logon.session,
            protocol: self.protocol,
            location: dsn.location(),
            transaction_mode: dsn.transaction_mode(),
            prefetch_rows: dsn.prefetch_rows(),
            prefetch_memory: dsn.prefetch_memory(),
            question_mark_placeholders: dsn.question_mark_placeholders(),
            in_transaction: false,
            closed: false,
        })
    }

    /// Open a connection on Tokio's blocking pool, bounded by the connect
    /// timeout.
    ///
    /// If the timeout elapses the attempt keeps running in the background;
    /// a connection it produces afterwards is dropped and released.
    pub async fn connect(&self, dsn: &str) -> Result<Connection> {
        let dsn: Dsn = dsn.parse()?;
        let driver = self.clone();
        let attempt = tokio::task::spawn_blocking(move || driver.open_dsn(&dsn));

        match tokio::time::timeout(self.connect_timeout, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(Error::Internal(format!(
                "connect task failed: {}",
                join_error
            ))),
            Err(_) => {
                tracing::warn!(timeout = ?self.connect_timeout, "connect timed out");
                Err(Error::ConnectionTimeout(self.connect_timeout))
            }
        }
    }
}

/// Handles produced by a logon protocol
struct Logon {
    service: RawHandle,
    server: Option<RawHandle>,
    session: Option<RawHandle>,
}

fn session_logon(
    api: &dyn OciApi,
    resources: &mut ResourceStack,
    env: RawHandle,
    error: RawHandle,
    dsn: &Dsn,
    id: u32,
) -> Result<Logon> {
    let server = resources.alloc(env, HandleType::Server)?;
    tracing::debug!(id, state = "srv", "acquired");

    let dblink = if dsn.external_auth() {
        None
    } else {
        Some(dsn.connect())
    };
    api.server_attach(server, error, dblink)
        .map_err(|status| native_error(api, error, status))?;
    resources.push(Resource::Attachment { server, error });
    tracing::debug!(id, connect = dsn.connect(), "server attached");

    let service = resources.alloc(env, HandleType::ServiceContext)?;
    tracing::debug!(id, state = "svc", "acquired");

    api.attr_set(
        service,
        HandleType::ServiceContext,
        AttrValue::Handle(server),
        Attribute::Server,
        error,
    )
    .map_err(|status| native_error(api, error, status))?;

    let session = resources.alloc(env, HandleType::Session)?;
    tracing::debug!(id, state = "usrSession", "acquired");

    let credential = if dsn.external_auth() {
        CredentialType::External
    } else {
        for (attribute, value) in [
            (Attribute::Username, dsn.username()),
            (Attribute::Password, dsn.password()),
        ] {
            api.attr_set(
                session,
                HandleType::Session,
                AttrValue::Text(value),
                attribute,
                error,
            )
            .map_err(|status| native_error(api, error, status))?;
        }
        CredentialType::Rdbms
    };

    api.session_begin(service, error, session, credential, dsn.privileged_mode())
        .map_err(|status| native_error(api, error, status))?;
    resources.push(Resource::Session {
        service,
        error,
        session,
    });
    tracing::debug!(id, ?credential, mode = ?dsn.privileged_mode(), "session begun");

    api.attr_set(
        service,
        HandleType::ServiceContext,
        AttrValue::Handle(session),
        Attribute::Session,
        error,
    )
    .map_err(|status| native_error(api, error, status))?;

    Ok(Logon {
        service,
        server: Some(server),
        session: Some(session),
    })
}

fn direct_logon(
    api: &dyn OciApi,
    resources: &mut ResourceStack,
    env: RawHandle,
    error: RawHandle,
    dsn: &Dsn,
    id: u32,
) -> Result<Logon> {
    if dsn.privileged_mode() != PrivilegedMode::Default {
        tracing::warn!(
            id,
            mode = ?dsn.privileged_mode(),
            "privileged mode ignored by direct logon"
        );
    }
    if dsn.external_auth() {
        tracing::warn!(id, "external authentication ignored by direct logon");
    }

    let service = api
        .logon(env, error, dsn.username(), dsn.password(), dsn.connect())
        .map_err(|status| native_error(api, error, status))?;
    resources.push(Resource::Logon { service, error });
    tracing::debug!(id, state = "svc", "logged on");

    Ok(Logon {
        service,
        server: None,
        session: None,
    })
}

/// An open connection to an Oracle database.
///
/// Owns its native handles exclusively; they are released when the
/// connection is closed or dropped. Operations take `&mut self`, so one
/// connection serves one caller at a time. Use one connection per concurrent
/// user (e.g. via a pool).
pub struct Connection {
    id: u32,
    api: Arc<dyn OciApi>,
    resources: ResourceStack,
    env: RawHandle,
    error: RawHandle,
    service: RawHandle,
    server: Option<RawHandle>,
    session: Option<RawHandle>,
    protocol: LogonProtocol,
    location: Location,
    transaction_mode: TransactionMode,
    prefetch_rows: u32,
    prefetch_memory: u32,
    question_mark_placeholders: bool,
    in_transaction: bool,
    closed: bool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("protocol", &self.protocol)
            .field("location", &self.location)
            .field("transaction_mode", &self.transaction_mode)
            .field("in_transaction", &self.in_transaction)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Connection {
    /// Get the connection ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Check if the connection is closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Protocol the connection logged on with
    pub fn protocol(&self) -> LogonProtocol {
        self.protocol
    }

    /// Time zone for DATE values
    pub fn location(&self) -> Location {
        self.location
    }

    /// Isolation applied by [`Connection::begin`]
    pub fn transaction_mode(&self) -> TransactionMode {
        self.transaction_mode
    }

    /// Rows prefetched per round trip
    pub fn prefetch_rows(&self) -> u32 {
        self.prefetch_rows
    }

    /// Prefetch memory limit in bytes
    pub fn prefetch_memory(&self) -> u32 {
        self.prefetch_memory
    }

    /// Whether `?` placeholders are rewritten
    pub fn question_mark_placeholders(&self) -> bool {
        self.question_mark_placeholders
    }

    /// Whether a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Number of native resources currently held
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Environment handle, for statement-level collaborators
    pub fn env_handle(&self) -> RawHandle {
        self.env
    }

    /// Error handle, for statement-level collaborators
    pub fn error_handle(&self) -> RawHandle {
        self.error
    }

    /// Service context handle, for statement-level collaborators
    pub fn service_handle(&self) -> RawHandle {
        self.service
    }

    /// Server handle (session protocol only)
    pub fn server_handle(&self) -> Option<RawHandle> {
        self.server
    }

    /// User session handle (session protocol only)
    pub fn session_handle(&self) -> Option<RawHandle> {
        self.session
    }

    /// Rewrite `?` placeholders when the connection string enabled them
    pub fn prepare_sql<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        if self.question_mark_placeholders {
            placeholders(sql)
        } else {
            Cow::Borrowed(sql)
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// Begin a transaction.
    ///
    /// A read-only or serializable isolation from the connection string is
    /// applied here with `OCITransStart`; read-write needs no call.
    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        self.ensure_open()?;
        self.in_transaction = true;
        if self.transaction_mode != TransactionMode::ReadWrite {
            let started = self.api.trans_start(
                self.service,
                self.error,
                TRANS_START_TIMEOUT,
                self.transaction_mode,
            );
            if let Err(status) = started {
                self.in_transaction = false;
                return Err(native_error(self.api.as_ref(), self.error, status));
            }
        }
        tracing::debug!(id = self.id, mode = ?self.transaction_mode, "transaction begun");
        Ok(Transaction { conn: self })
    }

    /// Commit the current transaction.
    ///
    /// The in-transaction flag is cleared before the native call and stays
    /// cleared if the commit fails.
    pub fn commit(&mut self) -> Result<()> {
        self.in_transaction = false;
        self.ensure_open()?;
        self.api
            .trans_commit(self.service, self.error)
            .map_err(|status| native_error(self.api.as_ref(), self.error, status))
    }

    /// Roll back the current transaction.
    ///
    /// The in-transaction flag is cleared before the native call and stays
    /// cleared if the rollback fails.
    pub fn rollback(&mut self) -> Result<()> {
        self.in_transaction = false;
        self.ensure_open()?;
        self.api
            .trans_rollback(self.service, self.error)
            .map_err(|status| native_error(self.api.as_ref(), self.error, status))
    }

    /// Check that the server is reachable with `OCIPing`
    pub fn ping(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.api
            .ping(self.service, self.error)
            .map_err(|status| native_error(self.api.as_ref(), self.error, status))
    }

    /// Close the connection, ending the session and releasing every handle.
    ///
    /// All resources are released even when one release fails; the first
    /// failure is returned. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.in_transaction = false;
        tracing::debug!(id = self.id, "closing connection");
        self.resources.release_all()
    }
}

/// A transaction on a [`Connection`].
///
/// Holds no state of its own. Dropping it without calling
/// [`commit`](Transaction::commit) or [`rollback`](Transaction::rollback)
/// leaves the transaction open on the connection.
#[derive(Debug)]
pub struct Transaction<'c> {
    conn: &'c mut Connection,
}

impl Transaction<'_> {
    /// The connection this transaction runs on
    pub fn connection(&mut self) -> &mut Connection {
        self.conn
    }

    /// Commit, see [`Connection::commit`]
    pub fn commit(self) -> Result<()> {
        self.conn.commit()
    }

    /// Roll back, see [`Connection::rollback`]
    pub fn rollback(self) -> Result<()> {
        self.conn.rollback()
    }
}
