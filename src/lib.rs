#![warn(missing_docs)]

//! # oracle-oci
//!
//! Connection layer of an Oracle driver built on the Oracle Call Interface.
//!
//! The crate parses Oracle connection strings, logs on through the OCI client
//! library, and manages the lifetime of the native handles behind each
//! connection. Statement execution and row fetching live in a separate layer
//! that borrows the handles a [`Connection`] exposes.
//!
//! ## Features
//!
//! - **Connection strings** - `user/pass@host:port/service?params` parsing and
//!   serialization, with percent-decoding of credentials
//! - **Two logon protocols** - a session built from separate server, service
//!   context and session handles, or a single direct logon
//! - **Leak-free setup** - a failed logon releases every handle it acquired,
//!   newest first
//! - **Transactions** - serializable and read-only isolation
//! - **Runtime loading** - the OCI client library is loaded with `libloading`,
//!   so no Oracle libraries are needed at build time
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oracle_oci::Driver;
//!
//! #[tokio::main]
//! async fn main() -> oracle_oci::Result<()> {
//!     let driver = Driver::load()?;
//!     let mut conn = driver.connect("scott/tiger@dbhost:1521/ORCLPDB1").await?;
//!
//!     conn.ping()?;
//!     conn.commit()?;
//!     conn.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection Strings
//!
//! ```text
//! [oracle://]username/password@connect_string[?param=value&...]
//! ```
//!
//! | Parameter | Values | Default |
//! |-----------|--------|---------|
//! | `loc` | IANA zone name, `Local` | `Local` |
//! | `isolation` | `READONLY`, `SERIALIZABLE`, `DEFAULT` | read-write |
//! | `questionph` | `YES`, `TRUE`, `NO`, `FALSE` | `NO` |
//! | `prefetch_rows` | unsigned integer | `10` |
//! | `prefetch_memory` | unsigned integer | `0` |
//! | `as` | `SYSDBA`, `SYSASM`, `SYSOPER` | none |
//!
//! Leaving out username, password and connect string (e.g. `oracle://?as=SYSDBA`)
//! selects external authentication.
//!
//! ```rust
//! use oracle_oci::{Dsn, TransactionMode};
//!
//! let dsn: Dsn = "scott/tiger@db:1521/XE?isolation=SERIALIZABLE".parse().unwrap();
//! assert_eq!(dsn.username(), "scott");
//! assert_eq!(dsn.connect(), "db:1521/XE");
//! assert_eq!(dsn.transaction_mode(), TransactionMode::Serializable);
//! ```
//!
//! ## Placeholders
//!
//! Connections opened with `questionph=YES` rewrite `?` markers into Oracle's
//! positional `:1`, `:2`, ... form via [`Connection::prepare_sql`].
//!
//! ## Client Library
//!
//! [`Driver::load`] looks for the library named by the `OCI_LIB_PATH`
//! environment variable, falling back to the platform default
//! (`libclntsh.so`, `libclntsh.dylib` or `oci.dll`).

pub mod config;
pub mod connection;
pub mod constants;
pub mod error;
mod handle;
pub mod native;
pub mod placeholder;
pub mod result;

// Re-export commonly used types
pub use config::{Dsn, DsnBuilder, Location, PrivilegedMode, TransactionMode};
pub use connection::{Connection, Driver, LogonProtocol, Transaction};
pub use error::{Error, Result};
pub use native::{
    AttrValue, Attribute, CredentialType, Diagnostic, HandleType, OciApi, OciLibrary, RawHandle,
    Status,
};
pub use placeholder::placeholders;
pub use result::ExecResult;
