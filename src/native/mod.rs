//! Native call-level layer
//!
//! [`OciApi`] names every OCI primitive the driver consumes. The production
//! implementation is [`OciLibrary`], which resolves the symbols from the
//! Oracle client library at runtime. Tests substitute their own
//! implementation to observe and fail individual calls.
//!
//! Calls that produce a value return `Ok` only for the statuses the OCI
//! documentation treats as success for that call; any other status is handed
//! back in `Err` so the caller can fetch the diagnostic from the error handle.

mod oci;

pub use oci::{OciLibrary, LIBRARY_PATH_ENV};

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

use crate::config::{PrivilegedMode, TransactionMode};
use crate::constants::{attr, credential, htype, status};

/// Opaque native handle issued by the OCI library.
///
/// Never dereferenced by this crate; it is only passed back to the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(NonNull<c_void>);

// OCI environments are created with OCI_THREADED, so handles may move between
// threads. Concurrent use of one handle is prevented by `Connection` taking
// `&mut self`.
unsafe impl Send for RawHandle {}

impl RawHandle {
    /// Wrap a pointer returned by the library. Returns `None` for null.
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(RawHandle)
    }

    /// Build a handle from a non-zero token, for implementations of
    /// [`OciApi`] that do not hand out real pointers.
    pub fn from_token(token: usize) -> Option<Self> {
        Self::new(token as *mut c_void)
    }

    /// The token or address behind this handle
    pub fn token(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// The raw pointer to pass back to the library
    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Return status of an OCI call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Status {
    Success,
    SuccessWithInfo,
    NeedData,
    NoData,
    Error,
    InvalidHandle,
    StillExecuting,
    Continue,
    Other(i32),
}

impl Status {
    /// `OCI_SUCCESS` only
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// `OCI_SUCCESS` or `OCI_SUCCESS_WITH_INFO`
    pub fn is_success_or_info(self) -> bool {
        matches!(self, Status::Success | Status::SuccessWithInfo)
    }

    /// The numeric return code
    pub fn code(self) -> i32 {
        match self {
            Status::Success => status::SUCCESS,
            Status::SuccessWithInfo => status::SUCCESS_WITH_INFO,
            Status::NeedData => status::NEED_DATA,
            Status::NoData => status::NO_DATA,
            Status::Error => status::ERROR,
            Status::InvalidHandle => status::INVALID_HANDLE,
            Status::StillExecuting => status::STILL_EXECUTING,
            Status::Continue => status::CONTINUE,
            Status::Other(code) => code,
        }
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        match code {
            status::SUCCESS => Status::Success,
            status::SUCCESS_WITH_INFO => Status::SuccessWithInfo,
            status::NEED_DATA => Status::NeedData,
            status::NO_DATA => Status::NoData,
            status::ERROR => Status::Error,
            status::INVALID_HANDLE => Status::InvalidHandle,
            status::STILL_EXECUTING => Status::StillExecuting,
            status::CONTINUE => Status::Continue,
            other => Status::Other(other),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => f.write_str("OCI_SUCCESS"),
            Status::SuccessWithInfo => f.write_str("OCI_SUCCESS_WITH_INFO"),
            Status::NeedData => f.write_str("OCI_NEED_DATA"),
            Status::NoData => f.write_str("OCI_NO_DATA"),
            Status::Error => f.write_str("OCI_ERROR"),
            Status::InvalidHandle => f.write_str("OCI_INVALID_HANDLE"),
            Status::StillExecuting => f.write_str("OCI_STILL_EXECUTING"),
            Status::Continue => f.write_str("OCI_CONTINUE"),
            Status::Other(code) => write!(f, "OCI status {}", code),
        }
    }
}

/// Kinds of native handle the driver allocates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum HandleType {
    Environment,
    Error,
    Server,
    ServiceContext,
    Session,
}

impl HandleType {
    /// The `OCI_HTYPE_*` code
    pub fn code(self) -> u32 {
        match self {
            HandleType::Environment => htype::ENV,
            HandleType::Error => htype::ERROR,
            HandleType::Server => htype::SERVER,
            HandleType::ServiceContext => htype::SVCCTX,
            HandleType::Session => htype::SESSION,
        }
    }
}

impl fmt::Display for HandleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandleType::Environment => "environment",
            HandleType::Error => "error",
            HandleType::Server => "server",
            HandleType::ServiceContext => "service context",
            HandleType::Session => "user session",
        };
        f.write_str(name)
    }
}

/// Attributes set during logon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    /// Server handle of a service context
    Server,
    /// Session handle of a service context
    Session,
    /// Username of a session
    Username,
    /// Password of a session
    Password,
}

impl Attribute {
    /// The `OCI_ATTR_*` code
    pub fn code(self) -> u32 {
        match self {
            Attribute::Server => attr::SERVER,
            Attribute::Session => attr::SESSION,
            Attribute::Username => attr::USERNAME,
            Attribute::Password => attr::PASSWORD,
        }
    }
}

/// Value handed to `OCIAttrSet`
#[derive(Debug, Clone, Copy)]
pub enum AttrValue<'a> {
    /// Another handle (size 0)
    Handle(RawHandle),
    /// Text, passed with its byte length
    Text(&'a str),
}

/// How a session authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialType {
    /// Username and password (`OCI_CRED_RDBMS`)
    Rdbms,
    /// External identity (`OCI_CRED_EXT`)
    External,
}

impl CredentialType {
    /// The `OCI_CRED_*` code
    pub fn code(self) -> u32 {
        match self {
            CredentialType::Rdbms => credential::RDBMS,
            CredentialType::External => credential::EXT,
        }
    }
}

/// Diagnostic record read from an error handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// ORA- error number
    pub code: i32,
    /// Message text without the `ORA-NNNNN: ` prefix
    pub message: String,
}

impl Diagnostic {
    /// Build a diagnostic from the text `OCIErrorGet` writes, which repeats
    /// the error code as a prefix and ends with a newline.
    pub fn from_native(code: i32, text: &str) -> Self {
        let text = text.trim_end_matches(['\n', '\r', '\0']).trim();
        let message = match text.split_once(": ") {
            Some((prefix, rest)) if prefix.starts_with("ORA-") => rest,
            _ => text,
        };
        Diagnostic {
            code,
            message: message.to_string(),
        }
    }
}

/// The OCI primitives consumed by the driver.
///
/// Unless noted otherwise a call succeeds only on `OCI_SUCCESS`.
pub trait OciApi: Send + Sync {
    /// `OCIEnvCreate`. Succeeds on `OCI_SUCCESS` or `OCI_SUCCESS_WITH_INFO`.
    fn env_create(&self, mode: u32) -> Result<RawHandle, Status>;

    /// `OCIHandleAlloc` of a handle whose parent is the environment
    fn handle_alloc(&self, env: RawHandle, kind: HandleType) -> Result<RawHandle, Status>;

    /// `OCIHandleFree`
    fn handle_free(&self, handle: RawHandle, kind: HandleType) -> Result<(), Status>;

    /// `OCIServerAttach`. `None` attaches to the default database.
    fn server_attach(
        &self,
        server: RawHandle,
        error: RawHandle,
        dblink: Option<&str>,
    ) -> Result<(), Status>;

    /// `OCIServerDetach`
    fn server_detach(&self, server: RawHandle, error: RawHandle) -> Result<(), Status>;

    /// `OCIAttrSet`
    fn attr_set(
        &self,
        target: RawHandle,
        target_kind: HandleType,
        value: AttrValue<'_>,
        attribute: Attribute,
        error: RawHandle,
    ) -> Result<(), Status>;

    /// `OCISessionBegin`. Succeeds on `OCI_SUCCESS` or
    /// `OCI_SUCCESS_WITH_INFO` (e.g. a password about to expire).
    fn session_begin(
        &self,
        service: RawHandle,
        error: RawHandle,
        session: RawHandle,
        credential: CredentialType,
        mode: PrivilegedMode,
    ) -> Result<(), Status>;

    /// `OCISessionEnd`
    fn session_end(
        &self,
        service: RawHandle,
        error: RawHandle,
        session: RawHandle,
    ) -> Result<(), Status>;

    /// `OCILogon`, yielding a service context. Succeeds on `OCI_SUCCESS` or
    /// `OCI_SUCCESS_WITH_INFO`.
    fn logon(
        &self,
        env: RawHandle,
        error: RawHandle,
        username: &str,
        password: &str,
        dblink: &str,
    ) -> Result<RawHandle, Status>;

    /// `OCILogoff`, which also frees the service context
    fn logoff(&self, service: RawHandle, error: RawHandle) -> Result<(), Status>;

    /// `OCITransStart`
    fn trans_start(
        &self,
        service: RawHandle,
        error: RawHandle,
        timeout: u32,
        mode: TransactionMode,
    ) -> Result<(), Status>;

    /// `OCITransCommit`
    fn trans_commit(&self, service: RawHandle, error: RawHandle) -> Result<(), Status>;

    /// `OCITransRollback`
    fn trans_rollback(&self, service: RawHandle, error: RawHandle) -> Result<(), Status>;

    /// `OCIPing`
    fn ping(&self, service: RawHandle, error: RawHandle) -> Result<(), Status>;

    /// `OCIErrorGet` for the first record of an error handle
    fn error_get(&self, error: RawHandle) -> Option<Diagnostic>;
}
