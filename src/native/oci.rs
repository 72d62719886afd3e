//! OCI client library loaded at runtime
//!
//! The symbols are resolved with `libloading` instead of being linked, so the
//! crate builds on machines without an Oracle client and the library location
//! can be chosen at runtime.

use std::ffi::{c_int, c_uint, c_void};
use std::path::{Path, PathBuf};
use std::ptr;

use libloading::Library;

use super::{
    AttrValue, Attribute, CredentialType, Diagnostic, HandleType, OciApi, RawHandle, Status,
};
use crate::config::{PrivilegedMode, TransactionMode};
use crate::constants::{htype, ERROR_MAXMSG_SIZE, OCI_DEFAULT};
use crate::error::{Error, Result};

/// Environment variable overriding the client library location
pub const LIBRARY_PATH_ENV: &str = "OCI_LIB_PATH";

/// Client library file name for this platform
#[cfg(target_os = "windows")]
const LIBRARY_NAME: &str = "oci.dll";
#[cfg(target_os = "macos")]
const LIBRARY_NAME: &str = "libclntsh.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIBRARY_NAME: &str = "libclntsh.so";

type EnvCreateFn = unsafe extern "C" fn(
    *mut *mut c_void,
    c_uint,
    *mut c_void,
    *const c_void,
    *const c_void,
    *const c_void,
    usize,
    *mut *mut c_void,
) -> c_int;
type HandleAllocFn =
    unsafe extern "C" fn(*const c_void, *mut *mut c_void, c_uint, usize, *mut *mut c_void) -> c_int;
type HandleFreeFn = unsafe extern "C" fn(*mut c_void, c_uint) -> c_int;
type ServerAttachFn =
    unsafe extern "C" fn(*mut c_void, *mut c_void, *const u8, c_int, c_uint) -> c_int;
type ServerDetachFn = unsafe extern "C" fn(*mut c_void, *mut c_void, c_uint) -> c_int;
type AttrSetFn =
    unsafe extern "C" fn(*mut c_void, c_uint, *mut c_void, c_uint, c_uint, *mut c_void) -> c_int;
type SessionBeginFn =
    unsafe extern "C" fn(*mut c_void, *mut c_void, *mut c_void, c_uint, c_uint) -> c_int;
type SessionEndFn = unsafe extern "C" fn(*mut c_void, *mut c_void, *mut c_void, c_uint) -> c_int;
type LogonFn = unsafe extern "C" fn(
    *mut c_void,
    *mut c_void,
    *mut *mut c_void,
    *const u8,
    c_uint,
    *const u8,
    c_uint,
    *const u8,
    c_uint,
) -> c_int;
type LogoffFn = unsafe extern "C" fn(*mut c_void, *mut c_void) -> c_int;
type TransStartFn = unsafe extern "C" fn(*mut c_void, *mut c_void, c_uint, c_uint) -> c_int;
type TransFn = unsafe extern "C" fn(*mut c_void, *mut c_void, c_uint) -> c_int;
type ErrorGetFn = unsafe extern "C" fn(
    *mut c_void,
    c_uint,
    *mut u8,
    *mut c_int,
    *mut u8,
    c_uint,
    c_uint,
) -> c_int;

/// The Oracle client library with its OCI entry points resolved.
///
/// # Example
///
/// ```rust,no_run
/// use oracle_oci::{Driver, OciLibrary};
///
/// # fn example() -> oracle_oci::Result<()> {
/// let library = OciLibrary::load_from("/opt/oracle/instantclient/libclntsh.so")?;
/// let driver = Driver::new(library);
/// let conn = driver.open("scott/tiger@dbhost:1521/ORCLPDB1")?;
/// # Ok(())
/// # }
/// ```
pub struct OciLibrary {
    path: PathBuf,
    env_create: EnvCreateFn,
    handle_alloc: HandleAllocFn,
    handle_free: HandleFreeFn,
    server_attach: ServerAttachFn,
    server_detach: ServerDetachFn,
    attr_set: AttrSetFn,
    session_begin: SessionBeginFn,
    session_end: SessionEndFn,
    logon: LogonFn,
    logoff: LogoffFn,
    trans_start: TransStartFn,
    trans_commit: TransFn,
    trans_rollback: TransFn,
    ping: TransFn,
    error_get: ErrorGetFn,
    // Keeps the function pointers above valid; must outlive them.
    _library: Library,
}

impl std::fmt::Debug for OciLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OciLibrary").field("path", &self.path).finish()
    }
}

impl OciLibrary {
    /// Load the client library from `OCI_LIB_PATH`, or by its platform name
    /// through the system loader search path.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(LIBRARY_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(LIBRARY_NAME));
        Self::load_from(path)
    }

    /// Load the client library from an explicit path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // SAFETY: loading the Oracle client runs its initializers, which have
        // no preconditions beyond being loaded once per path.
        let library =
            unsafe { Library::new(&path) }.map_err(|source| load_error(&path, source))?;

        // SAFETY: each symbol is cast to the prototype declared in oci.h.
        let resolved = unsafe {
            OciLibrary {
                env_create: symbol(&library, b"OCIEnvCreate\0", &path)?,
                handle_alloc: symbol(&library, b"OCIHandleAlloc\0", &path)?,
                handle_free: symbol(&library, b"OCIHandleFree\0", &path)?,
                server_attach: symbol(&library, b"OCIServerAttach\0", &path)?,
                server_detach: symbol(&library, b"OCIServerDetach\0", &path)?,
                attr_set: symbol(&library, b"OCIAttrSet\0", &path)?,
                session_begin: symbol(&library, b"OCISessionBegin\0", &path)?,
                session_end: symbol(&library, b"OCISessionEnd\0", &path)?,
                logon: symbol(&library, b"OCILogon\0", &path)?,
                logoff: symbol(&library, b"OCILogoff\0", &path)?,
                trans_start: symbol(&library, b"OCITransStart\0", &path)?,
                trans_commit: symbol(&library, b"OCITransCommit\0", &path)?,
                trans_rollback: symbol(&library, b"OCITransRollback\0", &path)?,
                ping: symbol(&library, b"OCIPing\0", &path)?,
                error_get: symbol(&library, b"OCIErrorGet\0", &path)?,
                path,
                _library: library,
            }
        };

        tracing::debug!(path = %resolved.path.display(), "OCI library loaded");
        Ok(resolved)
    }

    /// Path the library was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn discard_env(&self, env: RawHandle) {
        if let Err(status) = self.handle_free(env, HandleType::Environment) {
            tracing::warn!(%status, "failed to free environment of a failed create");
        }
    }
}

fn load_error(path: &Path, source: libloading::Error) -> Error {
    Error::LibraryLoad {
        path: path.display().to_string(),
        source,
    }
}

/// Resolve `name` and copy the function pointer out of the symbol.
///
/// # Safety
///
/// `T` must match the C prototype of the exported symbol.
unsafe fn symbol<T: Copy>(library: &Library, name: &[u8], path: &Path) -> Result<T> {
    library
        .get::<T>(name)
        .map(|sym| *sym)
        .map_err(|source| load_error(path, source))
}

fn check(rv: c_int) -> std::result::Result<(), Status> {
    match Status::from(rv) {
        Status::Success => Ok(()),
        other => Err(other),
    }
}

fn check_with_info(rv: c_int) -> std::result::Result<(), Status> {
    let status = Status::from(rv);
    if status == Status::SuccessWithInfo {
        tracing::debug!("OCI call returned OCI_SUCCESS_WITH_INFO");
    }
    if status.is_success_or_info() {
        Ok(())
    } else {
        Err(status)
    }
}

fn produced(handle: *mut c_void) -> std::result::Result<RawHandle, Status> {
    RawHandle::new(handle).ok_or(Status::InvalidHandle)
}

/// Outcome of `OCIEnvCreate`, plus the environment it handed back on failure.
/// Such an environment is owned by nobody and must be freed.
fn env_created(
    rv: c_int,
    env: *mut c_void,
) -> (std::result::Result<RawHandle, Status>, Option<RawHandle>) {
    match check_with_info(rv) {
        Ok(()) => (produced(env), None),
        Err(status) => (Err(status), RawHandle::new(env)),
    }
}

impl OciApi for OciLibrary {
    fn env_create(&self, mode: u32) -> std::result::Result<RawHandle, Status> {
        let mut env: *mut c_void = ptr::null_mut();
        // SAFETY: no memory callbacks and no user memory are requested.
        let rv = unsafe {
            (self.env_create)(
                &mut env,
                mode,
                ptr::null_mut(),
                ptr::null(),
                ptr::null(),
                ptr::null(),
                0,
                ptr::null_mut(),
            )
        };
        let (created, orphan) = env_created(rv, env);
        if let Some(orphan) = orphan {
            self.discard_env(orphan);
        }
        created
    }

    fn handle_alloc(
        &self,
        env: RawHandle,
        kind: HandleType,
    ) -> std::result::Result<RawHandle, Status> {
        let mut handle: *mut c_void = ptr::null_mut();
        // SAFETY: `env` is a live environment handle owned by the caller.
        let rv = unsafe {
            (self.handle_alloc)(env.as_ptr(), &mut handle, kind.code(), 0, ptr::null_mut())
        };
        check(rv)?;
        produced(handle)
    }

    fn handle_free(
        &self,
        handle: RawHandle,
        kind: HandleType,
    ) -> std::result::Result<(), Status> {
        // SAFETY: the caller releases each handle exactly once.
        check(unsafe { (self.handle_free)(handle.as_ptr(), kind.code()) })
    }

    fn server_attach(
        &self,
        server: RawHandle,
        error: RawHandle,
        dblink: Option<&str>,
    ) -> std::result::Result<(), Status> {
        let (link, len) = match dblink {
            Some(link) => (link.as_ptr(), link.len() as c_int),
            None => (ptr::null(), 0),
        };
        // SAFETY: `link` stays borrowed for the duration of the call.
        check(unsafe {
            (self.server_attach)(server.as_ptr(), error.as_ptr(), link, len, OCI_DEFAULT)
        })
    }

    fn server_detach(
        &self,
        server: RawHandle,
        error: RawHandle,
    ) -> std::result::Result<(), Status> {
        // SAFETY: `server` was attached by `server_attach`.
        check(unsafe { (self.server_detach)(server.as_ptr(), error.as_ptr(), OCI_DEFAULT) })
    }

    fn attr_set(
        &self,
        target: RawHandle,
        target_kind: HandleType,
        value: AttrValue<'_>,
        attribute: Attribute,
        error: RawHandle,
    ) -> std::result::Result<(), Status> {
        let (value, size) = match value {
            AttrValue::Handle(handle) => (handle.as_ptr(), 0),
            AttrValue::Text(text) => (text.as_ptr() as *mut c_void, text.len() as c_uint),
        };
        // SAFETY: OCI copies text attributes before returning and does not
        // write through the value pointer.
        check(unsafe {
            (self.attr_set)(
                target.as_ptr(),
                target_kind.code(),
                value,
                size,
                attribute.code(),
                error.as_ptr(),
            )
        })
    }

    fn session_begin(
        &self,
        service: RawHandle,
        error: RawHandle,
        session: RawHandle,
        credential: CredentialType,
        mode: PrivilegedMode,
    ) -> std::result::Result<(), Status> {
        // SAFETY: all three handles are live and owned by the caller.
        check_with_info(unsafe {
            (self.session_begin)(
                service.as_ptr(),
                error.as_ptr(),
                session.as_ptr(),
                credential.code(),
                mode.code(),
            )
        })
    }

    fn session_end(
        &self,
        service: RawHandle,
        error: RawHandle,
        session: RawHandle,
    ) -> std::result::Result<(), Status> {
        // SAFETY: the session was begun on this service context.
        check(unsafe {
            (self.session_end)(service.as_ptr(), error.as_ptr(), session.as_ptr(), OCI_DEFAULT)
        })
    }

    fn logon(
        &self,
        env: RawHandle,
        error: RawHandle,
        username: &str,
        password: &str,
        dblink: &str,
    ) -> std::result::Result<RawHandle, Status> {
        let mut service: *mut c_void = ptr::null_mut();
        // SAFETY: the strings are passed with explicit byte lengths and stay
        // borrowed for the duration of the call.
        let rv = unsafe {
            (self.logon)(
                env.as_ptr(),
                error.as_ptr(),
                &mut service,
                username.as_ptr(),
                username.len() as c_uint,
                password.as_ptr(),
                password.len() as c_uint,
                dblink.as_ptr(),
                dblink.len() as c_uint,
            )
        };
        check_with_info(rv)?;
        produced(service)
    }

    fn logoff(&self, service: RawHandle, error: RawHandle) -> std::result::Result<(), Status> {
        // SAFETY: `service` came from `logon`.
        check(unsafe { (self.logoff)(service.as_ptr(), error.as_ptr()) })
    }

    fn trans_start(
        &self,
        service: RawHandle,
        error: RawHandle,
        timeout: u32,
        mode: TransactionMode,
    ) -> std::result::Result<(), Status> {
        // SAFETY: live service context and error handle.
        check(unsafe {
            (self.trans_start)(service.as_ptr(), error.as_ptr(), timeout, mode.code())
        })
    }

    fn trans_commit(
        &self,
        service: RawHandle,
        error: RawHandle,
    ) -> std::result::Result<(), Status> {
        // SAFETY: live service context and error handle.
        check(unsafe { (self.trans_commit)(service.as_ptr(), error.as_ptr(), OCI_DEFAULT) })
    }

    fn trans_rollback(
        &self,
        service: RawHandle,
        error: RawHandle,
    ) -> std::result::Result<(), Status> {
        // SAFETY: live service context and error handle.
        check(unsafe { (self.trans_rollback)(service.as_ptr(), error.as_ptr(), OCI_DEFAULT) })
    }

    fn ping(&self, service: RawHandle, error: RawHandle) -> std::result::Result<(), Status> {
        // SAFETY: live service context and error handle.
        check(unsafe { (self.ping)(service.as_ptr(), error.as_ptr(), OCI_DEFAULT) })
    }

    fn error_get(&self, error: RawHandle) -> Option<Diagnostic> {
        let mut code: c_int = 0;
        let mut buf = vec![0u8; ERROR_MAXMSG_SIZE];
        // SAFETY: `buf` is writable for its full length.
        let rv = unsafe {
            (self.error_get)(
                error.as_ptr(),
                1,
                ptr::null_mut(),
                &mut code,
                buf.as_mut_ptr(),
                buf.len() as c_uint,
                htype::ERROR,
            )
        };
        if !Status::from(rv).is_success() {
            return None;
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Some(Diagnostic::from_native(code, &String::from_utf8_lossy(&buf[..end])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_library() {
        let err = OciLibrary::load_from("/nonexistent/libclntsh.so").unwrap_err();
        assert!(matches!(err, Error::LibraryLoad { .. }));
        assert!(err.to_string().contains("/nonexistent/libclntsh.so"));
    }

    #[test]
    fn test_check_statuses() {
        assert!(check(0).is_ok());
        assert_eq!(check(1), Err(Status::SuccessWithInfo));
        assert!(check_with_info(1).is_ok());
        assert_eq!(check_with_info(-1), Err(Status::Error));
    }

    #[test]
    fn test_failed_env_create_returns_orphan() {
        let env = RawHandle::from_token(0x40).unwrap();

        let (created, orphan) = env_created(-1, env.as_ptr());
        assert_eq!(created, Err(Status::Error));
        assert_eq!(orphan, Some(env));

        let (created, orphan) = env_created(-1, ptr::null_mut());
        assert_eq!(created, Err(Status::Error));
        assert_eq!(orphan, None);
    }

    #[test]
    fn test_successful_env_create_keeps_handle() {
        let env = RawHandle::from_token(0x40).unwrap();

        assert_eq!(env_created(0, env.as_ptr()), (Ok(env), None));
        assert_eq!(env_created(1, env.as_ptr()), (Ok(env), None));
        assert_eq!(
            env_created(0, ptr::null_mut()),
            (Err(Status::InvalidHandle), None)
        );
    }

    #[test]
    fn test_null_handle_is_invalid() {
        assert_eq!(produced(ptr::null_mut()), Err(Status::InvalidHandle));
    }
}
