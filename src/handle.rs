//! Ownership stack for native resources
//!
//! Every resource acquired while opening a connection is pushed onto a
//! [`ResourceStack`]. Dropping the stack releases the resources in reverse
//! order of acquisition, so an early return with `?` at any step of the logon
//! unwinds exactly what had been acquired up to that point.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::native::{HandleType, OciApi, RawHandle, Status};

/// A native resource owned by a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resource {
    /// An allocated handle, freed with `OCIHandleFree`
    Handle { handle: RawHandle, kind: HandleType },
    /// A server handle attached to a database, detached on release
    Attachment { server: RawHandle, error: RawHandle },
    /// A begun user session, ended on release
    Session {
        service: RawHandle,
        error: RawHandle,
        session: RawHandle,
    },
    /// A service context produced by `OCILogon`, logged off on release
    Logon { service: RawHandle, error: RawHandle },
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Handle { kind, .. } => write!(f, "{} handle", kind),
            Resource::Attachment { .. } => f.write_str("server attachment"),
            Resource::Session { .. } => f.write_str("user session"),
            Resource::Logon { .. } => f.write_str("logon"),
        }
    }
}

/// Resources held by one connection, released last-in first-out
pub(crate) struct ResourceStack {
    api: Arc<dyn OciApi>,
    resources: Vec<Resource>,
}

impl ResourceStack {
    pub(crate) fn new(api: Arc<dyn OciApi>) -> Self {
        Self {
            api,
            resources: Vec::with_capacity(8),
        }
    }

    pub(crate) fn push(&mut self, resource: Resource) {
        tracing::trace!(%resource, depth = self.resources.len() + 1, "resource acquired");
        self.resources.push(resource);
    }

    /// Allocate a handle under `env` and take ownership of it
    pub(crate) fn alloc(&mut self, env: RawHandle, kind: HandleType) -> Result<RawHandle> {
        let handle = self.api.handle_alloc(env, kind).map_err(|status| {
            tracing::debug!(%kind, %status, "handle allocation failed");
            Error::HandleAlloc(kind)
        })?;
        self.push(Resource::Handle { handle, kind });
        Ok(handle)
    }

    pub(crate) fn len(&self) -> usize {
        self.resources.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Release everything, newest first. Every resource is released even if
    /// an earlier release fails; the first failure is returned.
    pub(crate) fn release_all(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(resource) = self.resources.pop() {
            if let Err(e) = self.release(resource) {
                tracing::warn!(%resource, error = %e, "failed to release resource");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn release(&self, resource: Resource) -> Result<()> {
        tracing::trace!(%resource, "releasing resource");
        match resource {
            Resource::Handle { handle, kind } => self
                .api
                .handle_free(handle, kind)
                .map_err(Error::Native),
            Resource::Attachment { server, error } => self
                .api
                .server_detach(server, error)
                .map_err(|status| native_error(self.api.as_ref(), error, status)),
            Resource::Session {
                service,
                error,
                session,
            } => self
                .api
                .session_end(service, error, session)
                .map_err(|status| native_error(self.api.as_ref(), error, status)),
            Resource::Logon { service, error } => self
                .api
                .logoff(service, error)
                .map_err(|status| native_error(self.api.as_ref(), error, status)),
        }
    }
}

impl Drop for ResourceStack {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        // Failures are already logged per resource
        let _ = self.release_all();
    }
}

/// Turn a failed status into an error, reading the diagnostic record from
/// the error handle when the status says there is one.
pub(crate) fn native_error(api: &dyn OciApi, error: RawHandle, status: Status) -> Error {
    match status {
        Status::Error => match api.error_get(error) {
            Some(diag) => Error::oracle(diag.code, diag.message),
            None => Error::Native(status),
        },
        other => Error::Native(other),
    }
}
