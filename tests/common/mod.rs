//! In-memory stand-in for the OCI client library.
//!
//! Records every call, tracks which resources are live, and fails any chosen
//! step on demand.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use oracle_oci::{
    AttrValue, Attribute, CredentialType, Diagnostic, Driver, HandleType, LogonProtocol, OciApi,
    PrivilegedMode, RawHandle, Status, TransactionMode,
};

/// A native call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    EnvCreate,
    Alloc(HandleType),
    Free(HandleType),
    Attach,
    Detach,
    AttrSet(Attribute),
    SessionBegin,
    SessionEnd,
    Logon,
    Logoff,
    TransStart,
    Commit,
    Rollback,
    Ping,
}

/// A resource as seen by acquisition and release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Handle(HandleType),
    Attachment,
    Session,
    Logon,
}

/// Calls observed by the fake, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Attach(Option<String>),
    AttrSet(Attribute, Option<String>),
    SessionBegin(CredentialType, PrivilegedMode),
    Logon {
        username: String,
        password: String,
        dblink: String,
    },
    TransStart(u32, TransactionMode),
    Commit,
    Rollback,
    Ping,
}

#[derive(Default)]
struct State {
    next_token: usize,
    live: HashMap<usize, HandleType>,
    issued: Vec<(HandleType, usize)>,
    attached: usize,
    sessions: usize,
    logons: usize,
    acquired: Vec<Resource>,
    released: Vec<Resource>,
    calls: Vec<Call>,
    fail: Vec<Step>,
    fail_status: Option<Status>,
    env_delay: Option<Duration>,
}

#[derive(Default)]
pub struct FakeOci {
    state: Mutex<State>,
}

pub const DIAGNOSTIC_CODE: i32 = 1017;
pub const DIAGNOSTIC_MESSAGE: &str = "invalid username/password; logon denied";

impl FakeOci {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Make `step` fail with `OCI_ERROR` every time it is called
    pub fn fail_at(&self, step: Step) {
        self.state().fail.push(step);
    }

    /// Status returned by failing steps instead of `OCI_ERROR`
    pub fn fail_with(&self, status: Status) {
        self.state().fail_status = Some(status);
    }

    /// Stop failing any step
    pub fn heal(&self) {
        self.state().fail.clear();
    }

    /// Sleep inside `env_create`
    pub fn delay_env_create(&self, delay: Duration) {
        self.state().env_delay = Some(delay);
    }

    /// Resources still held: live handles, attachments, sessions, logons
    pub fn outstanding(&self) -> usize {
        let state = self.state();
        state.live.len() + state.attached + state.sessions + state.logons
    }

    pub fn acquired(&self) -> Vec<Resource> {
        self.state().acquired.clone()
    }

    pub fn released(&self) -> Vec<Resource> {
        self.state().released.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Tokens of every handle of `kind` handed out, in order. Service
    /// contexts produced by `logon` are included.
    pub fn issued(&self, kind: HandleType) -> Vec<usize> {
        self.state()
            .issued
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, token)| *token)
            .collect()
    }

    pub fn driver(self: &Arc<Self>, protocol: LogonProtocol) -> Driver {
        let api: Arc<dyn OciApi> = self.clone();
        Driver::from_arc(api).with_protocol(protocol)
    }

    fn check(&self, step: Step) -> Result<(), Status> {
        let state = self.state();
        if state.fail.contains(&step) {
            Err(state.fail_status.unwrap_or(Status::Error))
        } else {
            Ok(())
        }
    }

    fn issue(state: &mut State, kind: HandleType) -> RawHandle {
        state.next_token += 0x10;
        let token = state.next_token;
        state.live.insert(token, kind);
        state.issued.push((kind, token));
        RawHandle::from_token(token).unwrap()
    }
}

impl OciApi for FakeOci {
    fn env_create(&self, _mode: u32) -> Result<RawHandle, Status> {
        let delay = self.state().env_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.check(Step::EnvCreate)?;
        let mut state = self.state();
        state.acquired.push(Resource::Handle(HandleType::Environment));
        Ok(Self::issue(&mut state, HandleType::Environment))
    }

    fn handle_alloc(&self, env: RawHandle, kind: HandleType) -> Result<RawHandle, Status> {
        self.check(Step::Alloc(kind))?;
        let mut state = self.state();
        if state.live.get(&env.token()) != Some(&HandleType::Environment) {
            return Err(Status::InvalidHandle);
        }
        state.acquired.push(Resource::Handle(kind));
        Ok(Self::issue(&mut state, kind))
    }

    fn handle_free(&self, handle: RawHandle, kind: HandleType) -> Result<(), Status> {
        self.check(Step::Free(kind))?;
        let mut state = self.state();
        match state.live.remove(&handle.token()) {
            Some(live_kind) if live_kind == kind => {
                state.released.push(Resource::Handle(kind));
                Ok(())
            }
            _ => Err(Status::InvalidHandle),
        }
    }

    fn server_attach(
        &self,
        _server: RawHandle,
        _error: RawHandle,
        dblink: Option<&str>,
    ) -> Result<(), Status> {
        self.state().calls.push(Call::Attach(dblink.map(str::to_string)));
        self.check(Step::Attach)?;
        let mut state = self.state();
        state.attached += 1;
        state.acquired.push(Resource::Attachment);
        Ok(())
    }

    fn server_detach(&self, _server: RawHandle, _error: RawHandle) -> Result<(), Status> {
        self.check(Step::Detach)?;
        let mut state = self.state();
        state.attached -= 1;
        state.released.push(Resource::Attachment);
        Ok(())
    }

    fn attr_set(
        &self,
        _target: RawHandle,
        _target_kind: HandleType,
        value: AttrValue<'_>,
        attribute: Attribute,
        _error: RawHandle,
    ) -> Result<(), Status> {
        let text = match value {
            AttrValue::Text(text) => Some(text.to_string()),
            AttrValue::Handle(_) => None,
        };
        self.state().calls.push(Call::AttrSet(attribute, text));
        self.check(Step::AttrSet(attribute))
    }

    fn session_begin(
        &self,
        _service: RawHandle,
        _error: RawHandle,
        _session: RawHandle,
        credential: CredentialType,
        mode: PrivilegedMode,
    ) -> Result<(), Status> {
        self.state().calls.push(Call::SessionBegin(credential, mode));
        self.check(Step::SessionBegin)?;
        let mut state = self.state();
        state.sessions += 1;
        state.acquired.push(Resource::Session);
        Ok(())
    }

    fn session_end(
        &self,
        _service: RawHandle,
        _error: RawHandle,
        _session: RawHandle,
    ) -> Result<(), Status> {
        self.check(Step::SessionEnd)?;
        let mut state = self.state();
        state.sessions -= 1;
        state.released.push(Resource::Session);
        Ok(())
    }

    fn logon(
        &self,
        _env: RawHandle,
        _error: RawHandle,
        username: &str,
        password: &str,
        dblink: &str,
    ) -> Result<RawHandle, Status> {
        self.state().calls.push(Call::Logon {
            username: username.to_string(),
            password: password.to_string(),
            dblink: dblink.to_string(),
        });
        self.check(Step::Logon)?;
        let mut state = self.state();
        state.logons += 1;
        state.acquired.push(Resource::Logon);
        state.next_token += 0x10;
        let token = state.next_token;
        state.issued.push((HandleType::ServiceContext, token));
        Ok(RawHandle::from_token(token).unwrap())
    }

    fn logoff(&self, _service: RawHandle, _error: RawHandle) -> Result<(), Status> {
        self.check(Step::Logoff)?;
        let mut state = self.state();
        state.logons -= 1;
        state.released.push(Resource::Logon);
        Ok(())
    }

    fn trans_start(
        &self,
        _service: RawHandle,
        _error: RawHandle,
        timeout: u32,
        mode: TransactionMode,
    ) -> Result<(), Status> {
        self.state().calls.push(Call::TransStart(timeout, mode));
        self.check(Step::TransStart)
    }

    fn trans_commit(&self, _service: RawHandle, _error: RawHandle) -> Result<(), Status> {
        self.state().calls.push(Call::Commit);
        self.check(Step::Commit)
    }

    fn trans_rollback(&self, _service: RawHandle, _error: RawHandle) -> Result<(), Status> {
        self.state().calls.push(Call::Rollback);
        self.check(Step::Rollback)
    }

    fn ping(&self, _service: RawHandle, _error: RawHandle) -> Result<(), Status> {
        self.state().calls.push(Call::Ping);
        self.check(Step::Ping)
    }

    fn error_get(&self, _error: RawHandle) -> Option<Diagnostic> {
        Some(Diagnostic::from_native(
            DIAGNOSTIC_CODE,
            &format!("ORA-{:05}: {}\n", DIAGNOSTIC_CODE, DIAGNOSTIC_MESSAGE),
        ))
    }
}
