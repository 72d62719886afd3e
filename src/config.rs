//! Connection configuration and connection string parsing
//!
//! A connection string has the form
//!
//! ```text
//! [oracle://][user[/password]@]host[:port][/service][?param=value&...]
//! ```
//!
//! Supported parameters:
//!
//! | Parameter | Values | Default |
//! |-----------|--------|---------|
//! | `loc` | IANA time zone name, `Local` | local time |
//! | `isolation` | `READONLY`, `SERIALIZABLE`, `DEFAULT` | read-write |
//! | `questionph` | `YES`, `NO`, `TRUE`, `FALSE` | `NO` |
//! | `prefetch_rows` | `u32` | 10 |
//! | `prefetch_memory` | `u32` | 0 |
//! | `as` | `SYSDBA`, `SYSASM`, `SYSOPER` (any case) | none |
//!
//! Leaving out username, password and host selects external authentication.

use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use indexmap::IndexMap;

use crate::constants::{
    auth_mode, trans, DEFAULT_PREFETCH_MEMORY, DEFAULT_PREFETCH_ROWS, OCI_DEFAULT,
};
use crate::error::{Error, Result};

/// Scheme prefix accepted (and stripped) in front of a connection string
pub const SCHEME: &str = "oracle://";

/// Time zone used to read and write DATE values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    /// The process's local time zone
    #[default]
    Local,
    /// A named IANA zone
    Zone(Tz),
}

impl Location {
    /// Resolve a `loc` value. An empty name means UTC.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "" => Some(Location::Zone(Tz::UTC)),
            "Local" => Some(Location::Local),
            other => other.parse::<Tz>().ok().map(Location::Zone),
        }
    }

    /// Name as accepted by [`Location::parse`]
    pub fn name(&self) -> &'static str {
        match self {
            Location::Local => "Local",
            Location::Zone(tz) => tz.name(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Isolation applied when a transaction begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Read-write (Oracle default)
    #[default]
    ReadWrite,
    /// Read-only transaction
    ReadOnly,
    /// Serializable transaction
    Serializable,
}

impl TransactionMode {
    /// The `OCI_TRANS_*` flag
    pub fn code(self) -> u32 {
        match self {
            TransactionMode::ReadWrite => trans::READWRITE,
            TransactionMode::ReadOnly => trans::READONLY,
            TransactionMode::Serializable => trans::SERIALIZABLE,
        }
    }

    fn param(self) -> &'static str {
        match self {
            TransactionMode::ReadWrite => "DEFAULT",
            TransactionMode::ReadOnly => "READONLY",
            TransactionMode::Serializable => "SERIALIZABLE",
        }
    }
}

/// Privileged connection mode requested when the session begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrivilegedMode {
    /// Ordinary session
    #[default]
    Default,
    /// SYSDBA
    SysDba,
    /// SYSASM
    SysAsm,
    /// SYSOPER
    SysOper,
}

impl PrivilegedMode {
    /// The mode flag passed to `OCISessionBegin`
    pub fn code(self) -> u32 {
        match self {
            PrivilegedMode::Default => OCI_DEFAULT,
            PrivilegedMode::SysDba => auth_mode::SYSDBA,
            PrivilegedMode::SysAsm => auth_mode::SYSASM,
            PrivilegedMode::SysOper => auth_mode::SYSOPER,
        }
    }

    fn param(self) -> Option<&'static str> {
        match self {
            PrivilegedMode::Default => None,
            PrivilegedMode::SysDba => Some("SYSDBA"),
            PrivilegedMode::SysAsm => Some("SYSASM"),
            PrivilegedMode::SysOper => Some("SYSOPER"),
        }
    }
}

/// Parsed connection string.
///
/// Immutable once built; obtain one with [`str::parse`] or [`Dsn::builder`].
///
/// # Examples
///
/// ```rust
/// use oracle_oci::{Dsn, TransactionMode};
///
/// let dsn: Dsn = "oracle://scott/tiger@dbhost:1521/ORCLPDB1?isolation=SERIALIZABLE"
///     .parse()
///     .unwrap();
/// assert_eq!(dsn.username(), "scott");
/// assert_eq!(dsn.connect(), "dbhost:1521/ORCLPDB1");
/// assert_eq!(dsn.transaction_mode(), TransactionMode::Serializable);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Dsn {
    username: String,
    password: String,
    connect: String,
    location: Location,
    transaction_mode: TransactionMode,
    question_mark_placeholders: bool,
    prefetch_rows: u32,
    prefetch_memory: u32,
    privileged_mode: PrivilegedMode,
    external_auth: bool,
}

impl Dsn {
    /// Parse a connection string
    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }

    /// Start building a `Dsn` without going through a string
    pub fn builder() -> DsnBuilder {
        DsnBuilder::default()
    }

    /// Username (empty for external authentication)
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// Connect string handed to the client library (`host[:port][/service]`)
    pub fn connect(&self) -> &str {
        &self.connect
    }

    /// Time zone for DATE values
    pub fn location(&self) -> Location {
        self.location
    }

    /// Isolation applied when a transaction begins
    pub fn transaction_mode(&self) -> TransactionMode {
        self.transaction_mode
    }

    /// Whether `?` placeholders are rewritten to `:1`, `:2`, ...
    pub fn question_mark_placeholders(&self) -> bool {
        self.question_mark_placeholders
    }

    /// Rows prefetched per round trip
    pub fn prefetch_rows(&self) -> u32 {
        self.prefetch_rows
    }

    /// Prefetch memory limit in bytes
    pub fn prefetch_memory(&self) -> u32 {
        self.prefetch_memory
    }

    /// Privileged mode requested at session begin
    pub fn privileged_mode(&self) -> PrivilegedMode {
        self.privileged_mode
    }

    /// True when username, password and connect string are all empty
    pub fn external_auth(&self) -> bool {
        self.external_auth
    }
}

impl Default for Dsn {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            connect: String::new(),
            location: Location::Local,
            transaction_mode: TransactionMode::ReadWrite,
            question_mark_placeholders: false,
            prefetch_rows: DEFAULT_PREFETCH_ROWS,
            prefetch_memory: DEFAULT_PREFETCH_MEMORY,
            privileged_mode: PrivilegedMode::Default,
            external_auth: true,
        }
    }
}

impl fmt::Debug for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dsn")
            .field("username", &self.username)
            .field("password", &"***")
            .field("connect", &self.connect)
            .field("location", &self.location)
            .field("transaction_mode", &self.transaction_mode)
            .field("question_mark_placeholders", &self.question_mark_placeholders)
            .field("prefetch_rows", &self.prefetch_rows)
            .field("prefetch_memory", &self.prefetch_memory)
            .field("privileged_mode", &self.privileged_mode)
            .field("external_auth", &self.external_auth)
            .finish()
    }
}

impl FromStr for Dsn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidConnectionString("empty dsn".to_string()));
        }

        let s = s.strip_prefix(SCHEME).unwrap_or(s);

        let mut dsn = Dsn::default();

        let (authority, rest) = split_right(s, '@');
        if !authority.is_empty() {
            let (username, password) = parse_authority(authority)?;
            dsn.username = username;
            dsn.password = password;
        }

        let (host, params) = split_left_of_last(rest, '?');
        dsn.connect = unescape_host(host)?;

        for (key, values) in parse_query(params) {
            let Some(value) = values.first().map(String::as_str) else {
                continue;
            };
            match key.as_str() {
                "loc" => {
                    dsn.location =
                        Location::parse(value).ok_or_else(|| Error::invalid("loc", value))?;
                }
                "isolation" => {
                    dsn.transaction_mode = match value {
                        "READONLY" => TransactionMode::ReadOnly,
                        "SERIALIZABLE" => TransactionMode::Serializable,
                        "DEFAULT" => TransactionMode::ReadWrite,
                        _ => return Err(Error::invalid("isolation", value)),
                    };
                }
                "questionph" => {
                    dsn.question_mark_placeholders = match value {
                        "YES" | "TRUE" => true,
                        "NO" | "FALSE" => false,
                        _ => return Err(Error::invalid("questionph", value)),
                    };
                }
                "prefetch_rows" => {
                    dsn.prefetch_rows = parse_unsigned("prefetch_rows", value)?;
                }
                "prefetch_memory" => {
                    dsn.prefetch_memory = parse_unsigned("prefetch_memory", value)?;
                }
                "as" => {
                    dsn.privileged_mode = match value.to_ascii_uppercase().as_str() {
                        "SYSDBA" => PrivilegedMode::SysDba,
                        "SYSASM" => PrivilegedMode::SysAsm,
                        "SYSOPER" => PrivilegedMode::SysOper,
                        _ => return Err(Error::invalid("as", value)),
                    };
                }
                _ => {}
            }
        }

        dsn.external_auth =
            dsn.username.is_empty() && dsn.password.is_empty() && dsn.connect.is_empty();
        Ok(dsn)
    }
}

/// Serializes back to a connection string that parses to an equal `Dsn`.
///
/// The password is written out (percent-encoded); use `Debug` for logging.
impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SCHEME)?;
        if !self.username.is_empty() || !self.password.is_empty() {
            write!(f, "{}", urlencoding::encode(&self.username))?;
            if !self.password.is_empty() {
                write!(f, "/{}", urlencoding::encode(&self.password))?;
            }
            f.write_str("@")?;
        }
        f.write_str(&self.connect.replace('%', "%25"))?;

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if self.location != Location::Local {
            query.append_pair("loc", self.location.name());
        }
        if self.transaction_mode != TransactionMode::ReadWrite {
            query.append_pair("isolation", self.transaction_mode.param());
        }
        if self.question_mark_placeholders {
            query.append_pair("questionph", "YES");
        }
        if self.prefetch_rows != DEFAULT_PREFETCH_ROWS {
            query.append_pair("prefetch_rows", &self.prefetch_rows.to_string());
        }
        if self.prefetch_memory != DEFAULT_PREFETCH_MEMORY {
            query.append_pair("prefetch_memory", &self.prefetch_memory.to_string());
        }
        if let Some(mode) = self.privileged_mode.param() {
            query.append_pair("as", mode);
        }
        let query = query.finish();
        // The parser splits at the last `?`, so a connect string holding one
        // needs the separator even without parameters.
        if !query.is_empty() || self.connect.contains('?') {
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

/// Builder for [`Dsn`]
#[derive(Debug, Clone, Default)]
pub struct DsnBuilder {
    dsn: Dsn,
}

impl DsnBuilder {
    /// Set the username
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.dsn.username = username.into();
        self
    }

    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.dsn.password = password.into();
        self
    }

    /// Set the connect string (`host[:port][/service]`)
    pub fn connect(mut self, connect: impl Into<String>) -> Self {
        self.dsn.connect = connect.into();
        self
    }

    /// Set the time zone for DATE values
    pub fn location(mut self, location: Location) -> Self {
        self.dsn.location = location;
        self
    }

    /// Set the transaction isolation
    pub fn transaction_mode(mut self, mode: TransactionMode) -> Self {
        self.dsn.transaction_mode = mode;
        self
    }

    /// Enable rewriting of `?` placeholders
    pub fn question_mark_placeholders(mut self, enabled: bool) -> Self {
        self.dsn.question_mark_placeholders = enabled;
        self
    }

    /// Set the number of prefetched rows
    pub fn prefetch_rows(mut self, rows: u32) -> Self {
        self.dsn.prefetch_rows = rows;
        self
    }

    /// Set the prefetch memory limit
    pub fn prefetch_memory(mut self, bytes: u32) -> Self {
        self.dsn.prefetch_memory = bytes;
        self
    }

    /// Request a privileged session
    pub fn privileged_mode(mut self, mode: PrivilegedMode) -> Self {
        self.dsn.privileged_mode = mode;
        self
    }

    /// Finish the `Dsn`, deriving the external authentication flag.
    ///
    /// Fails when the connect string could not be written out and parsed
    /// back: it must not contain `@`, whitespace, or control characters.
    pub fn build(self) -> Result<Dsn> {
        let mut dsn = self.dsn;
        check_connect(&dsn.connect)?;
        dsn.external_auth =
            dsn.username.is_empty() && dsn.password.is_empty() && dsn.connect.is_empty();
        Ok(dsn)
    }
}

/// Split at the last `sep`. Without `sep` the whole string is the right part.
fn split_right(s: &str, sep: char) -> (&str, &str) {
    match s.rfind(sep) {
        Some(i) => (&s[..i], &s[i + sep.len_utf8()..]),
        None => ("", s),
    }
}

/// Split at the last `sep`. Without `sep` the whole string is the left part.
fn split_left_of_last(s: &str, sep: char) -> (&str, &str) {
    match s.rfind(sep) {
        Some(i) => (&s[..i], &s[i + sep.len_utf8()..]),
        None => (s, ""),
    }
}

/// Decimal digits only; `u32::from_str` alone would accept a leading `+`.
fn parse_unsigned(name: &'static str, value: &str) -> Result<u32> {
    if !value.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(Error::invalid(name, value));
    }
    value.parse().map_err(|_| Error::invalid(name, value))
}

/// Connect strings the parser can never produce
fn check_connect(connect: &str) -> Result<()> {
    match connect
        .chars()
        .find(|c| *c == '@' || c.is_ascii_whitespace() || c.is_ascii_control())
    {
        Some(c) => Err(Error::InvalidConnectionString(format!(
            "invalid character {:?} in host",
            c
        ))),
        None => Ok(()),
    }
}

fn parse_authority(authority: &str) -> Result<(String, String)> {
    let (username, password) = match authority.rfind('/') {
        Some(i) => (&authority[..i], &authority[i + 1..]),
        None => (authority, ""),
    };
    Ok((
        decode_component(username, "username")?,
        decode_component(password, "password")?,
    ))
}

fn decode_component(s: &str, what: &str) -> Result<String> {
    check_escapes(s, what)?;
    urlencoding::decode(s)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| Error::InvalidConnectionString(format!("invalid {}: {}", what, e)))
}

/// Every `%` must start a two-digit hex escape.
fn check_escapes(s: &str, what: &str) -> Result<()> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            match escape {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => {
                    let end = (i + 3).min(bytes.len());
                    return Err(Error::InvalidConnectionString(format!(
                        "invalid escape {:?} in {}",
                        String::from_utf8_lossy(&bytes[i..end]),
                        what
                    )));
                }
            }
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Host-safe decoding: escapes may only encode `%` itself or non-ASCII
/// bytes, and raw whitespace or control characters are rejected.
fn unescape_host(host: &str) -> Result<String> {
    check_escapes(host, "host")?;
    let bytes = host.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let escape = &host[i..i + 3];
                let decoded = u8::from_str_radix(&escape[1..], 16).map_err(|_| {
                    Error::InvalidConnectionString(format!("invalid escape {:?} in host", escape))
                })?;
                if decoded < 0x80 && decoded != b'%' {
                    return Err(Error::InvalidConnectionString(format!(
                        "invalid escape {:?} in host",
                        escape
                    )));
                }
                i += 3;
            }
            b if b.is_ascii_whitespace() || b.is_ascii_control() => {
                return Err(Error::InvalidConnectionString(format!(
                    "invalid character {:?} in host",
                    b as char
                )));
            }
            _ => i += 1,
        }
    }
    urlencoding::decode(host)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| Error::InvalidConnectionString(format!("invalid host: {}", e)))
}

/// Form-decode a query string into name -> values, keeping first-seen order.
fn parse_query(query: &str) -> IndexMap<String, Vec<String>> {
    let mut params: IndexMap<String, Vec<String>> = IndexMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    params
}
