//! OCI constants
//!
//! Values from the Oracle Call Interface headers (`oci.h`, `ocidfn.h`) for
//! the calls this driver makes.

// =============================================================================
// Return Codes
// =============================================================================

/// Return codes of OCI calls (`sword`)
#[allow(missing_docs)]
pub mod status {
    pub const SUCCESS: i32 = 0;
    pub const SUCCESS_WITH_INFO: i32 = 1;
    pub const NEED_DATA: i32 = 99;
    pub const NO_DATA: i32 = 100;
    pub const ERROR: i32 = -1;
    pub const INVALID_HANDLE: i32 = -2;
    pub const STILL_EXECUTING: i32 = -3123;
    pub const CONTINUE: i32 = -24200;
}

// =============================================================================
// Modes
// =============================================================================

/// Default mode for most calls
pub const OCI_DEFAULT: u32 = 0x0000_0000;

/// Environment is used from multiple threads
pub const OCI_THREADED: u32 = 0x0000_0001;

/// Environment mode used for every connection
pub const ENV_MODE: u32 = OCI_DEFAULT | OCI_THREADED;

/// Privileged connection modes passed to `OCISessionBegin`
#[allow(missing_docs)]
pub mod auth_mode {
    pub const SYSDBA: u32 = 0x0000_0002;
    pub const SYSOPER: u32 = 0x0000_0004;
    pub const SYSASM: u32 = 0x0000_8000;
}

/// Credential types passed to `OCISessionBegin`
#[allow(missing_docs)]
pub mod credential {
    pub const RDBMS: u32 = 1;
    pub const EXT: u32 = 2;
}

/// Transaction flags passed to `OCITransStart`
#[allow(missing_docs)]
pub mod trans {
    pub const READONLY: u32 = 0x0000_0100;
    pub const READWRITE: u32 = 0x0000_0200;
    pub const SERIALIZABLE: u32 = 0x0000_0400;
}

// =============================================================================
// Handle Types
// =============================================================================

/// Handle type codes (`OCI_HTYPE_*`)
#[allow(missing_docs)]
pub mod htype {
    pub const ENV: u32 = 1;
    pub const ERROR: u32 = 2;
    pub const SVCCTX: u32 = 3;
    pub const SERVER: u32 = 8;
    pub const SESSION: u32 = 9;
}

// =============================================================================
// Attributes
// =============================================================================

/// Attribute codes (`OCI_ATTR_*`)
#[allow(missing_docs)]
pub mod attr {
    pub const SERVER: u32 = 6;
    pub const SESSION: u32 = 7;
    pub const USERNAME: u32 = 22;
    pub const PASSWORD: u32 = 23;
}

// =============================================================================
// Limits
// =============================================================================

/// Size of the buffer handed to `OCIErrorGet`
pub const ERROR_MAXMSG_SIZE: usize = 3072;

/// Default number of rows prefetched per round trip
pub const DEFAULT_PREFETCH_ROWS: u32 = 10;

/// Default prefetch memory (0 = limited by rows only)
pub const DEFAULT_PREFETCH_MEMORY: u32 = 0;

/// Timeout in seconds passed to `OCITransStart`
pub const TRANS_START_TIMEOUT: u32 = 0;
