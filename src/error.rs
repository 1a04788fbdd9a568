//! Error taxonomy.
//!
//! Every fallible call returns `Result<T, Error>`; there is no ambient
//! last-error state. Parse errors abort the file or response being
//! parsed - callers can always distinguish "empty because nothing
//! matched" from "empty because parsing failed partway".

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Requested library, pool, map or volume does not exist in the
    /// current configuration or catalog.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input to a parser or API call. Carries the offending
    /// line or parameter for diagnostics.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Key collision on a table that requires unique keys.
    #[error("duplicate key '{0}'")]
    DuplicateKey(String),

    /// VSN fails the label legality rules of its media class.
    #[error("invalid VSN label '{vsn}' for media type '{media_type}'")]
    InvalidVsn { media_type: String, vsn: String },

    /// Vendor media type string has no mapping to a SAM media type.
    /// Unlike the benign "unknown device" classification sentinel this
    /// is a hard error: a cartridge without capacity accounting is a
    /// caller visible problem.
    #[error("cannot map media type '{0}' to a SAM media type")]
    MediaMapFailed(String),

    /// Device open failed irrecoverably (still busy after the
    /// reconfigure retry, or access denied).
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// ACSLS response sequence/version/status mismatch, or a malformed
    /// wire format row.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// Response wait exceeded the bound.
    #[error("timeout waiting for {0}")]
    Timeout(String),

    /// The SSI subprocess could not be launched.
    #[error("could not start ACSLS client daemon: {0}")]
    DaemonStartFailed(String),

    /// The underlying catalog source could not be read.
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Query type defined in the request table but with no response
    /// parser (CELL, LOCK).
    #[error("query '{0}' is not supported")]
    UnsupportedQuery(&'static str),
}
