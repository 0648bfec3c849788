//! BBC-visible error taxonomy (RFC-free: these codes come from the BBC MOS
//! filing system error conventions, not a network protocol standard).

use std::fmt;
use std::io;

/// Convenient result alias used by filing-system and dispatcher code.
pub type BbcResult<T> = Result<T, BbcError>;

/// Errors a filing-system operation can raise, each mapping to a BBC error
/// number and string that the dispatcher encodes into an `ERROR` response
/// (`BRK, code, message, BRK`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BbcError {
    /// Invalid characters, length, or parse failure in a name/path.
    BadName,
    /// Directory component of a path is structurally invalid for the FS type.
    BadDir,
    /// Drive component of a path is structurally invalid for the FS type.
    BadDrive,
    /// An attribute string could not be parsed for the FS type.
    BadAttribute,
    /// A wildcard matched more than one object where exactly one was required.
    AmbiguousName,
    /// The target object does not exist.
    FileNotFound,
    /// Creating the target would silently overwrite an existing object.
    Exists,
    /// Like [`BbcError::Exists`], but specifically because both a host file
    /// and its `.inf` sidecar must be absent (see `mustNotExist`).
    ExistsOnServer,
    /// The requested open would violate the single-writer invariant.
    Open,
    /// The object has the `L` (locked) attribute set.
    Locked,
    /// A write was attempted against a read-only file or object.
    ReadOnly,
    /// A write was attempted against a read-only volume.
    VolumeReadOnly,
    /// The object (or write) exceeds the 24-bit BBC size limit.
    TooBig,
    /// The supplied file handle is not open, or out of the configured range.
    Channel,
    /// A sticky-EOF condition was hit on a second `OSBGET` past end of file.
    Eof,
    /// A write-only operation was attempted on a handle opened for read only.
    NotOpenForUpdate,
    /// Aggregate of multiple errors raised while closing all open files.
    DataLost,
    /// No current volume is selected for the session (`"No volume"`).
    DiscFault(String),
    /// `OSFILE` LOAD was requested of a file marked not-to-load.
    Wont,
    /// The target of `*RUN` could not be found.
    BadCommand,
    /// The FS type does not implement the requested operation.
    NotSupported,
    /// Too many files are open for this session's configured handle range.
    TooManyOpen,
    /// A byte-pointer seek would land outside the file (read handles only).
    OutsideFile,
}

impl BbcError {
    /// BBC MOS error number carried in the wire `ERROR` response.
    pub fn code(&self) -> u8 {
        match self {
            BbcError::BadName => 0xCC,
            BbcError::BadDir => 0xCE,
            BbcError::BadDrive => 0xCF,
            BbcError::BadAttribute => 0xBD,
            BbcError::AmbiguousName => 0xAF,
            BbcError::FileNotFound => 0xD6,
            BbcError::Exists | BbcError::ExistsOnServer => 0xC4,
            BbcError::Open => 0xC2,
            BbcError::Locked => 0xC3,
            BbcError::ReadOnly | BbcError::VolumeReadOnly => 0xC1,
            BbcError::TooBig => 0xB0,
            BbcError::Channel => 0xDE,
            BbcError::Eof => 0xDF,
            BbcError::NotOpenForUpdate => 0xC1,
            BbcError::DataLost => 0xCA,
            BbcError::DiscFault(_) => 0xFF,
            BbcError::Wont => 0x93,
            BbcError::BadCommand => 0xFE,
            BbcError::NotSupported => 0xFF,
            BbcError::TooManyOpen => 0xC0,
            BbcError::OutsideFile => 0xB6,
        }
    }

    /// BBC-visible error string, truncated by callers to fit wire limits.
    pub fn message(&self) -> String {
        match self {
            BbcError::BadName => "Bad name".to_owned(),
            BbcError::BadDir => "Bad dir".to_owned(),
            BbcError::BadDrive => "Bad drive".to_owned(),
            BbcError::BadAttribute => "Bad attribute".to_owned(),
            BbcError::AmbiguousName => "Ambiguous name".to_owned(),
            BbcError::FileNotFound => "File not found".to_owned(),
            BbcError::Exists | BbcError::ExistsOnServer => "Already exists".to_owned(),
            BbcError::Open => "Open".to_owned(),
            BbcError::Locked => "Locked".to_owned(),
            BbcError::ReadOnly => "Read only".to_owned(),
            BbcError::VolumeReadOnly => "Volume read only".to_owned(),
            BbcError::TooBig => "Too big".to_owned(),
            BbcError::Channel => "Channel".to_owned(),
            BbcError::Eof => "EOF".to_owned(),
            BbcError::NotOpenForUpdate => "Not open for update".to_owned(),
            BbcError::DataLost => "Data lost".to_owned(),
            BbcError::DiscFault(detail) => format!("Disc fault: {detail}"),
            BbcError::Wont => "Won't".to_owned(),
            BbcError::BadCommand => "Bad command".to_owned(),
            BbcError::NotSupported => "Not supported".to_owned(),
            BbcError::TooManyOpen => "Too many open files".to_owned(),
            BbcError::OutsideFile => "Outside file".to_owned(),
        }
    }

    /// Convenience constructor for the "no current volume" disc fault.
    pub fn no_volume() -> Self {
        BbcError::DiscFault("No volume".to_owned())
    }
}

impl fmt::Display for BbcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for BbcError {}

/// Translates a host I/O error into the closest BBC error kind (§7).
impl From<io::Error> for BbcError {
    fn from(err: io::Error) -> Self {
        use io::ErrorKind::*;
        match err.kind() {
            NotFound => BbcError::FileNotFound,
            AlreadyExists => BbcError::Exists,
            PermissionDenied => BbcError::DiscFault(format!("POSIX error: EACCES ({err})")),
            _ => BbcError::DiscFault(format!("POSIX error: {err}")),
        }
    }
}
