use std::path::PathBuf;

/// Every way a run can end early.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("token file {} is missing or unreadable, check that it exists and holds a valid token", .path.display())]
    MissingCredentials { path: PathBuf },

    #[error("user verification failed: {0}")]
    KeyFetchFailed(String),

    #[error("no android device found ({0}), check the cable and that USB debugging is enabled")]
    NoDeviceFound(String),

    #[error("{} android devices attached ({}), pass the id of the device to use", .0.len(), .0.join(", "))]
    AmbiguousDevice(Vec<String>),

    #[error("device {serial} unreachable or test file missing: {reason}")]
    DeviceUnreachable { serial: String, reason: String },

    #[error("upload rejected: {0}")]
    UploadRejected(String),

    #[error("malformed server response: {0}")]
    MalformedServerResponse(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot read test scenario: {0}")]
    Prompt(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
