/// Errors raised by the keyboard engine.
///
/// Platform failures carry the operation that failed and the platform error
/// code (an `HRESULT` on Windows).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{op} failed (0x{code:08X})")]
    HookInstall { op: &'static str, code: i32 },

    #[error("{op} failed (0x{code:08X})")]
    HookRemove { op: &'static str, code: i32 },

    #[error("a keyboard hook is already active on thread {thread_id}")]
    HookBusy { thread_id: u32 },

    #[error("{op} failed: {sent} of {expected} inputs accepted (0x{code:08X})")]
    Injection {
        op: &'static str,
        sent: u32,
        expected: u32,
        code: i32,
    },

    #[error("keyboard engine has been disposed")]
    Disposed,

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Platform error code, if the error came from the platform.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::HookInstall { code, .. }
            | Error::HookRemove { code, .. }
            | Error::Injection { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
