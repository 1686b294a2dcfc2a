/// Core error type for the fences bot.
///
/// Adapter crates should map their specific errors into this type so the
/// dialogue engines can handle failures consistently (re-prompt vs abort).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    #[error("label already taken: {0}")]
    DuplicateLabel(String),

    #[error("alias already used on this board: {0}")]
    DuplicateAlias(String),

    #[error("no such member: {0}")]
    MemberNotFound(String),

    #[error("alias is {got} bytes, limit is {limit}")]
    AliasTooLong { got: usize, limit: usize },

    #[error("alias contains characters that cannot be used")]
    InvalidCharacters,

    #[error("timestamp does not match pattern {pattern}: {input}")]
    InvalidTimestamp { input: String, pattern: String },

    #[error("message has no content")]
    EmptyMessage,

    #[error("text input required")]
    NonTextInput,

    #[error("admin rights required")]
    PermissionDenied,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Recovery class of an error, as seen by the dialogue engines.
///
/// `Validation` and `Conflict` re-prompt the same state, `NotFound` aborts
/// the current sub-flow to the nearest menu, `Store` clears the session and
/// surfaces a generic failure, `Permission` short-circuits with no state
/// change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Conflict,
    NotFound,
    Store,
    Permission,
    Internal,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::AliasTooLong { .. }
            | Error::InvalidCharacters
            | Error::InvalidTimestamp { .. }
            | Error::EmptyMessage
            | Error::NonTextInput => ErrorClass::Validation,
            Error::DuplicateUsername(_) | Error::DuplicateLabel(_) | Error::DuplicateAlias(_) => {
                ErrorClass::Conflict
            }
            Error::MemberNotFound(_) => ErrorClass::NotFound,
            Error::Store(_) | Error::Io(_) | Error::Json(_) => ErrorClass::Store,
            Error::PermissionDenied => ErrorClass::Permission,
            Error::Config(_) | Error::Delivery(_) => ErrorClass::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
