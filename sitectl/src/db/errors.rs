use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

/// Unified error type for database operations that application code can handle.
///
/// Every failure that crosses the repository boundary is one of these kinds;
/// the raw driver error never leaks. The original cause is kept on the chain
/// for logging and is stripped by [`DbError::render`] under
/// [`ErrorExposure::Redacted`].
#[derive(Error, Debug)]
pub enum DbError {
    /// A filter that was required to match a document matched nothing
    #[error("no document matched in '{collection}' (filter: {filter})")]
    NotFound { collection: String, filter: String },

    /// Unique index violation
    #[error("duplicate value for '{field}' in '{collection}'")]
    Duplicate {
        collection: String,
        /// The indexed field, or "unknown" if extraction failed
        field: String,
        /// The conflicting value, or "unknown" if extraction failed
        value: String,
    },

    /// The server could not be reached (server selection, DNS, I/O, pool cleared)
    #[error("database unavailable: {message}")]
    Connection { message: String },

    /// Invalid input: malformed migration names, duplicate registry versions, etc.
    #[error("{message}")]
    Validation { message: String },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Discriminant of [`DbError`], the surface API-boundary mappers consume
/// (NotFound → 404, Duplicate → 409, Connection → 503, Validation → 400,
/// Other → 500).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    NotFound,
    Duplicate,
    Connection,
    Validation,
    Other,
}

/// How much error detail may cross the boundary to an external caller.
///
/// This is an explicit policy value handed to the formatting boundary rather
/// than a global flag; [`crate::config::Environment`] picks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorExposure {
    /// Full cause chain, for non-production surfaces and logs
    Full,
    /// Stable kind-level message only
    Redacted,
}

impl DbError {
    pub fn kind(&self) -> DbErrorKind {
        match self {
            DbError::NotFound { .. } => DbErrorKind::NotFound,
            DbError::Duplicate { .. } => DbErrorKind::Duplicate,
            DbError::Connection { .. } => DbErrorKind::Connection,
            DbError::Validation { .. } => DbErrorKind::Validation,
            DbError::Other(_) => DbErrorKind::Other,
        }
    }

    /// Format this error for an external surface under the given policy.
    ///
    /// `Redacted` returns a stable message per kind (validation and duplicate
    /// messages are user-facing and kept); `Full` walks the whole source chain.
    pub fn render(&self, exposure: ErrorExposure) -> String {
        match exposure {
            ErrorExposure::Full => {
                let mut message = self.to_string();
                let mut source = std::error::Error::source(self);
                while let Some(cause) = source {
                    message = format!("{message}: {cause}");
                    source = cause.source();
                }
                message
            }
            ErrorExposure::Redacted => match self {
                DbError::NotFound { .. } => "resource not found".to_string(),
                DbError::Duplicate { field, .. } => format!("a record with this '{field}' already exists"),
                DbError::Connection { .. } => "database unavailable".to_string(),
                DbError::Validation { message } => message.clone(),
                DbError::Other(_) => "internal error".to_string(),
            },
        }
    }

    /// Translate a driver error, attaching the collection it came from.
    ///
    /// This is the single classification boundary: duplicate-key signals
    /// (server code 11000) become [`DbError::Duplicate`] with best-effort
    /// field/value extraction, connectivity failures become
    /// [`DbError::Connection`], everything else is wrapped as
    /// [`DbError::Other`] with the driver error retained as the cause.
    pub fn from_driver(err: mongodb::error::Error, collection: &str) -> Self {
        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY_CODE => {
                let (field, value) = write_error
                    .details
                    .as_ref()
                    .and_then(extract_key_value)
                    .unwrap_or_else(|| parse_duplicate_message(&write_error.message));
                DbError::Duplicate {
                    collection: collection.to_string(),
                    field,
                    value,
                }
            }
            ErrorKind::Command(command_error) if command_error.code == DUPLICATE_KEY_CODE => {
                let (field, value) = parse_duplicate_message(&command_error.message);
                DbError::Duplicate {
                    collection: collection.to_string(),
                    field,
                    value,
                }
            }
            ErrorKind::ServerSelection { message, .. }
            | ErrorKind::DnsResolve { message, .. }
            | ErrorKind::ConnectionPoolCleared { message, .. } => DbError::Connection { message: message.clone() },
            ErrorKind::Io(io_error) => DbError::Connection {
                message: io_error.to_string(),
            },
            // All other driver errors are non-recoverable - keep the cause chain
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// MongoDB server error code for unique index violations
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Pull the offending field and value out of a write error's `keyValue`
/// payload (available on modern servers).
fn extract_key_value(details: &mongodb::bson::Document) -> Option<(String, String)> {
    let key_value = details.get_document("keyValue").ok()?;
    let (field, value) = key_value.iter().next()?;
    Some((field.to_string(), bson_to_plain_string(value)))
}

/// Fallback extraction from the server's duplicate-key message text.
///
/// Messages look like:
/// `E11000 duplicate key error collection: sitectl.users index: email_1 dup key: { email: "a@b.c" }`
/// Both parts default to "unknown" when the message doesn't match.
fn parse_duplicate_message(message: &str) -> (String, String) {
    let field = message
        .split_once("index: ")
        .map(|(_, rest)| rest.split_whitespace().next().unwrap_or_default())
        .map(strip_index_suffix)
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    let value = message
        .split_once("dup key: {")
        .and_then(|(_, rest)| rest.split_once('}'))
        .and_then(|(inside, _)| inside.split_once(':'))
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    (field, value)
}

/// Index names are conventionally `<field>_1` / `<field>_-1`
fn strip_index_suffix(index_name: &str) -> String {
    index_name
        .strip_suffix("_1")
        .or_else(|| index_name.strip_suffix("_-1"))
        .unwrap_or(index_name)
        .to_string()
}

fn bson_to_plain_string(value: &mongodb::bson::Bson) -> String {
    match value {
        mongodb::bson::Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;
