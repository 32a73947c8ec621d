//! Error types and result definitions for the relay.
//!
//! [`RelayError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail, an optional source error and the callsite it was raised at. Several errors
//! can be aggregated into one, which is how a read-back reports every consistency level that
//! failed.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used across the relay.
pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the relay.
#[derive(Debug, Clone)]
pub struct RelayError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Aggregation of several failures, e.g. one per consistency level tried.
    Many {
        errors: Vec<RelayError>,
        location: &'static Location<'static>,
    },
}

/// Classification of relay failures.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Source database
    SourceReadFailed,
    SourceReadTimeout,
    ReadBackFailed,
    StatementPreparationFailed,

    // Schema
    MissingTable,
    UnsupportedColumnType,
    MissingKeyColumn,

    // Data
    ConversionError,

    // Collaborators
    NoticeSourceFailed,
    EventLogEmitFailed,

    // Persistence
    CheckpointIoError,
    IoError,
    SerializationError,
    DeserializationError,

    // Configuration
    ConfigError,

    // Workers
    InvalidState,
    ReconcileWorkerPanic,
    ReconcileWorkerCancelled,

    Unknown,

    /// Raised by failpoints in tests.
    FailpointTriggered,
}

impl RelayError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// Aggregated errors report the kind of their first error.
    pub fn kind(&self) -> ErrorKind {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.kind,
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error, flattening aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match &self.repr {
            ErrorRepr::Single(payload) => vec![payload.kind],
            ErrorRepr::Many { errors, .. } => errors.iter().flat_map(|err| err.kinds()).collect(),
        }
    }

    pub fn description(&self) -> &str {
        match &self.repr {
            ErrorRepr::Single(payload) => &payload.description,
            ErrorRepr::Many { .. } => "multiple errors",
        }
    }

    /// Returns the detail of this error, or of the first aggregated error that has one.
    pub fn detail(&self) -> Option<&str> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.detail.as_deref(),
            ErrorRepr::Many { errors, .. } => errors.iter().find_map(|err| err.detail()),
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match &self.repr {
            ErrorRepr::Single(payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Attaches the originating error.
    ///
    /// Aggregated errors ignore the call, they expose their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(payload) = &mut self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        RelayError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for RelayError {
    /// Errors compare equal when their kinds match, ignoring detail and location.
    fn eq(&self, other: &RelayError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                write!(
                    f,
                    "[{:?}] {} @ {}:{}",
                    payload.kind,
                    payload.description,
                    payload.location.file(),
                    payload.location.line(),
                )?;

                if let Some(detail) = &payload.detail {
                    for (index, line) in detail.lines().enumerate() {
                        if index == 0 {
                            write!(f, "\n  Detail: {line}")?;
                        } else {
                            write!(f, "\n          {line}")?;
                        }
                    }
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                write!(
                    f,
                    "[Many] {} errors aggregated @ {}:{}",
                    errors.len(),
                    location.file(),
                    location.line(),
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    if let Some(first) = lines.next() {
                        write!(f, "\n  {}. {first}", index + 1)?;
                    }
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for RelayError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for RelayError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> RelayError {
        RelayError::from_components(kind, Cow::Borrowed(description), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for RelayError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> RelayError {
        RelayError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(detail.into()),
            None,
        )
    }
}

/// Aggregates errors; a single error is returned unwrapped.
impl<E> From<Vec<E>> for RelayError
where
    E: Into<RelayError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> RelayError {
        let location = Location::caller();
        let mut errors: Vec<RelayError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        RelayError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for RelayError {
    #[track_caller]
    fn from(err: std::io::Error) -> RelayError {
        let detail = err.to_string();
        RelayError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for RelayError {
    #[track_caller]
    fn from(err: serde_json::Error) -> RelayError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        RelayError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<config::shared::ValidationError> for RelayError {
    #[track_caller]
    fn from(err: config::shared::ValidationError) -> RelayError {
        let detail = err.to_string();
        RelayError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid relay configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<tokio::time::error::Elapsed> for RelayError {
    #[track_caller]
    fn from(err: tokio::time::error::Elapsed) -> RelayError {
        RelayError::from_components(
            ErrorKind::SourceReadTimeout,
            Cow::Borrowed("Operation timed out"),
            None,
            Some(Arc::new(err)),
        )
    }
}
