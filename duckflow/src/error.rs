//! Error types and result definitions for pipeline operations.
//!
//! [`EtlError`] carries a classification ([`ErrorKind`]), a static description,
//! optional dynamic detail naming the offending identifier or value, an optional
//! source error and the callsite that raised it. Several errors can be aggregated
//! into one, which is how a failed rollback is reported next to the failure that
//! triggered it.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type for pipeline operations.
pub type EtlResult<T> = Result<T, EtlError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Main error type for pipeline operations.
#[derive(Debug, Clone)]
pub struct EtlError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    Many {
        errors: Vec<EtlError>,
        location: &'static Location<'static>,
    },
}

/// Categories of errors, grouped by the stage that raises them.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration Errors
    ConfigError,
    UnknownReplicationStrategy,
    MissingPrimaryKeys,
    InvalidTransform,

    // Provisioning Errors
    UnsupportedStorageBackend,
    DestinationConnectionFailed,
    ExtensionLoadFailed,
    StorageConfigurationFailed,
    CatalogAttachFailed,

    // Transform Errors
    MissingColumn,
    ConversionError,
    InvalidData,

    // Load Errors
    SchemaSyncFailed,
    StagingFailed,
    DestinationQueryFailed,
    DuplicatePrimaryKeys,
    TransactionFailed,

    // Source Errors
    SourceQueryFailed,
    SourceIoError,
    SourceSchemaError,

    // IO & Serialization Errors
    IoError,
    DeserializationError,

    Unknown,
}

impl EtlError {
    /// Returns the [`ErrorKind`] of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description of this error, or of the first aggregated error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("multiple errors"),
        }
    }

    /// Returns the dynamic detail, if any.
    ///
    /// For aggregated errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the aggregated errors, if this error aggregates several.
    pub fn errors(&self) -> Option<&[EtlError]> {
        match self.repr {
            ErrorRepr::Single(_) => None,
            ErrorRepr::Many { ref errors, .. } => Some(errors),
        }
    }

    /// Returns the callsite that created this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating error and returns the modified instance.
    ///
    /// Has no effect on aggregated errors, which forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
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
        EtlError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
            }),
        }
    }
}

impl PartialEq for EtlError {
    fn eq(&self, other: &EtlError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                write!(f, "[{:?}] {}", payload.kind, payload.description)?;

                if let Some(detail) = payload.detail.as_deref() {
                    write!(f, ": {detail}")?;
                }
                if let Some(source) = payload.source.as_ref() {
                    write!(f, " (caused by: {source})")?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, .. } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated",
                    count,
                    if count == 1 { "" } else { "s" },
                )?;

                for (index, error) in errors.iter().enumerate() {
                    write!(f, "\n  {}. {}", index + 1, error)?;
                }

                Ok(())
            }
        }
    }
}

impl error::Error for EtlError {
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

/// Creates an [`EtlError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for EtlError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> EtlError {
        EtlError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates an [`EtlError`] from an error kind, static description and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for EtlError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> EtlError {
        EtlError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates several errors; a single error is returned unwrapped.
impl<E> From<Vec<E>> for EtlError
where
    E: Into<EtlError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> EtlError {
        let location = Location::caller();

        let mut errors: Vec<EtlError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        EtlError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for EtlError {
    #[track_caller]
    fn from(err: std::io::Error) -> EtlError {
        let detail = err.to_string();
        EtlError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for EtlError {
    #[track_caller]
    fn from(err: serde_json::Error) -> EtlError {
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
        EtlError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`duckdb::Error`] into a generic destination query failure.
///
/// Call sites that know which stage failed build a more specific kind with
/// [`crate::etl_error!`] instead.
impl From<duckdb::Error> for EtlError {
    #[track_caller]
    fn from(err: duckdb::Error) -> EtlError {
        let detail = err.to_string();
        EtlError::from_components(
            ErrorKind::DestinationQueryFailed,
            Cow::Borrowed("DuckDB statement failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<reqwest::Error> for EtlError {
    #[track_caller]
    fn from(err: reqwest::Error) -> EtlError {
        let (kind, description) = if err.is_decode() {
            (
                ErrorKind::DeserializationError,
                "HTTP response body could not be decoded",
            )
        } else {
            (ErrorKind::SourceIoError, "HTTP request failed")
        };

        let detail = err.to_string();
        EtlError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
