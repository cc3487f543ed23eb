//! Shorthands for building and returning [`crate::error::EtlError`] values.

/// Builds an [`crate::error::EtlError`] from a kind, a static description and,
/// optionally, a detail and a source error.
///
/// `detail = expr` moves an owned value in as the detail; a bare third argument
/// is rendered with [`ToString`].
#[macro_export]
macro_rules! etl_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::EtlError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::EtlError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, detail = $detail:expr) => {
        $crate::error::EtlError::from(($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr, source: $source:expr) => {
        $crate::error::EtlError::from(($kind, $desc, $detail)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::EtlError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::EtlError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Returns early with an [`crate::error::EtlError`]. Accepts the same arguments as [`etl_error!`].
#[macro_export]
macro_rules! bail {
    ($($arg:tt)+) => {
        return ::core::result::Result::Err($crate::etl_error!($($arg)+))
    };
}
