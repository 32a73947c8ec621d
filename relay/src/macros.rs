//! Shorthands for building and returning [`crate::error::RelayError`]s.

/// Creates a [`crate::error::RelayError`] from a kind, a static description and optionally a
/// detail (anything implementing `ToString`, or an owned value via `detail =`) and a source.
#[macro_export]
macro_rules! relay_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::RelayError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::RelayError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, detail = $detail:expr) => {
        $crate::error::RelayError::from(($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr, source: $source:expr) => {
        $crate::error::RelayError::from(($kind, $desc, $detail)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::RelayError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::RelayError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Returns early with a [`crate::error::RelayError`] built like [`relay_error!`].
#[macro_export]
macro_rules! bail {
    ($($arg:tt)+) => {
        return ::core::result::Result::Err($crate::relay_error!($($arg)+))
    };
}
