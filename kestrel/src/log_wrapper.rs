//! Logging front-end that forwards to `log` and/or `defmt` depending on the enabled features.
//!
//! `log` records are emitted under the `kestrel` target so hosted loggers can filter kernel output.

#[doc(hidden)]
#[macro_export]
macro_rules! dispatch_log {
    ( $level:ident, $fmt:literal $(, $arg:expr )* $(,)? ) => {
        {
            #[cfg(feature = "log")]
            log::$level!(target: "kestrel", $fmt $(, $arg )*);
            #[cfg(feature = "defmt")]
            defmt::$level!($fmt $(, $arg )*);
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ( $( $tt:tt )+ ) => { $crate::dispatch_log!(error, $( $tt )+) };
}

#[doc(hidden)]
#[macro_export]
macro_rules! warn {
    ( $( $tt:tt )+ ) => { $crate::dispatch_log!(warn, $( $tt )+) };
}

#[doc(hidden)]
#[macro_export]
macro_rules! info {
    ( $( $tt:tt )+ ) => { $crate::dispatch_log!(info, $( $tt )+) };
}

#[doc(hidden)]
#[macro_export]
macro_rules! debug {
    ( $( $tt:tt )+ ) => { $crate::dispatch_log!(debug, $( $tt )+) };
}

#[doc(hidden)]
#[macro_export]
macro_rules! trace {
    ( $( $tt:tt )+ ) => { $crate::dispatch_log!(trace, $( $tt )+) };
}
