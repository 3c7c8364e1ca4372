//! Logging shims.
//!
//! Firmware builds log through `defmt`, host builds through `tracing`. With
//! neither feature the macros still type-check their arguments and compile to
//! nothing. Arguments must be plain integers or `&str` so the same format
//! string works for both backends.

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::debug!($($arg)*);
        #[cfg(feature = "tracing")]
        tracing::debug!($($arg)*);
        #[cfg(not(any(feature = "defmt", feature = "tracing")))]
        let _ = format_args!($($arg)*);
    }};
}

macro_rules! info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::info!($($arg)*);
        #[cfg(feature = "tracing")]
        tracing::info!($($arg)*);
        #[cfg(not(any(feature = "defmt", feature = "tracing")))]
        let _ = format_args!($($arg)*);
    }};
}

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::warn!($($arg)*);
        #[cfg(feature = "tracing")]
        tracing::warn!($($arg)*);
        #[cfg(not(any(feature = "defmt", feature = "tracing")))]
        let _ = format_args!($($arg)*);
    }};
}

pub(crate) use {debug, info, log_warn};

#[cfg(test)]
mod tests {
    #[test]
    fn shims_expand_in_expression_position() {
        let index = 3u32;
        let name = "/male/c_bwh_16.wav";
        super::debug!("sample {}", index);
        super::info!("playing {}", name);
        super::log_warn!("clip not found: {}", name);
    }
}
