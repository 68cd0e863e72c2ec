//! Builders and fixtures shared by the workspace's tests.
//!
//! - [`generators`] produces real Level II bytes: bzip2 blocks behind
//!   control words, framed messages, Message 31 radials and the volume
//!   header record
//! - [`fixtures`] holds chunk keys and radar sites
//! - [`mirror`] writes chunk objects into a temporary directory laid out
//!   like the bucket
//!
//! Pulled in as a dev-dependency only:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod mirror;

pub use fixtures::*;
pub use generators::*;
pub use mirror::*;

/// Assert two numbers are within `tolerance` of each other.
///
/// All three arguments are widened to `f64`.
///
/// ```
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.5_f32, 1.5001, 1e-3);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr $(,)?) => {{
        let (actual, expected, tolerance) = ($actual as f64, $expected as f64, $tolerance as f64);
        assert!(
            (actual - expected).abs() <= tolerance,
            "{} = {} is not within {} of {}",
            stringify!($actual),
            actual,
            tolerance,
            expected
        );
    }};
}
