pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use error::FieldSignalError;
pub use types::*;

/// Normalize a name into a URL-safe slug: lowercase, strip non-alphanumeric
/// (keeping spaces), collapse whitespace, replace spaces with hyphens.
///
/// ```
/// assert_eq!(fieldsignal_common::slugify("FC Dynamo"), "fc-dynamo");
/// assert_eq!(fieldsignal_common::slugify("  Multiple   Spaces  "), "multiple-spaces");
/// ```
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() || c == ' ' { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<&str>>().join("-")
}

/// Clamp a confidence value to the invariant range `[0.05, 0.95]` (spec invariant 1).
pub fn clamp_confidence(value: f64) -> f64 {
    value.clamp(0.05, 0.95)
}
