//! Boolean configuration flags from the environment.
//!
//! Deployment environments hand us booleans as strings, with all the
//! ambiguity that implies (`"True"`, `"1"`, `"yes"`, …). The resolver here
//! is **total**: it never fails, it falls back to the given default and says
//! so on the diagnostic channel.

use tracing::warn;

const TRUE_VALUES: [&str; 5] = ["true", "1", "t", "y", "yes"];
const FALSE_VALUES: [&str; 5] = ["false", "0", "f", "n", "no"];

/// Resolves a boolean from the environment variable `name`.
///
/// Matching is case-insensitive against a fixed token set. An unset variable
/// or an unrecognized value logs a warning and returns `default`. Never
/// panics, never errors.
pub fn bool_from_env(name: &str, default: bool) -> bool {
    bool_from_value(name, std::env::var(name).ok().as_deref(), default)
}

/// The parsing half of [`bool_from_env`], split out so the token table can
/// be exercised without touching process-wide environment state.
fn bool_from_value(name: &str, value: Option<&str>, default: bool) -> bool {
    let Some(value) = value else {
        warn!("{name} environment variable not set, using default: {default}");
        return default;
    };

    let lower = value.to_lowercase();
    if TRUE_VALUES.contains(&lower.as_str()) {
        true
    } else if FALSE_VALUES.contains(&lower.as_str()) {
        false
    } else {
        warn!("invalid value for {name}: `{value}`, using default: {default}");
        default
    }
}
