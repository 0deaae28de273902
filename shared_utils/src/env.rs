use snafu::prelude::*;

/// An environment variable required by the application is not set.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub struct MissingEnvVarError {
    pub name: String,
    source: std::env::VarError,
    backtrace: snafu::Backtrace,
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// This is a thin wrapper around `std::env::var` that provides a more
/// ergonomic and specific error type for missing variables.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    std::env::var(name).context(MissingEnvVarSnafu {
        name: name.to_string(),
    })
}

/// Reads an environment variable, treating an empty value the same as unset.
pub fn env_opt(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Reads an environment variable, falling back to `default` when unset or empty.
pub fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_var_is_error() {
        let err = get_env_var("SHARED_UTILS_DOES_NOT_EXIST").unwrap_err();
        assert!(err.to_string().contains("SHARED_UTILS_DOES_NOT_EXIST"));
    }

    #[test]
    fn empty_var_counts_as_unset() {
        // Safety: test-only mutation of this process's environment.
        unsafe { std::env::set_var("SHARED_UTILS_EMPTY_TEST", "") };
        assert_eq!(env_opt("SHARED_UTILS_EMPTY_TEST"), None);
        assert_eq!(env_or("SHARED_UTILS_EMPTY_TEST", "fallback"), "fallback");
    }
}
