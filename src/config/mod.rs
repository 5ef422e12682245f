// Configuration, database bootstrap and demo data

pub mod app;
pub mod database;
pub mod seeding;

pub use app::*;
pub use database::*;
pub use seeding::*;

use std::env;
use std::str::FromStr;

/// Read a string variable, falling back to `default` when unset.
pub(crate) fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse a variable, falling back to `default` when unset or malformed.
pub(crate) fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a boolean flag; accepts `true/false`, `1/0`, `yes/no`.
pub(crate) fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Read an optional variable, treating empty strings as unset.
pub(crate) fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_parse_falls_back_on_garbage() {
        env::set_var("PT_TEST_NUMBER", "not-a-number");
        assert_eq!(env_parse("PT_TEST_NUMBER", 42u32), 42);

        env::set_var("PT_TEST_NUMBER", " 17 ");
        assert_eq!(env_parse("PT_TEST_NUMBER", 42u32), 17);

        env::remove_var("PT_TEST_NUMBER");
        assert_eq!(env_parse("PT_TEST_NUMBER", 42u32), 42);
    }

    #[test]
    #[serial]
    fn test_env_flag_variants() {
        env::set_var("PT_TEST_FLAG", "yes");
        assert!(env_flag("PT_TEST_FLAG", false));

        env::set_var("PT_TEST_FLAG", "0");
        assert!(!env_flag("PT_TEST_FLAG", true));

        env::set_var("PT_TEST_FLAG", "maybe");
        assert!(env_flag("PT_TEST_FLAG", true));

        env::remove_var("PT_TEST_FLAG");
        assert!(!env_flag("PT_TEST_FLAG", false));
    }

    #[test]
    #[serial]
    fn test_env_opt_ignores_blank() {
        env::set_var("PT_TEST_OPT", "   ");
        assert_eq!(env_opt("PT_TEST_OPT"), None);

        env::set_var("PT_TEST_OPT", "value");
        assert_eq!(env_opt("PT_TEST_OPT").as_deref(), Some("value"));

        env::remove_var("PT_TEST_OPT");
    }
}
