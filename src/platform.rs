//! Host platform detection.

use serde::Serialize;
use strum::Display;

/// Operating system family the harness runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum Platform {
    Windows,
    Linux,
    MacOS,
    Unknown,
}

impl Platform {
    /// Platform of the running process.
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an `std::env::consts::OS` value (or similar) to a platform.
    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "linux" => Self::Linux,
            "macos" => Self::MacOS,
            other if other.starts_with("win") => Self::Windows,
            other if other.starts_with("linux") => Self::Linux,
            other if other.starts_with("darwin") => Self::MacOS,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_os() {
        assert_eq!(Platform::from_os("windows"), Platform::Windows);
        assert_eq!(Platform::from_os("linux"), Platform::Linux);
        assert_eq!(Platform::from_os("macos"), Platform::MacOS);
        assert_eq!(Platform::from_os("darwin"), Platform::MacOS);
        assert_eq!(Platform::from_os("win32"), Platform::Windows);
        assert_eq!(Platform::from_os("freebsd"), Platform::Unknown);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_current_on_linux() {
        assert_eq!(Platform::current(), Platform::Linux);
    }
}
