//! Foreground-package detection from `dumpsys` output.
//!
//! Android changed where the resumed activity is reported in API 33,
//! so there are two dump formats. Which one to read is picked by SDK level;
//! callers only ever see [`ActivityDump::package_name`].

use crate::extract;

/// Highest SDK level still using the legacy dump format.
pub const LEGACY_MAX_SDK: u32 = 32;

const PACKAGE_LEFT: &str = "u0 ";
const PACKAGE_RIGHT: &str = "/";

/// OS of the controlling host, which decides the legacy dump source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Windows,
    Unix,
}

impl HostPlatform {
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Unix
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityDump {
    /// API 33+: `dumpsys activity`, `topResumedActivity` line.
    TopResumed,
    /// Up to API 32: `mCurrentFocus` from `dumpsys window` on Windows hosts,
    /// `mResumedActivity` from `dumpsys activity` elsewhere.
    Legacy(HostPlatform),
}

impl ActivityDump {
    #[must_use]
    pub const fn for_sdk(sdk: u32, host: HostPlatform) -> Self {
        if sdk > LEGACY_MAX_SDK {
            Self::TopResumed
        } else {
            Self::Legacy(host)
        }
    }

    /// `dumpsys` service to query.
    #[must_use]
    pub const fn service(self) -> &'static str {
        match self {
            Self::Legacy(HostPlatform::Windows) => "window",
            Self::TopResumed | Self::Legacy(HostPlatform::Unix) => "activity",
        }
    }

    /// Only lines containing this are searched.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::TopResumed => "topResumedActivity",
            Self::Legacy(HostPlatform::Windows) => "mCurrentFocus",
            Self::Legacy(HostPlatform::Unix) => "mResumedActivity",
        }
    }

    /// First package name found on a marker line, or `""` if none.
    #[must_use]
    pub fn package_name(self, dump: &str) -> String {
        let marker = self.marker();
        dump.lines()
            .filter(|line| line.contains(marker))
            .flat_map(|line| extract::between(PACKAGE_LEFT, PACKAGE_RIGHT, line))
            .next()
            .unwrap_or_default()
    }
}
