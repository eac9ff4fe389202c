//! Target platform and architecture naming.
//!
//! Only the names matter to the orchestrator: they select the per-platform
//! build folder inside each dependency directory and form part of remote
//! archive names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    MacOS,
    IOS,
    Android,
    Raspi,
}

/// Target CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86,
    X64,
    Arm,
    Arm64,
}

impl Platform {
    /// Platform of the running host.
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::MacOS => "macos",
            Platform::IOS => "ios",
            Platform::Android => "android",
            Platform::Raspi => "raspi",
        }
    }

    /// Library file extensions the platform links against.
    pub fn linkable_extensions(&self) -> &'static [&'static str] {
        match self {
            Platform::Windows => &[".lib"],
            Platform::Linux | Platform::Android | Platform::Raspi => &[".a", ".so"],
            Platform::MacOS => &[".a", ".dylib", ".bundle"],
            Platform::IOS => &[".a", ".dylib", ".framework"],
        }
    }
}

impl Arch {
    /// Architecture of the running host.
    pub fn host() -> Self {
        if cfg!(target_arch = "x86") {
            Arch::X86
        } else if cfg!(target_arch = "aarch64") {
            Arch::Arm64
        } else if cfg!(target_arch = "arm") {
            Arch::Arm
        } else {
            Arch::X64
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X64 => "x64",
            Arch::Arm => "arm",
            Arch::Arm64 => "arm64",
        }
    }
}

/// Name of the per-platform build folder, e.g. `linux`, `windows32`, `winarm`.
pub fn build_dir_name(platform: Platform, arch: Arch) -> String {
    match (platform, arch) {
        (Platform::Windows, Arch::X86) => "windows32".to_string(),
        (Platform::Windows, Arch::Arm64) => "winarm".to_string(),
        (Platform::Windows, Arch::Arm) => "winarm32".to_string(),
        (Platform::Linux, Arch::X86) => "linux32".to_string(),
        (Platform::Linux, Arch::Arm64) => "linuxarm".to_string(),
        (Platform::Linux, Arch::Arm) => "linuxarm32".to_string(),
        (p, _) => p.as_str().to_string(),
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            "macos" => Ok(Platform::MacOS),
            "ios" => Ok(Platform::IOS),
            "android" => Ok(Platform::Android),
            "raspi" => Ok(Platform::Raspi),
            _ => Err(format!("unknown platform '{}'", s)),
        }
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86" => Ok(Arch::X86),
            "x64" | "x86_64" => Ok(Arch::X64),
            "arm" => Ok(Arch::Arm),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            _ => Err(format!("unknown arch '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_dir_names() {
        assert_eq!(build_dir_name(Platform::Linux, Arch::X64), "linux");
        assert_eq!(build_dir_name(Platform::Windows, Arch::X86), "windows32");
        assert_eq!(build_dir_name(Platform::Windows, Arch::Arm64), "winarm");
        assert_eq!(build_dir_name(Platform::MacOS, Arch::Arm64), "macos");
    }

    #[test]
    fn test_parse_platform_and_arch() {
        assert_eq!("Linux".parse::<Platform>().unwrap(), Platform::Linux);
        assert_eq!("aarch64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert!("beos".parse::<Platform>().is_err());
    }
}
