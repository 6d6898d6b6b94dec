//! Device-path enumeration over a platform-dependent set of glob patterns.

use std::collections::HashSet;

#[cfg(target_os = "macos")]
const PATTERNS: &[&str] = &["/dev/tty.*", "/dev/cu.*"];

#[cfg(target_os = "linux")]
const PATTERNS: &[&str] = &[
    "/dev/ttyS*",
    "/dev/ttyUSB*",
    "/dev/ttyACM*",
    "/dev/ttyAMA*",
    "/dev/ttyPS*",
    "/dev/tty.*",
];

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
const PATTERNS: &[&str] = &[];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub path: String,
    pub description: String,
}

/// Returns every unique device path matching this platform's patterns. Unlike the glob(3)-based
/// reference this was distilled from, the `glob` crate never yields an unexpanded literal
/// pattern when nothing matches, so there is nothing here to filter out on that account.
pub fn enumerate() -> Vec<PortInfo> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for pattern in PATTERNS {
        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("bad enumeration pattern {}: {}", pattern, e);
                continue;
            }
        };
        for entry in paths.flatten() {
            let path = match entry.to_str() {
                Some(p) => p.to_string(),
                None => continue,
            };
            if path.contains('*') {
                continue;
            }
            if seen.insert(path.clone()) {
                out.push(PortInfo {
                    description: format!("Serial device {}", path),
                    path,
                });
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_is_derived_from_path() {
        let info = PortInfo {
            path: "/dev/ttyUSB0".to_string(),
            description: format!("Serial device {}", "/dev/ttyUSB0"),
        };
        assert_eq!(info.description, "Serial device /dev/ttyUSB0");
    }

    #[test]
    fn enumerate_never_panics() {
        let _ = enumerate();
    }
}
