//! Host interface table lookups

use std::collections::BTreeSet;
use std::path::Path;

/// Answers which network interfaces exist on this host.
///
/// Injected into validation and the disable path so tests can pin the
/// interface table without touching the host.
pub trait InterfaceLookup: Send + Sync {
    fn exists(&self, name: &str) -> bool;

    /// Shapeable interface names: loopback and docker bridges excluded.
    fn names(&self) -> Vec<String>;
}

/// Interface table backed by `/sys/class/net`.
pub struct SysClassNet;

const SYS_CLASS_NET: &str = "/sys/class/net";

impl InterfaceLookup for SysClassNet {
    fn exists(&self, name: &str) -> bool {
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return false;
        }
        Path::new(SYS_CLASS_NET).join(name).exists()
    }

    fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let Ok(entries) = std::fs::read_dir(SYS_CLASS_NET) else {
            return names;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == "lo" || name.starts_with("docker") {
                continue;
            }
            names.push(name);
        }
        names.sort();
        names
    }
}

/// Fixed interface table for tests.
pub struct FixedInterfaces {
    names: BTreeSet<String>,
}

impl FixedInterfaces {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl InterfaceLookup for FixedInterfaces {
    fn exists(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}
