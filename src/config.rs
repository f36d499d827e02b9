use std::{
    env,
    ffi::OsString,
    fmt,
    path::PathBuf,
};

use crate::error::ToolchainError;

const LLC_ENV: &str = "MINIC_LLC";
const CC_ENV: &str = "MINIC_CC";
const WORK_DIR_ENV: &str = "MINIC_WORK_DIR";
const DEFAULT_WORK_DIR: &str = "minic";

const LLC_CANDIDATES: &[&str] = &["llc", "llc-19", "llc-18", "llc-17", "llc-16", "llc-15", "llc-14"];
const CC_CANDIDATES: &[&str] = &["clang", "gcc", "cc"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    ExplicitVar,
    PathSearch,
    Default,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::ExplicitVar => write!(f, "explicit environment variable"),
            ResolutionSource::PathSearch => write!(f, "PATH search"),
            ResolutionSource::Default => write!(f, "built-in default"),
        }
    }
}

/// A resolved location plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: PathBuf,
    pub source: ResolutionSource,
}

/// Locations of the external tools and the scratch directory used by the
/// orchestrator.
///
/// Each entry is resolved in order:
///  1. Explicit `MINIC_LLC` / `MINIC_CC` / `MINIC_WORK_DIR`
///  2. A PATH search over the known program names (tools only)
///  3. Default (`$TMPDIR/minic` for the work directory)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainConfig {
    pub llc: Resolved,
    pub cc: Resolved,
    pub work_dir: Resolved,
}

impl ToolchainConfig {
    pub fn detect() -> Result<Self, ToolchainError> {
        let search = env::var_os("PATH");
        Ok(Self {
            llc: resolve_tool("llc", LLC_ENV, LLC_CANDIDATES, search.clone())?,
            cc: resolve_tool("C compiler", CC_ENV, CC_CANDIDATES, search)?,
            work_dir: resolve_work_dir(),
        })
    }
}

fn explicit_override(key: &str) -> Option<PathBuf> {
    env::var_os(key).and_then(|raw| {
        let trimmed = raw.to_string_lossy().trim().to_owned();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    })
}

fn resolve_tool(
    tool: &'static str,
    env_key: &str,
    candidates: &[&str],
    search: Option<OsString>,
) -> Result<Resolved, ToolchainError> {
    if let Some(path) = explicit_override(env_key) {
        return Ok(Resolved {
            path,
            source: ResolutionSource::ExplicitVar,
        });
    }
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    candidates
        .iter()
        .find_map(|name| which::which_in(name, search.as_ref(), &cwd).ok())
        .map(|path| Resolved {
            path,
            source: ResolutionSource::PathSearch,
        })
        .ok_or_else(|| ToolchainError::ToolNotFound {
            tool,
            tried: format!("${env_key}, {}", candidates.join(", ")),
        })
}

fn resolve_work_dir() -> Resolved {
    match explicit_override(WORK_DIR_ENV) {
        Some(path) => Resolved {
            path,
            source: ResolutionSource::ExplicitVar,
        },
        None => Resolved {
            path: env::temp_dir().join(DEFAULT_WORK_DIR),
            source: ResolutionSource::Default,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    fn clear_env_vars() {
        for key in [LLC_ENV, CC_ENV, WORK_DIR_ENV] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn explicit_override_wins() {
        clear_env_vars();
        env::set_var(LLC_ENV, "  /opt/llvm/bin/llc ");
        let llc = resolve_tool("llc", LLC_ENV, &["definitely-not-a-real-llc"], None).unwrap();
        assert_eq!(llc.path, PathBuf::from("/opt/llvm/bin/llc"));
        assert_eq!(llc.source, ResolutionSource::ExplicitVar);
        env::remove_var(LLC_ENV);
    }

    #[test]
    #[serial]
    fn blank_override_is_ignored() {
        clear_env_vars();
        env::set_var(CC_ENV, "   ");
        let err = resolve_tool("C compiler", CC_ENV, &["definitely-not-a-real-cc"], Some(OsString::new())).unwrap_err();
        assert!(matches!(err, ToolchainError::ToolNotFound { tool: "C compiler", .. }));
        assert!(err.to_string().contains("$MINIC_CC, definitely-not-a-real-cc"));
        env::remove_var(CC_ENV);
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn path_search_tries_candidates_in_order() {
        use std::os::unix::fs::PermissionsExt;

        clear_env_vars();
        let dir = tempdir().unwrap();
        let fake = dir.path().join("llc-15");
        std::fs::write(&fake, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let llc = resolve_tool("llc", LLC_ENV, &["llc-missing", "llc-15"], Some(dir.path().into())).unwrap();
        assert_eq!(llc.path, fake);
        assert_eq!(llc.source, ResolutionSource::PathSearch);
    }

    #[test]
    #[serial]
    fn work_dir_defaults_to_temp() {
        clear_env_vars();
        let dir = resolve_work_dir();
        assert_eq!(dir.path, env::temp_dir().join("minic"));
        assert_eq!(dir.source, ResolutionSource::Default);

        env::set_var(WORK_DIR_ENV, "/srv/minic-out");
        let dir = resolve_work_dir();
        assert_eq!(dir.path, PathBuf::from("/srv/minic-out"));
        assert_eq!(dir.source, ResolutionSource::ExplicitVar);
        env::remove_var(WORK_DIR_ENV);
    }
}
