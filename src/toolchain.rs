//! Turns IR text into a native executable with external tools, then runs it.
//!
//! Tool failures are reported verbatim; nothing here interprets compiler or
//! linker output.

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::config::ToolchainConfig;
use crate::error::ToolchainError;

type Result<T> = std::result::Result<T, ToolchainError>;

/// C implementation of the runtime primitives, linked into every executable.
pub const RUNTIME_SOURCE: &str = include_str!("../runtime/minic_runtime.c");

/// Captured result of running a built program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

/// Files of one build. Intermediates live in a private scratch directory
/// under the work directory, removed when the value is dropped.
#[derive(Debug)]
pub struct Artifacts {
    scratch: TempDir,
    pub ir: PathBuf,
    pub object: PathBuf,
    pub runtime: PathBuf,
    pub executable: PathBuf,
}

impl Artifacts {
    fn new(work_dir: &Path) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("minic-")
            .tempdir_in(work_dir)
            .map_err(|e| ToolchainError::io(format!("creating scratch dir in {}", work_dir.display()), e))?;
        let dir = scratch.path();
        Ok(Self {
            ir: dir.join("program.ll"),
            object: dir.join("program.o"),
            runtime: dir.join("minic_runtime.c"),
            executable: dir.join(format!("program{}", std::env::consts::EXE_SUFFIX)),
            scratch,
        })
    }

    /// Scratch directory holding the intermediates.
    pub fn dir(&self) -> &Path {
        self.scratch.path()
    }
}

pub struct Toolchain {
    config: ToolchainConfig,
}

impl Toolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    /// Resolve tools from the environment (see [`ToolchainConfig::detect`]).
    pub fn detect() -> Result<Self> {
        let config = ToolchainConfig::detect()?;
        info!(
            llc = %config.llc.path.display(),
            llc_source = %config.llc.source,
            cc = %config.cc.path.display(),
            cc_source = %config.cc.source,
            work_dir = %config.work_dir.path.display(),
            "toolchain resolved"
        );
        Ok(Self::new(config))
    }

    /// Assemble `ir` to an object with `llc` and link it against the runtime.
    /// When `out_exe` is given the executable is written there and outlives
    /// the returned [`Artifacts`]; every other file goes away on drop, on
    /// failure too.
    pub fn build_executable(&self, ir: &str, out_exe: Option<&Path>) -> Result<Artifacts> {
        let work_dir = &self.config.work_dir.path;
        fs::create_dir_all(work_dir).map_err(|e| ToolchainError::io(format!("creating {}", work_dir.display()), e))?;

        let mut artifacts = Artifacts::new(work_dir)?;
        debug!(scratch = %artifacts.dir().display(), "created scratch dir");
        if let Some(out) = out_exe {
            artifacts.executable = out.to_path_buf();
        }

        write_file(&artifacts.ir, ir)?;
        write_file(&artifacts.runtime, RUNTIME_SOURCE)?;

        run_tool(
            "llc",
            Command::new(&self.config.llc.path)
                .arg("-filetype=obj")
                .arg("-relocation-model=pic")
                .arg(&artifacts.ir)
                .arg("-o")
                .arg(&artifacts.object),
        )?;
        run_tool(
            "cc",
            Command::new(&self.config.cc.path)
                .arg(&artifacts.object)
                .arg(&artifacts.runtime)
                .arg("-o")
                .arg(&artifacts.executable),
        )?;

        info!(executable = %artifacts.executable.display(), "built executable");
        Ok(artifacts)
    }

    /// Run an executable and capture its output. A non-zero exit code is a
    /// result, not an error.
    pub fn run(&self, exe: &Path) -> Result<RunOutput> {
        let output = Command::new(exe)
            .output()
            .map_err(|e| ToolchainError::io(format!("running {}", exe.display()), e))?;
        let result = RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        debug!(exit_code = ?result.exit_code, stdout_bytes = result.stdout.len(), "program finished");
        Ok(result)
    }

    /// Build into a scratch directory and run. Nothing is left behind.
    pub fn build_and_run(&self, ir: &str) -> Result<RunOutput> {
        let artifacts = self.build_executable(ir, None)?;
        self.run(&artifacts.executable)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| ToolchainError::io(format!("writing {}", path.display()), e))
}

fn run_tool(tool: &str, cmd: &mut Command) -> Result<Output> {
    debug!(tool, command = ?cmd, "invoking tool");
    let output = cmd
        .output()
        .map_err(|e| ToolchainError::io(format!("spawning {tool}"), e))?;
    if !output.status.success() {
        return Err(ToolchainError::ToolFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(output)
}
