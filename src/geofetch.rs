use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::domain::GseAccession;
use crate::error::HarvestError;

const TOOL: &str = "geofetch";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captured diagnostics of a successful materialization.
#[derive(Debug, Clone, Default)]
pub struct MaterializeOutput {
    pub stderr: String,
}

/// Produces the metadata files for one accession under `destination`.
pub trait MetadataMaterializer: Send + Sync {
    fn materialize(
        &self,
        accession: &GseAccession,
        destination: &Path,
    ) -> Result<MaterializeOutput, HarvestError>;
}

#[derive(Debug, Clone)]
pub struct GeofetchOptions {
    pub discard_soft: bool,
    pub timeout: Option<Duration>,
}

/// Runs `geofetch --just-metadata` as a child process.
#[derive(Debug, Clone)]
pub struct GeofetchMaterializer {
    program: PathBuf,
    options: GeofetchOptions,
}

impl GeofetchMaterializer {
    /// Locates `geofetch` on `PATH`; a missing tool is fatal for the run.
    pub fn new(options: GeofetchOptions) -> Result<Self, HarvestError> {
        let program = find_in_path(TOOL).ok_or_else(|| HarvestError::MissingTool(TOOL.to_string()))?;
        Ok(Self { program, options })
    }

    pub fn with_program(program: PathBuf, options: GeofetchOptions) -> Self {
        Self { program, options }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn args(&self, accession: &GseAccession, destination: &Path) -> Vec<String> {
        let mut args = vec!["--just-metadata".to_string()];
        if self.options.discard_soft {
            args.push("--discard-soft".to_string());
        }
        args.extend([
            "-i".to_string(),
            accession.as_str().to_string(),
            "-u".to_string(),
            destination.to_string_lossy().to_string(),
        ]);
        args
    }
}

impl MetadataMaterializer for GeofetchMaterializer {
    fn materialize(
        &self,
        accession: &GseAccession,
        destination: &Path,
    ) -> Result<MaterializeOutput, HarvestError> {
        fs::create_dir_all(destination).map_err(|err| HarvestError::Filesystem(err.to_string()))?;

        let tool_err = |message: String| HarvestError::ToolFailed {
            tool: TOOL.to_string(),
            accession: accession.to_string(),
            message,
        };
        let mut stdout = tempfile::tempfile().map_err(|err| tool_err(err.to_string()))?;
        let mut stderr = tempfile::tempfile().map_err(|err| tool_err(err.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(self.args(accession, destination))
            .stdin(Stdio::null())
            .stdout(stdout.try_clone().map_err(|err| tool_err(err.to_string()))?)
            .stderr(stderr.try_clone().map_err(|err| tool_err(err.to_string()))?)
            .spawn()
            .map_err(|err| tool_err(err.to_string()))?;

        let status = match wait_with_timeout(&mut child, self.options.timeout)
            .map_err(|err| tool_err(err.to_string()))?
        {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(HarvestError::ToolTimeout {
                    tool: TOOL.to_string(),
                    accession: accession.to_string(),
                    seconds: self.options.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                });
            }
        };

        let stderr_text = read_captured(&mut stderr);
        if status.success() {
            return Ok(MaterializeOutput {
                stderr: stderr_text,
            });
        }
        let message = if stderr_text.is_empty() {
            let stdout_text = read_captured(&mut stdout);
            if stdout_text.is_empty() {
                format!("exited with {status}")
            } else {
                stdout_text
            }
        } else {
            stderr_text
        };
        Err(tool_err(message))
    }
}

// `None` means the deadline passed before the child exited.
fn wait_with_timeout(
    child: &mut std::process::Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn read_captured(file: &mut fs::File) -> String {
    let mut bytes = Vec::new();
    if file.seek(SeekFrom::Start(0)).is_err() || file.read_to_end(&mut bytes).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&bytes).trim().to_string()
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.is_file() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}
