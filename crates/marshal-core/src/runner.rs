use crate::error::RunnerError;
use std::path::Path;
use std::process::{Command, Stdio};

const OUTPUT_LIMIT: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl RunOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Narrow seam over subprocess execution so the interceptor, the
/// reconciler, and the sync manager can be exercised with a fake
/// runner instead of real binaries.
pub trait ProcessRunner {
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<RunOutput, RunnerError>;

    /// Force a fresh issue export to `dest`, flushing any
    /// daemon-buffered writes. Returns the export's exit code.
    fn export(&self, program: &str, dest: &Path, cwd: &Path) -> Result<i32, RunnerError>;
}

pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<RunOutput, RunnerError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = command.spawn().map_err(|err| RunnerError::Spawn {
            program: program.to_string(),
            reason: err.to_string(),
        })?;
        let output = child.wait_with_output().map_err(|err| RunnerError::Io {
            program: program.to_string(),
            reason: err.to_string(),
        })?;

        Ok(RunOutput {
            stdout: limit_output(output.stdout),
            stderr: limit_output(output.stderr),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    fn export(&self, program: &str, dest: &Path, cwd: &Path) -> Result<i32, RunnerError> {
        let args = vec![
            "export".to_string(),
            "--flush".to_string(),
            "-o".to_string(),
            dest.display().to_string(),
        ];
        let output = self.run(program, &args, cwd)?;
        Ok(output.exit_code)
    }
}

fn limit_output(mut data: Vec<u8>) -> String {
    if data.len() > OUTPUT_LIMIT {
        data.truncate(OUTPUT_LIMIT);
    }
    String::from_utf8_lossy(&data).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_output_truncates() {
        let data = vec![b'a'; OUTPUT_LIMIT + 10];
        let out = limit_output(data);
        assert_eq!(out.len(), OUTPUT_LIMIT);
    }

    #[test]
    fn test_run_captures_exit_code() {
        let runner = SystemRunner;
        let output = runner
            .run("sh", &["-c".to_string(), "exit 3".to_string()], Path::new("."))
            .unwrap();
        assert_eq!(output.exit_code, 3);
        assert!(!output.succeeded());
    }

    #[test]
    fn test_run_captures_stdout() {
        let runner = SystemRunner;
        let output = runner
            .run(
                "sh",
                &["-c".to_string(), "echo hello".to_string()],
                Path::new("."),
            )
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.succeeded());
    }
}
