use std::path::PathBuf;

use tokio::process::Command;

/// Default interpreter for the merge program.
pub const DEFAULT_PROGRAM: &str = "python3";

/// Default script passed to [`DEFAULT_PROGRAM`].
///
/// The script must accept repeated `--finetune-output`, `--weight` and
/// `--density` flags; an argparse `nargs='+'` list flag keeps only the last
/// occurrence.
pub const DEFAULT_SCRIPT: &str = "scripts/model_merger.py";

/// How to launch the external merge program.
///
/// The request-derived flags are appended after `program_args`, so a
/// script-based deployment sets `program` to the interpreter and
/// `program_args` to the script path.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub program: String,
    pub program_args: Vec<String>,
    /// Working directory for the child process (inherits ours if `None`).
    pub working_dir: Option<PathBuf>,
}

impl RunnerConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            program_args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Base command with the program and its leading arguments.
    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.program_args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM).with_args([DEFAULT_SCRIPT])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_runs_merge_script_with_python() {
        let config = RunnerConfig::default();
        assert_eq!(config.program, "python3");
        assert_eq!(config.program_args, vec!["scripts/model_merger.py"]);
        assert!(config.working_dir.is_none());
    }

    #[test]
    fn builder_sets_args_and_dir() {
        let config = RunnerConfig::new("sh")
            .with_args(["stub.sh"])
            .with_working_dir("/tmp");
        assert_eq!(config.program_args, vec!["stub.sh"]);
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
    }
}
