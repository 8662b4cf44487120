//! Isolated conda environment lifecycle.
//!
//! ```text
//! absent ──create──▶ created ──run──▶ created ──remove──▶ absent
//!                      │  ▲
//!                      └──┘ create again: reused, no tool call
//! ```

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;

use uuid::Uuid;

use crate::error::Result;
use crate::process::{CommandRunner, ToolCommand, ToolOutput};

/// Environment variable overriding the conda executable.
pub const CONDA_ENV: &str = "REPRONOTEBOOK_CONDA";

/// Prefix of every environment name derived by this tool.
pub const ENV_NAME_PREFIX: &str = "repronotebook";

/// Logical name of an isolated environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvironmentName(String);

impl EnvironmentName {
    /// Use an explicit name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive a name from the spec file contents and the run identifier.
    ///
    /// The result looks like `repronotebook-<spec hash>-<run prefix>`, so
    /// two runs never share an environment even for the same spec.
    pub fn for_run(spec_path: &Path, run_id: &Uuid) -> Result<Self> {
        let contents = fs::read(spec_path)?;
        let mut hasher = DefaultHasher::new();
        contents.hash(&mut hasher);

        let run = run_id.simple().to_string();
        Ok(Self(format!(
            "{}-{:016x}-{}",
            ENV_NAME_PREFIX,
            hasher.finish(),
            &run[..8]
        )))
    }

    /// The name as passed to conda.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How [`EnvironmentManager::create`] satisfied the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creation {
    /// A new environment was built from the spec
    Created,
    /// An environment with that name already existed
    Reused,
}

/// Manages conda environments through a [`CommandRunner`].
pub struct EnvironmentManager<R> {
    runner: R,
    conda: String,
}

impl<R: CommandRunner> EnvironmentManager<R> {
    /// Create a manager, honoring the `REPRONOTEBOOK_CONDA` override.
    pub fn new(runner: R) -> Self {
        let conda = std::env::var(CONDA_ENV).unwrap_or_else(|_| "conda".to_string());
        Self::with_program(runner, conda)
    }

    /// Create a manager that invokes `conda`.
    pub fn with_program(runner: R, conda: impl Into<String>) -> Self {
        Self {
            runner,
            conda: conda.into(),
        }
    }

    fn conda(&self) -> ToolCommand {
        ToolCommand::new(&self.conda)
    }

    /// Whether conda lists an environment called `name`.
    ///
    /// Always asks conda; the answer is never cached.
    pub async fn exists(&self, name: &EnvironmentName) -> Result<bool> {
        let output = self
            .runner
            .run(&self.conda().args(["env", "list"]))
            .await?
            .into_result(&self.conda)?;

        Ok(output
            .stdout
            .lines()
            .any(|line| line.split_whitespace().any(|token| token == name.as_str())))
    }

    /// Create `name` from `spec` unless it already exists.
    ///
    /// An existing environment is reused as-is; it is not checked against
    /// `spec`.
    pub async fn create(&self, spec: &Path, name: &EnvironmentName) -> Result<Creation> {
        if self.exists(name).await? {
            tracing::info!("Reusing existing environment {}", name);
            return Ok(Creation::Reused);
        }

        let command = self.conda().args(["env", "create", "-f"]).args([
            spec.display().to_string(),
            "-n".to_string(),
            name.to_string(),
        ]);
        self.runner.run(&command).await?.into_result(&self.conda)?;

        tracing::info!("Created environment {} from {}", name, spec.display());
        Ok(Creation::Created)
    }

    /// Execute `notebook` inside `name`, overwriting it with the executed copy.
    pub async fn run_notebook_in_place(
        &self,
        notebook: &Path,
        name: &EnvironmentName,
    ) -> Result<ToolOutput> {
        let command = self
            .conda()
            .args(["run", "-n"])
            .arg(name.as_str())
            .args(["jupyter", "nbconvert", "--to", "notebook", "--execute", "--inplace"])
            .arg(notebook.display().to_string());

        self.runner.run(&command).await?.into_result(&self.conda)
    }

    /// Delete `name`. Removing an absent environment is a tool failure.
    pub async fn remove(&self, name: &EnvironmentName) -> Result<()> {
        let command = self
            .conda()
            .args(["env", "remove", "-n"])
            .arg(name.as_str())
            .arg("--yes");
        self.runner.run(&command).await?.into_result(&self.conda)?;

        tracing::info!("Removed environment {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Simulates conda: tracks environments and records every call.
    #[derive(Default)]
    struct FakeConda {
        envs: Mutex<Vec<String>>,
        calls: Mutex<Vec<Vec<String>>>,
        fail_create: bool,
    }

    impl FakeConda {
        fn calls_starting_with(&self, prefix: &[&str]) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|args| args.len() >= prefix.len() && args[..prefix.len()] == *prefix)
                .count()
        }
    }

    fn exit(status: i32, stdout: String, stderr: &str) -> ToolOutput {
        ToolOutput {
            status: Some(status),
            stdout,
            stderr: stderr.to_string(),
        }
    }

    impl CommandRunner for FakeConda {
        async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(command.args.clone());
            let args: Vec<&str> = command.args.iter().map(String::as_str).collect();

            let output = match args.as_slice() {
                ["env", "list"] => {
                    let mut listing = "# conda environments:\n#\nbase  *  /opt/conda\n".to_string();
                    for env in self.envs.lock().unwrap().iter() {
                        listing.push_str(&format!("{}  /opt/conda/envs/{}\n", env, env));
                    }
                    exit(0, listing, "")
                }
                ["env", "create", "-f", _, "-n", name] => {
                    if self.fail_create {
                        exit(1, String::new(), "ResolvePackageNotFound: nosuchpkg")
                    } else {
                        self.envs.lock().unwrap().push(name.to_string());
                        exit(0, String::new(), "")
                    }
                }
                ["env", "remove", "-n", name, "--yes"] => {
                    let mut envs = self.envs.lock().unwrap();
                    match envs.iter().position(|env| env.as_str() == *name) {
                        Some(idx) => {
                            envs.remove(idx);
                            exit(0, String::new(), "")
                        }
                        None => exit(1, String::new(), "EnvironmentLocationNotFound"),
                    }
                }
                ["run", "-n", _, "jupyter", "nbconvert", ..] => exit(0, String::new(), "executed"),
                _ => exit(127, String::new(), "unexpected command"),
            };
            Ok(output)
        }
    }

    fn name() -> EnvironmentName {
        EnvironmentName::new("repronotebook-test")
    }

    #[tokio::test]
    async fn test_create_twice_invokes_tool_once() {
        let manager = EnvironmentManager::with_program(FakeConda::default(), "conda");
        let spec = Path::new("environment.yml");

        assert_eq!(manager.create(spec, &name()).await.unwrap(), Creation::Created);
        assert_eq!(manager.create(spec, &name()).await.unwrap(), Creation::Reused);
        assert_eq!(manager.runner.calls_starting_with(&["env", "create"]), 1);
    }

    #[tokio::test]
    async fn test_exists_matches_whole_tokens() {
        let runner = FakeConda::default();
        runner.envs.lock().unwrap().push("repronotebook-test-2".to_string());
        let manager = EnvironmentManager::with_program(runner, "conda");

        assert!(!manager.exists(&name()).await.unwrap());
        assert!(manager.exists(&EnvironmentName::new("base")).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_failure_carries_stderr() {
        let runner = FakeConda {
            fail_create: true,
            ..Default::default()
        };
        let manager = EnvironmentManager::with_program(runner, "conda");

        let err = manager
            .create(Path::new("environment.yml"), &name())
            .await
            .unwrap_err();
        match err {
            Error::Subprocess { stderr, .. } => assert!(stderr.contains("nosuchpkg")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_run_and_remove() {
        let manager = EnvironmentManager::with_program(FakeConda::default(), "conda");
        manager.create(Path::new("environment.yml"), &name()).await.unwrap();

        let output = manager
            .run_notebook_in_place(Path::new("conda_execution/nb.ipynb"), &name())
            .await
            .unwrap();
        assert_eq!(output.stderr, "executed");

        manager.remove(&name()).await.unwrap();
        assert!(!manager.exists(&name()).await.unwrap());

        // Removing again is a tool failure.
        assert!(manager.remove(&name()).await.is_err());
    }

    #[test]
    fn test_name_for_run() {
        let temp = TempDir::new().unwrap();
        let spec = temp.path().join("environment.yml");
        fs::write(&spec, "name: x\ndependencies:\n  - numpy\n").unwrap();

        let run_a = Uuid::new_v4();
        let run_b = Uuid::new_v4();
        let a = EnvironmentName::for_run(&spec, &run_a).unwrap();
        let a_again = EnvironmentName::for_run(&spec, &run_a).unwrap();
        let b = EnvironmentName::for_run(&spec, &run_b).unwrap();

        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("repronotebook-"));
        assert!(a.as_str().ends_with(&run_a.simple().to_string()[..8]));

        assert!(EnvironmentName::for_run(&temp.path().join("missing.yml"), &run_a).is_err());
    }
}
