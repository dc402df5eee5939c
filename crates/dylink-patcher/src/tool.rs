//! Patcher backed by an external patch tool
//!
//! The tool does the actual load-command rewriting and re-signing. It is
//! driven with one subcommand per operation:
//!
//! ```text
//! <tool> list   --bundle <path> --json
//! <tool> attach --bundle <path> [options] [--persist] <payload>...
//! <tool> detach --bundle <path> [options] [--persist] <payload>...
//! ```
//!
//! `list` prints a JSON array of library paths. Any non-zero exit is a
//! patch failure carrying the tool's stderr.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use dylink_core::prelude::*;
use dylink_core::{InjectStrategy, InjectionConfiguration};
use tokio::process::Command;
use tokio::time::timeout;

use crate::patcher::{BinaryPatcher, PatcherFactory};

/// Patch tool looked up on PATH when none is configured
pub const DEFAULT_PATCH_TOOL: &str = "dylink-patch";

/// Default timeout for a single tool invocation (re-signing can be slow)
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Captured output of one tool run
#[derive(Debug, Clone)]
struct ToolOutput {
    stdout: String,
    stderr: String,
}

/// Builds [`ToolPatcher`]s for bundles
#[derive(Debug, Clone)]
pub struct ToolPatcherFactory {
    command: String,
    timeout: Duration,
}

impl ToolPatcherFactory {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Resolve the configured command to an executable path
    pub fn resolve_program(&self) -> Result<PathBuf> {
        which::which(&self.command).map_err(|e| {
            debug!("Patch tool lookup for {} failed: {}", self.command, e);
            Error::ToolNotFound {
                command: self.command.clone(),
            }
        })
    }

    /// Whether the patch tool can be found at all
    pub fn is_available(&self) -> bool {
        self.resolve_program().is_ok()
    }
}

impl Default for ToolPatcherFactory {
    fn default() -> Self {
        Self::new(DEFAULT_PATCH_TOOL)
    }
}

impl PatcherFactory for ToolPatcherFactory {
    type Patcher = ToolPatcher;

    fn open(&self, bundle: &Path) -> Result<ToolPatcher> {
        let program = self.resolve_program()?;

        let bundle = dunce::canonicalize(bundle)
            .map_err(|e| Error::patcher_unavailable(bundle, e.to_string()))?;
        if !bundle.is_dir() {
            return Err(Error::patcher_unavailable(
                &bundle,
                "not an application bundle directory",
            ));
        }

        debug!("Opened patcher for {:?} using {:?}", bundle, program);
        Ok(ToolPatcher::new(program, bundle, self.timeout))
    }
}

/// Patcher that shells out to the patch tool for a single bundle
#[derive(Debug, Clone)]
pub struct ToolPatcher {
    program: PathBuf,
    bundle: PathBuf,
    timeout: Duration,
    app_id: String,
    team_id: String,
    options: InjectionConfiguration,
}

impl ToolPatcher {
    pub fn new(program: PathBuf, bundle: PathBuf, timeout: Duration) -> Self {
        Self {
            program,
            bundle,
            timeout,
            app_id: String::new(),
            team_id: String::new(),
            options: InjectionConfiguration::default(),
        }
    }

    pub fn bundle(&self) -> &Path {
        &self.bundle
    }

    fn list_args(&self, bundle: &Path) -> Vec<OsString> {
        vec![
            "list".into(),
            "--bundle".into(),
            bundle.as_os_str().to_owned(),
            "--json".into(),
        ]
    }

    fn mutation_args(&self, verb: &str, payloads: &[PathBuf], persist: bool) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            verb.into(),
            "--bundle".into(),
            self.bundle.as_os_str().to_owned(),
        ];

        if !self.app_id.is_empty() {
            args.push("--app-id".into());
            args.push(self.app_id.clone().into());
        }
        if !self.team_id.is_empty() {
            args.push("--team-id".into());
            args.push(self.team_id.clone().into());
        }
        if self.options.use_weak_reference {
            args.push("--weak".into());
        }
        if self.options.prefer_main_executable {
            args.push("--prefer-main-executable".into());
        }
        args.push("--strategy".into());
        args.push(self.options.strategy.as_str().into());
        if persist {
            args.push("--persist".into());
        }

        args.extend(payloads.iter().map(|p| p.as_os_str().to_owned()));
        args
    }

    async fn run(&self, args: Vec<OsString>) -> Result<ToolOutput> {
        let verb = args
            .first()
            .map(|a| a.to_string_lossy().into_owned())
            .unwrap_or_default();

        let output = timeout(self.timeout, run_tool(&self.program, &args))
            .await
            .map_err(|_| Error::patch(format!("Patch tool timed out during {}", verb)))??;

        Ok(output)
    }
}

impl BinaryPatcher for ToolPatcher {
    fn app_id(&self) -> &str {
        &self.app_id
    }

    fn set_app_id(&mut self, app_id: String) {
        self.app_id = app_id;
    }

    fn team_id(&self) -> &str {
        &self.team_id
    }

    fn set_team_id(&mut self, team_id: String) {
        self.team_id = team_id;
    }

    fn set_use_weak_reference(&mut self, enabled: bool) {
        self.options.use_weak_reference = enabled;
    }

    fn set_prefer_main_executable(&mut self, enabled: bool) {
        self.options.prefer_main_executable = enabled;
    }

    fn set_strategy(&mut self, strategy: InjectStrategy) {
        self.options.strategy = strategy;
    }

    async fn attached_libraries(&self, bundle: &Path) -> Result<Vec<PathBuf>> {
        let output = self.run(self.list_args(bundle)).await?;
        parse_list_output(&output.stdout)
    }

    async fn attach(&mut self, payloads: &[PathBuf], persist: bool) -> Result<()> {
        info!("Attaching {} payload(s) to {:?}", payloads.len(), self.bundle);
        let output = self
            .run(self.mutation_args("attach", payloads, persist))
            .await?;
        if !output.stderr.is_empty() {
            debug!("patch tool attach stderr: {}", output.stderr);
        }
        Ok(())
    }

    async fn detach(&mut self, payloads: &[PathBuf], persist: bool) -> Result<()> {
        info!("Detaching {} payload(s) from {:?}", payloads.len(), self.bundle);
        let output = self
            .run(self.mutation_args("detach", payloads, persist))
            .await?;
        if !output.stderr.is_empty() {
            debug!("patch tool detach stderr: {}", output.stderr);
        }
        Ok(())
    }
}

/// Run the patch tool to completion
async fn run_tool(program: &Path, args: &[OsString]) -> Result<ToolOutput> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ToolNotFound {
                    command: program.display().to_string(),
                }
            } else {
                Error::patch(format!("Failed to run patch tool: {}", e))
            }
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        let message = if stderr.is_empty() {
            format!("Patch tool exited with {}", output.status)
        } else {
            stderr
        };
        return Err(Error::patch(message));
    }

    Ok(ToolOutput { stdout, stderr })
}

/// Parse the JSON array printed by `list --json`
fn parse_list_output(stdout: &str) -> Result<Vec<PathBuf>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let entries: Vec<String> = serde_json::from_str(trimmed)
        .map_err(|e| Error::patch(format!("Unexpected patch tool list output: {}", e)))?;

    Ok(entries.into_iter().map(PathBuf::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_patcher() -> ToolPatcher {
        ToolPatcher::new(
            PathBuf::from("/usr/local/bin/dylink-patch"),
            PathBuf::from("/Apps/Game.app"),
            DEFAULT_TOOL_TIMEOUT,
        )
    }

    fn args_as_strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_parse_list_output() {
        let paths = parse_list_output(
            r#"["/Apps/Game.app/Frameworks/FIle.dylib", "/Apps/Game.app/Frameworks/a.dylib"]"#,
        )
        .unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(
            paths[0],
            PathBuf::from("/Apps/Game.app/Frameworks/FIle.dylib")
        );
    }

    #[test]
    fn test_parse_list_output_empty() {
        assert!(parse_list_output("").unwrap().is_empty());
        assert!(parse_list_output("  \n").unwrap().is_empty());
        assert!(parse_list_output("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_list_output_garbage() {
        let err = parse_list_output("Usage: dylink-patch <command>").unwrap_err();
        assert!(err.is_patch_error());
    }

    #[test]
    fn test_list_args() {
        let patcher = test_patcher();
        let args = args_as_strings(patcher.list_args(Path::new("/Apps/Game.app")));
        assert_eq!(args, vec!["list", "--bundle", "/Apps/Game.app", "--json"]);
    }

    #[test]
    fn test_attach_args_with_defaults() {
        let patcher = test_patcher();
        let args = args_as_strings(patcher.mutation_args(
            "attach",
            &[PathBuf::from("/tmp/FIle.dylib")],
            true,
        ));

        assert_eq!(args[0], "attach");
        assert!(args.contains(&"--weak".to_string()));
        assert!(!args.contains(&"--prefer-main-executable".to_string()));
        assert!(!args.contains(&"--app-id".to_string()));
        assert!(args.contains(&"--persist".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/FIle.dylib");

        let strategy_idx = args.iter().position(|a| a == "--strategy").unwrap();
        assert_eq!(args[strategy_idx + 1], "lexicographic");
    }

    #[test]
    fn test_detach_args_reflect_settings() {
        let mut patcher = test_patcher();
        patcher.set_app_id("com.example.game".to_string());
        patcher.set_team_id("ABCDE12345".to_string());
        patcher.set_use_weak_reference(false);
        patcher.set_prefer_main_executable(true);
        patcher.set_strategy(InjectStrategy::Postorder);

        let args = args_as_strings(patcher.mutation_args(
            "detach",
            &[
                PathBuf::from("/Apps/Game.app/Frameworks/FIle.dylib"),
                PathBuf::from("/Apps/Game.app/PlugIns/FIle.dylib"),
            ],
            false,
        ));

        assert_eq!(args[0], "detach");
        assert!(!args.contains(&"--weak".to_string()));
        assert!(args.contains(&"--prefer-main-executable".to_string()));
        assert!(!args.contains(&"--persist".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "--app-id" && w[1] == "com.example.game"));
        assert!(args.windows(2).any(|w| w[0] == "--team-id" && w[1] == "ABCDE12345"));
        assert!(args.windows(2).any(|w| w[0] == "--strategy" && w[1] == "postorder"));
        assert_eq!(args.len(), 12);
    }

    #[test]
    fn test_new_patcher_has_empty_identity() {
        let patcher = test_patcher();
        assert!(patcher.app_id().is_empty());
        assert!(patcher.team_id().is_empty());
    }

    #[test]
    fn test_factory_missing_tool() {
        let factory = ToolPatcherFactory::new("dylink-patch-definitely-not-installed");
        let temp = tempdir().unwrap();

        let err = factory.open(temp.path()).unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
        assert!(!factory.is_available());
    }

    #[test]
    fn test_factory_default_command() {
        let factory = ToolPatcherFactory::default();
        assert_eq!(factory.command(), DEFAULT_PATCH_TOOL);
    }
}
