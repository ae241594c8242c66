use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use winup_core::adapters::{ProcessWingetSource, SourceAdapter, WingetAdapter};
use winup_core::config::SourceSettings;
use winup_core::execution::{
    ExecutionResult, ProcessExecutor, ProcessExitStatus, ProcessOutput, ProcessSpawnRequest,
    ProcessWaitFuture, RunningProcess,
};
use winup_core::models::{CoreErrorKind, SourceAction, SourceId, SourceStatus};
use winup_core::pipeline::{RunMode, rollback_package, run_source};

const UPGRADE_FIXTURE: &str = include_str!("fixtures/winget/upgrade_available.txt");
const WINGET_PATH: &str = "/fake/bin/winget";

/// Answers lookup, version, listing and per-package commands like a host
/// with winget installed, recording every command line it sees.
struct ScriptedWinget {
    installed: bool,
    exit_codes: HashMap<&'static str, i32>,
    commands: Mutex<Vec<Vec<String>>>,
}

impl ScriptedWinget {
    fn installed() -> Self {
        Self {
            installed: true,
            exit_codes: HashMap::new(),
            commands: Mutex::new(Vec::new()),
        }
    }

    fn missing() -> Self {
        Self {
            installed: false,
            ..Self::installed()
        }
    }

    fn failing(mut self, package_id: &'static str, exit_code: i32) -> Self {
        self.exit_codes.insert(package_id, exit_code);
        self
    }

    fn winget_commands(&self) -> Vec<Vec<String>> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|command| command[0] == "winget")
            .cloned()
            .collect()
    }
}

struct FakeProcess {
    output: ProcessOutput,
}

impl RunningProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn wait(self: Box<Self>) -> ProcessWaitFuture {
        let output = self.output;
        Box::pin(async move { Ok(output) })
    }
}

fn finished(exit_code: i32, stdout: &str) -> ExecutionResult<Box<dyn RunningProcess>> {
    let now = SystemTime::now();
    Ok(Box::new(FakeProcess {
        output: ProcessOutput {
            status: ProcessExitStatus::ExitCode(exit_code),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            started_at: now,
            finished_at: now,
        },
    }))
}

impl ProcessExecutor for ScriptedWinget {
    fn spawn(&self, request: ProcessSpawnRequest) -> ExecutionResult<Box<dyn RunningProcess>> {
        let program = Path::new(&request.command.program)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let args = request.command.args.clone();

        let mut line = vec![program.clone()];
        line.extend(args.iter().cloned());
        self.commands.lock().unwrap().push(line);

        match program.as_str() {
            "which" | "where" if self.installed => finished(0, &format!("{WINGET_PATH}\n")),
            "which" | "where" => finished(1, ""),
            "winget" if !self.installed => Err(winup_core::models::CoreError::new(
                Some(request.source),
                Some(request.action),
                CoreErrorKind::ProcessFailure,
                "program not found",
            )),
            "winget" => match args.first().map(String::as_str) {
                Some("--version") => finished(0, "v1.7.10861\n"),
                Some("upgrade") | Some("install") => {
                    let Some(package_id) = argument_after(&args, "--id") else {
                        return finished(0, UPGRADE_FIXTURE);
                    };
                    match self.exit_codes.get(package_id) {
                        Some(code) => finished(
                            *code,
                            &format!("Installer failed with exit code: {code}\n"),
                        ),
                        None => finished(0, "Successfully installed\n"),
                    }
                }
                _ => finished(0, ""),
            },
            _ => finished(1, ""),
        }
    }
}

fn argument_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}

fn with_runtime<T>(operation: impl FnOnce() -> T) -> T {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let _guard = runtime.enter();
    operation()
}

fn adapter(executor: Arc<ScriptedWinget>) -> WingetAdapter<ProcessWingetSource> {
    WingetAdapter::new(ProcessWingetSource::new(executor))
}

#[test]
fn detects_winget_through_lookup_and_version() {
    let executor = Arc::new(ScriptedWinget::installed());
    let adapter = adapter(executor);

    let info = with_runtime(|| adapter.detect()).unwrap();

    assert!(info.installed);
    assert_eq!(info.executable_path, Some(PathBuf::from(WINGET_PATH)));
    assert_eq!(info.version.as_deref(), Some("1.7.10861"));
}

#[test]
fn upgrade_run_reports_each_package() {
    let executor = Arc::new(ScriptedWinget::installed().failing("Git.Git", 1603));
    let adapter = adapter(executor.clone());

    let run = with_runtime(|| run_source(&adapter, &SourceSettings::default(), RunMode::Upgrade));

    assert_eq!(run.summary.source, SourceId::Winget);
    assert_eq!(run.summary.status, SourceStatus::Partial);
    assert_eq!(run.summary.updated_count, 2);
    assert_eq!(
        run.summary.errors,
        vec!["Git.Git failed (exit code 1603)".to_string()]
    );
    assert_eq!(run.packages.len(), 3);

    let failed = run
        .outcomes
        .iter()
        .find(|outcome| outcome.package_id == "Git.Git")
        .unwrap();
    assert_eq!(failed.from_version, "2.42.0.2");
    assert_eq!(failed.to_version, "2.43.0");
    assert!(
        failed
            .error_output
            .as_deref()
            .unwrap()
            .contains("exit code: 1603")
    );

    let upgrades: Vec<Vec<String>> = executor
        .winget_commands()
        .into_iter()
        .filter(|command| command.iter().any(|arg| arg == "--id"))
        .collect();
    assert_eq!(upgrades.len(), 3);
    assert_eq!(
        &upgrades[0][1..8],
        &["upgrade", "--id", "7zip.7zip", "--exact", "--source", "winget", "--silent"]
    );
}

#[test]
fn excluded_packages_are_never_upgraded() {
    let executor = Arc::new(ScriptedWinget::installed());
    let adapter = adapter(executor.clone());
    let settings = SourceSettings {
        enabled: true,
        exclusions: vec!["mozilla.firefox".to_string()],
    };

    let run = with_runtime(|| run_source(&adapter, &settings, RunMode::Upgrade));

    assert_eq!(run.summary.status, SourceStatus::Success);
    assert_eq!(run.summary.updated_count, 2);
    assert!(
        executor
            .winget_commands()
            .iter()
            .all(|command| !command.iter().any(|arg| arg == "Mozilla.Firefox"))
    );
}

#[test]
fn list_only_enumerates_without_upgrading() {
    let executor = Arc::new(ScriptedWinget::installed());
    let adapter = adapter(executor.clone());

    let run = with_runtime(|| run_source(&adapter, &SourceSettings::default(), RunMode::ListOnly));

    assert_eq!(run.summary.status, SourceStatus::NotRun);
    assert_eq!(run.packages.len(), 3);
    assert!(run.outcomes.is_empty());
    assert!(
        executor
            .winget_commands()
            .iter()
            .all(|command| !command.iter().any(|arg| arg == "--id"))
    );
}

#[test]
fn missing_winget_is_unavailable_and_never_listed() {
    let executor = Arc::new(ScriptedWinget::missing());
    let adapter = adapter(executor.clone());

    let run = with_runtime(|| run_source(&adapter, &SourceSettings::default(), RunMode::Upgrade));

    assert_eq!(run.summary.status, SourceStatus::Unavailable);
    assert_eq!(run.summary.updated_count, 0);
    assert!(run.summary.errors.is_empty());
    assert!(
        executor
            .winget_commands()
            .iter()
            .all(|command| command[1] == "--version")
    );
}

#[test]
fn rollback_installs_exact_version() {
    let executor = Arc::new(ScriptedWinget::installed());
    let adapter = adapter(executor.clone());

    let outcome =
        with_runtime(|| rollback_package(&adapter, "Git.Git", "2.43.0", "2.42.0.2")).unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.to_version, "2.42.0.2");

    let install = executor
        .winget_commands()
        .into_iter()
        .find(|command| command[1] == "install")
        .unwrap();
    assert_eq!(
        &install[1..7],
        &["install", "--id", "Git.Git", "--exact", "--version", "2.42.0.2"]
    );
    assert!(install.iter().any(|arg| arg == "--force"));
}

#[test]
fn request_builders_tag_their_action() {
    let request = winup_core::adapters::winget_upgrade_request(
        SourceId::Winget,
        "winget",
        "Git.Git",
        None,
    );
    assert_eq!(request.action, SourceAction::Upgrade);
    assert_eq!(request.timeout, None);
}
