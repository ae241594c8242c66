use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::adapters::process_utils::run_and_collect_stdout;
use crate::execution::{CommandSpec, ProcessExecutor, ProcessSpawnRequest};
use crate::models::{SourceAction, SourceId};

#[cfg(windows)]
const LOOKUP_COMMAND: &str = "where.exe";
#[cfg(not(windows))]
const LOOKUP_COMMAND: &str = "which";

const DEFAULT_PATHEXT: &str = ".COM;.EXE;.BAT;.CMD";

/// Resolves `binary_name` through the platform lookup command, then by
/// scanning `extra_paths` and `PATH` directly.
pub(crate) fn which_executable(
    executor: &dyn ProcessExecutor,
    binary_name: &str,
    extra_paths: &[PathBuf],
    source: SourceId,
) -> Option<PathBuf> {
    which_executable_via_lookup(executor, binary_name, source)
        .or_else(|| discover_executable_path(binary_name, extra_paths))
}

fn which_executable_via_lookup(
    executor: &dyn ProcessExecutor,
    binary_name: &str,
    source: SourceId,
) -> Option<PathBuf> {
    let request = ProcessSpawnRequest::new(
        source,
        SourceAction::Detect,
        CommandSpec::new(LOOKUP_COMMAND).arg(binary_name),
    );

    match run_and_collect_stdout(executor, request) {
        // `where.exe` prints every match; the first one is what a shell would run.
        Ok(output) => output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from),
        Err(_) => None,
    }
}

pub(crate) fn discover_executable_path(
    binary_name: &str,
    extra_paths: &[PathBuf],
) -> Option<PathBuf> {
    if binary_name.trim().is_empty() {
        return None;
    }

    if binary_name.contains('/') || binary_name.contains('\\') {
        let absolute = PathBuf::from(binary_name);
        return absolute.is_file().then_some(absolute);
    }

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    let names = executable_names(binary_name);

    let mut dirs: Vec<PathBuf> = extra_paths.to_vec();
    if let Some(path_var) = std::env::var_os("PATH") {
        dirs.extend(std::env::split_paths(&path_var));
    }

    for dir in dirs {
        for name in &names {
            push_candidate_path(dir.join(name), &mut candidates, &mut seen);
        }
    }

    candidates.into_iter().find(|candidate| candidate.is_file())
}

/// `winget` resolves to `winget.exe` on Windows; elsewhere the name is used as is.
fn executable_names(binary_name: &str) -> Vec<String> {
    if !cfg!(windows) || Path::new(binary_name).extension().is_some() {
        return vec![binary_name.to_string()];
    }

    let pathext = std::env::var("PATHEXT").unwrap_or_else(|_| DEFAULT_PATHEXT.to_string());
    pathext
        .split(';')
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!("{binary_name}{}", ext.to_ascii_lowercase()))
        .collect()
}

fn push_candidate_path(
    candidate: PathBuf,
    candidates: &mut Vec<PathBuf>,
    seen: &mut HashSet<String>,
) {
    let rendered = candidate.to_string_lossy().to_string();
    if rendered.is_empty() {
        return;
    }

    if seen.insert(rendered) {
        candidates.push(candidate);
    }
}

/// Install locations that are frequently missing from a service account's PATH.
pub(crate) fn source_bin_roots(source: SourceId) -> Vec<PathBuf> {
    let mut roots = Vec::new();

    match source {
        SourceId::Winget | SourceId::Store => {
            if let Some(local) = std::env::var_os("LOCALAPPDATA").map(PathBuf::from) {
                roots.push(local.join("Microsoft").join("WindowsApps"));
            }
        }
        SourceId::Chocolatey => {
            if let Some(install) = std::env::var_os("ChocolateyInstall").map(PathBuf::from) {
                roots.push(install.join("bin"));
            }
            if let Some(program_data) = std::env::var_os("ProgramData").map(PathBuf::from) {
                roots.push(program_data.join("chocolatey").join("bin"));
            }
        }
    }

    roots
}
