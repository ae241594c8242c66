use crate::adapters::manager::{AdapterResult, CommandOutcome};
use crate::execution::{
    ProcessExecutor, ProcessExitStatus, ProcessOutput, ProcessSpawnRequest, spawn_validated,
};
use crate::models::{CoreError, CoreErrorKind};

/// Captured output kept on a failed outcome; installers can be very chatty.
const MAX_CAPTURED_BYTES: usize = 64 * 1024;

/// Exit code recorded when a process ended without one (signal, timeout).
pub const NO_EXIT_CODE: i32 = -1;

pub(crate) fn run_and_collect_stdout(
    executor: &dyn ProcessExecutor,
    request: ProcessSpawnRequest,
) -> AdapterResult<String> {
    let source = request.source;
    let action = request.action;

    let output = run_to_completion(executor, request)?;

    match output.status {
        ProcessExitStatus::ExitCode(0) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
        ProcessExitStatus::ExitCode(code) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(CoreError::new(
                Some(source),
                Some(action),
                CoreErrorKind::ProcessFailure,
                format!("process exited with code {code}: {}", stderr.trim()),
            ))
        }
        ProcessExitStatus::Terminated => Err(CoreError::new(
            Some(source),
            Some(action),
            CoreErrorKind::ProcessFailure,
            "process was terminated by signal",
        )),
    }
}

/// Runs a listing command and returns stdout whatever the exit code.
///
/// `choco outdated` exits 2 when updates exist and winget uses non-zero codes
/// for "nothing applicable", so the exit code carries no failure signal here.
pub(crate) fn run_and_collect_listing(
    executor: &dyn ProcessExecutor,
    request: ProcessSpawnRequest,
) -> AdapterResult<String> {
    let source = request.source;
    let action = request.action;

    let output = run_to_completion(executor, request)?;

    match output.status {
        ProcessExitStatus::ExitCode(code) => {
            if code != 0 {
                tracing::debug!(%source, exit_code = code, "listing command exited non-zero");
            }
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        ProcessExitStatus::Terminated => Err(CoreError::new(
            Some(source),
            Some(action),
            CoreErrorKind::ProcessFailure,
            "listing process was terminated by signal",
        )),
    }
}

pub(crate) fn run_and_collect_outcome(
    executor: &dyn ProcessExecutor,
    request: ProcessSpawnRequest,
) -> AdapterResult<CommandOutcome> {
    let output = run_to_completion(executor, request)?;

    let exit_code = match output.status {
        ProcessExitStatus::ExitCode(code) => code,
        ProcessExitStatus::Terminated => NO_EXIT_CODE,
    };

    Ok(CommandOutcome {
        exit_code,
        output: combined_output(&output.stdout, &output.stderr),
    })
}

/// Version probes never fail; a missing or broken tool yields an empty string.
pub(crate) fn run_and_collect_version_output(
    executor: &dyn ProcessExecutor,
    request: ProcessSpawnRequest,
) -> String {
    run_and_collect_stdout(executor, request).unwrap_or_default()
}

fn run_to_completion(
    executor: &dyn ProcessExecutor,
    request: ProcessSpawnRequest,
) -> AdapterResult<ProcessOutput> {
    let process = spawn_validated(executor, request)?;

    let handle = tokio::runtime::Handle::try_current().map_err(|error| {
        CoreError::new(
            None,
            None,
            CoreErrorKind::Internal,
            format!("process execution requires a tokio runtime: {error}"),
        )
    })?;
    handle.block_on(process.wait())
}

fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).trim_end().to_string();
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim_end();
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(stderr);
    }

    if combined.len() > MAX_CAPTURED_BYTES {
        let mut cut = combined.len() - MAX_CAPTURED_BYTES;
        while !combined.is_char_boundary(cut) {
            cut += 1;
        }
        combined = combined[cut..].to_string();
    }

    combined
}

#[cfg(test)]
mod tests {
    use super::{MAX_CAPTURED_BYTES, combined_output};

    #[test]
    fn combines_stdout_then_stderr() {
        let combined = combined_output(b"Installing...\n", b"error 1603\n");
        assert_eq!(combined, "Installing...\nerror 1603");
    }

    #[test]
    fn keeps_tail_of_oversized_output() {
        let mut stdout = vec![b'a'; MAX_CAPTURED_BYTES];
        stdout.extend_from_slice(b"final line");
        let combined = combined_output(&stdout, b"");
        assert_eq!(combined.len(), MAX_CAPTURED_BYTES);
        assert!(combined.ends_with("final line"));
    }
}
