use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::adapters::manager::{AdapterResult, CommandOutcome, SourceAdapter};
use crate::execution::{CommandSpec, ProcessSpawnRequest};
use crate::models::{
    Capability, DetectionInfo, PackageRecord, SourceAction, SourceDescriptor, SourceId,
};

const WINGET_CAPABILITIES: &[Capability] = &[
    Capability::Detect,
    Capability::ListOutdated,
    Capability::Upgrade,
    Capability::Install,
];

pub(crate) const WINGET_DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: SourceId::Winget,
    display_name: "Winget",
    capabilities: WINGET_CAPABILITIES,
};

pub(crate) const WINGET_COMMAND: &str = "winget";
pub(crate) const DETECT_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const LIST_TIMEOUT: Duration = Duration::from_secs(120);

/// Flags that keep winget from prompting on a headless run.
const NON_INTERACTIVE_FLAGS: &[&str] = &["--accept-source-agreements", "--disable-interactivity"];

/// A data row: name, id, installed version, available version, optional source.
/// Version tokens must carry a digit so prose lines and localized headers
/// never qualify. Winget prints `< 1.2` or `Unknown` for unresolved installs.
static ROW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<name>\S.*?)\s+(?P<id>\S+)\s+(?P<current>(?:<\s*)?\S*\d\S*|Unknown)\s+(?P<available>\S*\d\S*)(?:\s+(?P<source>[A-Za-z][\w-]*))?\s*$",
    )
    .unwrap()
});

static VERSION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:<\s*)?\S*\d\S*$|^Unknown$").unwrap());

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WingetDetectOutput {
    pub executable_path: Option<PathBuf>,
    pub version_output: String,
}

pub trait WingetSource: Send + Sync {
    fn detect(&self) -> AdapterResult<WingetDetectOutput>;
    fn list_upgradeable(&self) -> AdapterResult<String>;
    fn upgrade(&self, package_id: &str) -> AdapterResult<CommandOutcome>;
    fn install_version(&self, package_id: &str, version: &str) -> AdapterResult<CommandOutcome>;
}

pub struct WingetAdapter<S: WingetSource> {
    source: S,
}

impl<S: WingetSource> WingetAdapter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: WingetSource> SourceAdapter for WingetAdapter<S> {
    fn descriptor(&self) -> &SourceDescriptor {
        &WINGET_DESCRIPTOR
    }

    fn detect(&self) -> AdapterResult<DetectionInfo> {
        let output = self.source.detect()?;
        let version = parse_winget_version(&output.version_output);
        let installed = output.executable_path.is_some() || version.is_some();
        Ok(DetectionInfo {
            installed,
            executable_path: output.executable_path,
            version,
        })
    }

    fn list_upgradeable(&self) -> AdapterResult<Vec<PackageRecord>> {
        let raw = self.source.list_upgradeable()?;
        Ok(parse_winget_upgrade_table(&raw))
    }

    fn upgrade_one(&self, package_id: &str) -> AdapterResult<CommandOutcome> {
        self.source.upgrade(package_id)
    }

    fn install_version(&self, package_id: &str, version: &str) -> AdapterResult<CommandOutcome> {
        self.source.install_version(package_id, version)
    }
}

pub fn winget_detect_request() -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        SourceId::Winget,
        SourceAction::Detect,
        CommandSpec::new(WINGET_COMMAND).arg("--version"),
    )
    .timeout(DETECT_TIMEOUT)
}

/// `winget upgrade` scoped to one catalog; `msstore` is reported under the Store source.
pub fn winget_list_upgradeable_request(
    source: SourceId,
    catalog: &str,
    timeout: Duration,
) -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        source,
        SourceAction::ListOutdated,
        CommandSpec::new(WINGET_COMMAND)
            .args(["upgrade", "--source", catalog])
            .args(NON_INTERACTIVE_FLAGS.iter().copied()),
    )
    .timeout(timeout)
}

/// Single-package upgrade. `--exact` stops winget from resolving the id as a
/// substring of some other package.
pub fn winget_upgrade_request(
    source: SourceId,
    catalog: &str,
    package_id: &str,
    timeout: Option<Duration>,
) -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        source,
        SourceAction::Upgrade,
        CommandSpec::new(WINGET_COMMAND)
            .args(["upgrade", "--id", package_id, "--exact", "--source", catalog])
            .args(["--silent", "--accept-package-agreements"])
            .args(NON_INTERACTIVE_FLAGS.iter().copied()),
    )
    .maybe_timeout(timeout)
}

pub fn winget_install_version_request(
    package_id: &str,
    version: &str,
    timeout: Option<Duration>,
) -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        SourceId::Winget,
        SourceAction::Install,
        CommandSpec::new(WINGET_COMMAND)
            .args(["install", "--id", package_id, "--exact", "--version", version])
            .args(["--force", "--silent", "--accept-package-agreements"])
            .args(NON_INTERACTIVE_FLAGS.iter().copied()),
    )
    .maybe_timeout(timeout)
}

fn parse_winget_version(output: &str) -> Option<String> {
    // `winget --version` prints e.g. "v1.7.10861"
    let line = output.lines().map(str::trim).find(|line| !line.is_empty())?;
    let version = line.strip_prefix('v').unwrap_or(line);
    version
        .chars()
        .next()
        .filter(char::is_ascii_digit)
        .map(|_| version.to_owned())
}

/// Column start offsets (in chars) taken from a header row.
#[derive(Clone, Debug, Eq, PartialEq)]
struct TableColumns {
    starts: Vec<usize>,
}

impl TableColumns {
    fn from_header(header: &str) -> Option<Self> {
        let chars: Vec<char> = header.chars().collect();
        let mut starts = Vec::new();
        for (index, ch) in chars.iter().enumerate() {
            let at_word_start = !ch.is_whitespace()
                && (index == 0 || chars[index - 1].is_whitespace());
            if at_word_start {
                starts.push(index);
            }
        }

        // Name, Id, Version, Available and an optional Source column.
        (4..=5).contains(&starts.len()).then_some(Self { starts })
    }

    fn slice(&self, row: &str) -> Option<Vec<String>> {
        let chars: Vec<char> = row.chars().collect();
        let mut fields = Vec::with_capacity(self.starts.len());
        for (position, start) in self.starts.iter().enumerate() {
            let end = self
                .starts
                .get(position + 1)
                .copied()
                .unwrap_or(chars.len())
                .min(chars.len());
            if *start > end {
                return None;
            }
            let field: String = chars[*start..end].iter().collect();
            fields.push(field.trim().to_string());
        }
        Some(fields)
    }
}

/// Parses `winget upgrade` output into records, in output order.
///
/// When a header/separator pair is present, rows are sliced at the header's
/// column offsets; a row that does not slice cleanly (wide characters shift
/// columns) falls back to [`ROW_PATTERN`]. Lines that fit neither are noise.
pub(crate) fn parse_winget_upgrade_table(output: &str) -> Vec<PackageRecord> {
    let lines: Vec<&str> = output.lines().map(strip_progress_residue).collect();

    let mut records = Vec::new();
    let mut columns: Option<TableColumns> = None;

    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() || is_separator(line) {
            continue;
        }

        if lines.get(index + 1).is_some_and(|next| is_separator(next)) {
            columns = TableColumns::from_header(line);
            continue;
        }

        let record = columns
            .as_ref()
            .and_then(|columns| parse_sliced_row(columns, line))
            .or_else(|| parse_pattern_row(line));

        if let Some(record) = record {
            records.push(record);
        }
    }

    records
}

fn parse_sliced_row(columns: &TableColumns, line: &str) -> Option<PackageRecord> {
    let fields = columns.slice(line)?;
    let name = fields.first()?;
    let id = fields.get(1)?;
    let current = fields.get(2)?;
    let available = fields.get(3)?;

    if id.is_empty() || id.contains(char::is_whitespace) {
        return None;
    }
    if !VERSION_TOKEN.is_match(current) || !VERSION_TOKEN.is_match(available) {
        return None;
    }

    build_record(name, id, current, available)
}

fn parse_pattern_row(line: &str) -> Option<PackageRecord> {
    let captures = ROW_PATTERN.captures(line.trim())?;
    build_record(
        captures.name("name")?.as_str(),
        captures.name("id")?.as_str(),
        captures.name("current")?.as_str(),
        captures.name("available")?.as_str(),
    )
}

fn build_record(name: &str, id: &str, current: &str, available: &str) -> Option<PackageRecord> {
    let name = name.trim();
    let id = id.trim();
    if id.is_empty() || is_header_token(name) || is_header_token(id) {
        return None;
    }

    Some(PackageRecord {
        name: if name.is_empty() { id } else { name }.to_string(),
        id: id.to_string(),
        current_version: current.trim().to_string(),
        available_version: available.trim().to_string(),
        pinned: false,
    })
}

fn is_header_token(value: &str) -> bool {
    let leading = value.split_whitespace().next().unwrap_or_default();
    leading == "Name" || leading == "Id"
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|ch| ch == '-' || ch == '─')
}

/// Winget redraws its spinner with carriage returns; keep what follows the last one.
fn strip_progress_residue(line: &str) -> &str {
    line.rsplit('\r').next().unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use crate::adapters::manager::{AdapterResult, CommandOutcome, SourceAdapter};

    use super::{
        WingetAdapter, WingetDetectOutput, WingetSource, parse_winget_upgrade_table,
        parse_winget_version, winget_upgrade_request,
    };
    use crate::models::SourceId;

    const TABLE_WITH_SOURCE: &str = "\
Name                              Id                         Version       Available     Source
--------------------------------------------------------------------------------------------------
7-Zip 22.01 (x64)                 7zip.7zip                  22.01         23.01         winget
Git                               Git.Git                    2.42.0.2      2.43.0        winget
Microsoft Visual C++ 2015-2022 …  Microsoft.VCRedist.2015+.x64 14.36.32532.0 14.38.33130.0 winget
3 upgrades available.
";

    const TABLE_WITHOUT_SOURCE: &str = "\
   - \r   \\ \rName               Id                   Version      Available
----------------------------------------------------------------------
Mozilla Firefox    Mozilla.Firefox      119.0        120.0.1
Notepad++          Notepad++.Notepad++  < 8.5.8      8.6
2 upgrades available.
";

    const EXPLICIT_TARGETING: &str = "\
Name      Id           Version  Available Source
-------------------------------------------------
Git       Git.Git      2.42.0   2.43.0    winget
1 upgrades available.

The following packages have an upgrade available, but require explicit targeting for upgrade:
Name      Id           Version  Available Source
-------------------------------------------------
Discord   Discord.Discord Unknown 1.0.9030 winget
";

    #[test]
    fn parses_table_with_source_column() {
        let records = parse_winget_upgrade_table(TABLE_WITH_SOURCE);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].name, "7-Zip 22.01 (x64)");
        assert_eq!(records[0].id, "7zip.7zip");
        assert_eq!(records[0].current_version, "22.01");
        assert_eq!(records[0].available_version, "23.01");
        assert_eq!(records[1].id, "Git.Git");
        assert!(records.iter().all(|record| !record.pinned));
    }

    #[test]
    fn falls_back_to_pattern_when_columns_shift() {
        // The VCRedist id overflows its column, so slicing fails for that row.
        let records = parse_winget_upgrade_table(TABLE_WITH_SOURCE);
        assert_eq!(records[2].id, "Microsoft.VCRedist.2015+.x64");
        assert_eq!(records[2].current_version, "14.36.32532.0");
        assert_eq!(records[2].available_version, "14.38.33130.0");
    }

    #[test]
    fn parses_table_without_source_column_and_spinner_residue() {
        let records = parse_winget_upgrade_table(TABLE_WITHOUT_SOURCE);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Mozilla Firefox");
        assert_eq!(records[0].id, "Mozilla.Firefox");
        assert_eq!(records[1].id, "Notepad++.Notepad++");
        assert_eq!(records[1].current_version, "< 8.5.8");
    }

    #[test]
    fn parses_rows_after_explicit_targeting_banner() {
        let records = parse_winget_upgrade_table(EXPLICIT_TARGETING);
        let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["Git.Git", "Discord.Discord"]);
        assert_eq!(records[1].current_version, "Unknown");
    }

    #[test]
    fn headerless_rows_use_pattern() {
        let records = parse_winget_upgrade_table(
            "Google Chrome  Google.Chrome  119.0.6045.160  120.0.6099.71  winget\n",
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Google Chrome");
        assert_eq!(records[0].id, "Google.Chrome");
    }

    #[test]
    fn rejects_header_named_rows_and_noise() {
        let records = parse_winget_upgrade_table(
            "Name Id 1.0 2.0\nId Name 1.0 2.0\nNo installed package found matching input criteria.\n",
        );
        assert!(records.is_empty());
    }

    #[test]
    fn parsing_is_deterministic() {
        assert_eq!(
            parse_winget_upgrade_table(TABLE_WITH_SOURCE),
            parse_winget_upgrade_table(TABLE_WITH_SOURCE)
        );
    }

    #[test]
    fn parses_winget_version_banner() {
        assert_eq!(
            parse_winget_version("v1.7.10861\n").as_deref(),
            Some("1.7.10861")
        );
        assert_eq!(parse_winget_version("not a version"), None);
    }

    #[test]
    fn upgrade_request_targets_exact_id() {
        let request = winget_upgrade_request(SourceId::Winget, "winget", "7zip.7zip", None);
        let args = &request.command.args;
        let id_position = args.iter().position(|arg| arg == "--id").unwrap();
        assert_eq!(args[id_position + 1], "7zip.7zip");
        assert!(args.contains(&"--exact".to_string()));
        assert!(args.contains(&"--silent".to_string()));
        assert!(request.timeout.is_none());
    }

    #[test]
    fn adapter_passes_exact_package_id_to_source() {
        let source = FixtureSource::default();
        let adapter = WingetAdapter::new(source);

        let outcome = adapter.upgrade_one("7zip.7zip").unwrap();

        assert!(outcome.succeeded());
        assert_eq!(
            *adapter.source.upgraded.lock().unwrap(),
            vec!["7zip.7zip".to_string()]
        );
    }

    #[test]
    fn adapter_detects_from_version_when_path_unknown() {
        let adapter = WingetAdapter::new(FixtureSource::default());
        let info = adapter.detect().unwrap();
        assert!(info.installed);
        assert_eq!(info.version.as_deref(), Some("1.7.10861"));
        assert!(adapter.is_available());
    }

    #[derive(Default)]
    struct FixtureSource {
        upgraded: Mutex<Vec<String>>,
    }

    impl WingetSource for FixtureSource {
        fn detect(&self) -> AdapterResult<WingetDetectOutput> {
            Ok(WingetDetectOutput {
                executable_path: None::<PathBuf>,
                version_output: "v1.7.10861".to_string(),
            })
        }

        fn list_upgradeable(&self) -> AdapterResult<String> {
            Ok(TABLE_WITH_SOURCE.to_string())
        }

        fn upgrade(&self, package_id: &str) -> AdapterResult<CommandOutcome> {
            self.upgraded.lock().unwrap().push(package_id.to_string());
            Ok(CommandOutcome {
                exit_code: 0,
                output: "Successfully installed".to_string(),
            })
        }

        fn install_version(
            &self,
            _package_id: &str,
            _version: &str,
        ) -> AdapterResult<CommandOutcome> {
            Ok(CommandOutcome {
                exit_code: 0,
                output: String::new(),
            })
        }
    }
}
