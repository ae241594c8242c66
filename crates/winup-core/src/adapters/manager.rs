use crate::models::{
    CoreError, CoreErrorKind, DetectionInfo, PackageRecord, SourceAction, SourceDescriptor,
};

pub type AdapterResult<T> = Result<T, CoreError>;

/// Exit code and combined stdout/stderr of a mutating command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub output: String,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnumerationMode {
    /// The source reports individual upgradeable packages.
    PerPackage,
    /// The source can only be asked to run its own opaque update scan.
    ScanOnly,
}

pub trait SourceAdapter: Send + Sync {
    fn descriptor(&self) -> &SourceDescriptor;

    fn detect(&self) -> AdapterResult<DetectionInfo>;

    /// Never fails: a missing tool is an expected host state.
    fn is_available(&self) -> bool {
        match self.detect() {
            Ok(info) => info.installed,
            Err(error) => {
                tracing::debug!(
                    source = %self.descriptor().id,
                    error = %error,
                    "availability probe failed"
                );
                false
            }
        }
    }

    fn enumeration_mode(&self) -> EnumerationMode {
        EnumerationMode::PerPackage
    }

    /// Parsed, unfiltered upgrade candidates in tool order.
    fn list_upgradeable(&self) -> AdapterResult<Vec<PackageRecord>>;

    /// Upgrades exactly `package_id`. A non-zero exit code is a normal
    /// return, not an error.
    fn upgrade_one(&self, package_id: &str) -> AdapterResult<CommandOutcome>;

    fn install_version(&self, _package_id: &str, _version: &str) -> AdapterResult<CommandOutcome> {
        Err(unsupported(self.descriptor(), SourceAction::Install))
    }

    fn trigger_scan(&self) -> AdapterResult<()> {
        Err(unsupported(self.descriptor(), SourceAction::Scan))
    }
}

pub fn ensure_action_supported(
    descriptor: &SourceDescriptor,
    action: SourceAction,
) -> AdapterResult<()> {
    if descriptor.supports(action.capability()) {
        Ok(())
    } else {
        Err(unsupported(descriptor, action))
    }
}

fn unsupported(descriptor: &SourceDescriptor, action: SourceAction) -> CoreError {
    CoreError::new(
        Some(descriptor.id),
        Some(action),
        CoreErrorKind::UnsupportedCapability,
        format!("{} does not support {action:?}", descriptor.display_name),
    )
}
