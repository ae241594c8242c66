pub mod error;
pub mod exclusion;
pub mod history;
pub mod outcome;
pub mod package;
pub mod source;

pub use error::{CoreError, CoreErrorKind};
pub use exclusion::ExclusionSet;
pub use history::HistoryEntry;
pub use outcome::{SourceRun, SourceStatus, SourceSummary, UpgradeOutcome};
pub use package::PackageRecord;
pub use source::{Capability, DetectionInfo, SourceAction, SourceDescriptor, SourceId};
