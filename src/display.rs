use core::fmt;

use crate::feature::{ActionableFeedback, FeatureStatus, FeatureValue};
use crate::flow::FlowClass;
use crate::model::ModelInfo;
use crate::output::Assessment;

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            FeatureStatus::Computed => "computed",
            FeatureStatus::ImageTooSmall => "image too small",
            FeatureStatus::EmptyRoi => "empty ROI",
            FeatureStatus::ExtractionFailed => "extraction failed",
        })
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.status.is_failure() {
            write!(f, "{} = {} ({})", self.id, self.value, self.status)
        } else {
            write!(f, "{} = {}", self.id, self.value)
        }
    }
}

impl fmt::Display for ActionableFeedback {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.value)
    }
}

impl fmt::Display for FlowClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            FlowClass::Background => "background",
            FlowClass::LowFlow => "low-flow",
            FlowClass::HighFlow => "high-flow",
        })
    }
}

impl fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} ({}), trained by {}", self.name, self.version, self.description, self.trainer)
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "score {} from {} features ({} failed)",
            self.score,
            self.features.len(),
            self.features.failed_count()
        )
    }
}
