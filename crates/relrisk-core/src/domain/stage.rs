//! Per-request pipeline stages.

use serde::{Deserialize, Serialize};

/// Stage of a single assessment request.
///
/// Transitions run strictly forward except for the retry edge from
/// `CallingModel`/`Parsing` back to `CallingModel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStage {
    BuildingContext,
    RenderingPrompt,
    CallingModel,
    Parsing,
    Policy,
    Done,
}

impl AssessmentStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentStage::BuildingContext => "building_context",
            AssessmentStage::RenderingPrompt => "rendering_prompt",
            AssessmentStage::CallingModel => "calling_model",
            AssessmentStage::Parsing => "parsing",
            AssessmentStage::Policy => "policy",
            AssessmentStage::Done => "done",
        }
    }
}

impl std::fmt::Display for AssessmentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
