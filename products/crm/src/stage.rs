//! Pipeline stage registry.
//!
//! The board renders one column per entry in [`STAGES`], left to right. The
//! order is fixed configuration; deal data never reorders it.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    /// Won and lost deals both land here.
    Closed,
}

/// How a stage takes part in pipeline totals.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageRole {
    Open,
    Terminal,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageInfo {
    pub stage: Stage,
    pub display_name: &'static str,
    pub color: &'static str,
    pub role: StageRole,
}

pub const STAGES: [StageInfo; 5] = [
    StageInfo {
        stage: Stage::Lead,
        display_name: "Lead",
        color: "blue-500",
        role: StageRole::Open,
    },
    StageInfo {
        stage: Stage::Qualified,
        display_name: "Qualified",
        color: "yellow-500",
        role: StageRole::Open,
    },
    StageInfo {
        stage: Stage::Proposal,
        display_name: "Proposal",
        color: "orange-500",
        role: StageRole::Open,
    },
    StageInfo {
        stage: Stage::Negotiation,
        display_name: "Negotiation",
        color: "purple-500",
        role: StageRole::Open,
    },
    StageInfo {
        stage: Stage::Closed,
        display_name: "Closed Won/Lost",
        color: "green-500",
        role: StageRole::Terminal,
    },
];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown pipeline stage `{0}`")]
pub struct UnknownStage(pub String);

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Lead,
        Stage::Qualified,
        Stage::Proposal,
        Stage::Negotiation,
        Stage::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Lead => "lead",
            Stage::Qualified => "qualified",
            Stage::Proposal => "proposal",
            Stage::Negotiation => "negotiation",
            Stage::Closed => "closed",
        }
    }

    /// Column index on the board.
    pub fn position(self) -> usize {
        match self {
            Stage::Lead => 0,
            Stage::Qualified => 1,
            Stage::Proposal => 2,
            Stage::Negotiation => 3,
            Stage::Closed => 4,
        }
    }

    pub fn info(self) -> &'static StageInfo {
        &STAGES[self.position()]
    }

    pub fn is_terminal(self) -> bool {
        self.info().role == StageRole::Terminal
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == value)
            .ok_or_else(|| UnknownStage(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_matches_column_order() {
        for (idx, info) in STAGES.iter().enumerate() {
            assert_eq!(info.stage.position(), idx);
            assert_eq!(Stage::ALL[idx], info.stage);
        }
        assert_eq!(STAGES.last().map(|s| s.stage), Some(Stage::Closed));
        assert!(Stage::Closed.is_terminal());
        assert!(!Stage::Negotiation.is_terminal());
    }

    #[test]
    fn parses_only_registered_ids() {
        assert_eq!("proposal".parse::<Stage>(), Ok(Stage::Proposal));
        assert_eq!(
            "archived".parse::<Stage>(),
            Err(UnknownStage("archived".into()))
        );
        assert!("Lead".parse::<Stage>().is_err());
    }

    #[test]
    fn serializes_as_wire_id() {
        let json = serde_json::to_string(&Stage::Negotiation).unwrap();
        assert_eq!(json, "\"negotiation\"");
    }
}
