use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Business process a request belongs to. Fixed after creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestFunction {
    AssetCreation,
    CustomerMaster,
    EngineeringBomNote,
    EngineeringBomNoteChange,
    HiringIndent,
    NpvSubmission,
    PartCodeCreation,
    PartCodeModification,
    ProjectApproval,
    RoutingMaster,
    SellingPriceUpdation,
    VendorMaster,
}

impl RequestFunction {
    pub const ALL: [RequestFunction; 12] = [
        Self::AssetCreation,
        Self::CustomerMaster,
        Self::EngineeringBomNote,
        Self::EngineeringBomNoteChange,
        Self::HiringIndent,
        Self::NpvSubmission,
        Self::PartCodeCreation,
        Self::PartCodeModification,
        Self::ProjectApproval,
        Self::RoutingMaster,
        Self::SellingPriceUpdation,
        Self::VendorMaster,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::AssetCreation => "asset-creation",
            Self::CustomerMaster => "customer-master",
            Self::EngineeringBomNote => "engineering-bom-note",
            Self::EngineeringBomNoteChange => "engineering-bom-note-change",
            Self::HiringIndent => "hiring-indent",
            Self::NpvSubmission => "npv-submission",
            Self::PartCodeCreation => "part-code-creation",
            Self::PartCodeModification => "part-code-modification",
            Self::ProjectApproval => "project-approval",
            Self::RoutingMaster => "routing-master",
            Self::SellingPriceUpdation => "selling-price-updation",
            Self::VendorMaster => "vendor-master",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AssetCreation => "Asset Creation",
            Self::CustomerMaster => "Customer Master Creation/Modification",
            Self::EngineeringBomNote => "Engineering BOM Note",
            Self::EngineeringBomNoteChange => "Engineering BOM Note Change",
            Self::HiringIndent => "Hiring Indent",
            Self::NpvSubmission => "NPV Submission",
            Self::PartCodeCreation => "Part Code Creation",
            Self::PartCodeModification => "Part Code Modification",
            Self::ProjectApproval => "Project Approval",
            Self::RoutingMaster => "Routing Master Creation/Modification",
            Self::SellingPriceUpdation => "Selling Price Updation",
            Self::VendorMaster => "Vendor Master Creation/Modification",
        }
    }
}

impl fmt::Display for RequestFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RequestFunction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|function| function.key() == normalized)
            .ok_or_else(|| DomainError::UnknownFunction(value.trim().to_string()))
    }
}

/// Function-type filter applied to a queue listing. `All` sends no filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FunctionFilter {
    #[default]
    All,
    Only(RequestFunction),
}

impl FunctionFilter {
    /// Value for the `function` query parameter, `None` for the unfiltered view.
    pub fn query_value(&self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Only(function) => Some(function.key()),
        }
    }

    pub fn matches(&self, function: RequestFunction) -> bool {
        match self {
            Self::All => true,
            Self::Only(selected) => *selected == function,
        }
    }
}

impl fmt::Display for FunctionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(function) => f.write_str(function.key()),
        }
    }
}

impl FromStr for FunctionFilter {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        trimmed.parse().map(Self::Only)
    }
}
