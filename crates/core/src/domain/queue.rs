use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::request::{Request, RequestId, RequestStatus};
use crate::domain::user::Role;
use crate::errors::DomainError;
use crate::flows::states::Stage;

/// A filtered projection of requests scoped to one actor role.
///
/// Pending queues (`Approval`, `Validation`) are disjoint: membership is decided
/// by `status` alone. The remaining kinds are read-only reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    Approval,
    Validation,
    ApprovedHistory,
    ValidatedHistory,
    MyRequests,
}

impl QueueKind {
    pub const ALL: [QueueKind; 5] = [
        Self::Approval,
        Self::Validation,
        Self::ApprovedHistory,
        Self::ValidatedHistory,
        Self::MyRequests,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Validation => "validation",
            Self::ApprovedHistory => "approved",
            Self::ValidatedHistory => "validated",
            Self::MyRequests => "mine",
        }
    }

    /// Collection path on the backend, relative to the base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Approval => "/api/approve-requests/",
            Self::Validation => "/api/validation-requests/",
            Self::ApprovedHistory => "/api/approved-requests/",
            Self::ValidatedHistory => "/api/validated-requests/",
            Self::MyRequests => "/api/my-requests/",
        }
    }

    pub fn action_path(&self, id: RequestId) -> Option<String> {
        self.stage().map(|_| format!("{}{id}/action/", self.path()))
    }

    /// Lifecycle stage whose decisions are taken from this queue.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Approval => Some(Stage::Approval),
            Self::Validation => Some(Stage::Validation),
            _ => None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.stage().is_some()
    }

    /// Role required to read this queue; `None` means any signed-in user.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Self::Approval => Some(Role::Approver),
            Self::Validation => Some(Role::Validator),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Approval => "Approve Requests",
            Self::Validation => "Validation Requests",
            Self::ApprovedHistory => "Approved Requests",
            Self::ValidatedHistory => "Validated Requests",
            Self::MyRequests => "My Requests",
        }
    }

    /// Text shown for an empty listing. Deliberately identical for fetch failures.
    pub fn empty_message(&self) -> &'static str {
        match self {
            Self::Approval => "No requests pending approval.",
            Self::Validation => "No requests pending validation.",
            Self::ApprovedHistory => "No approved requests found.",
            Self::ValidatedHistory => "No validated requests found.",
            Self::MyRequests => "No requests found.",
        }
    }

    pub fn admits(&self, request: &Request, viewer: &str) -> bool {
        match self {
            Self::Approval => request.status == RequestStatus::Submitted,
            Self::Validation => request.status == RequestStatus::Approved,
            Self::ApprovedHistory => {
                matches!(request.status, RequestStatus::Approved | RequestStatus::Validated)
            }
            Self::ValidatedHistory => request.status == RequestStatus::Validated,
            Self::MyRequests => request.owner.eq_ignore_ascii_case(viewer),
        }
    }
}

/// A single record is readable by whoever could see it in at least one queue.
pub fn is_visible(request: &Request, viewer: &str, role: Role) -> bool {
    QueueKind::ALL.iter().any(|queue| role.can_read(*queue) && queue.admits(request, viewer))
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for QueueKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "approval" | "approve" | "approve-requests" => Ok(Self::Approval),
            "validation" | "validation-requests" => Ok(Self::Validation),
            "approved" | "approved-requests" => Ok(Self::ApprovedHistory),
            "validated" | "validated-requests" => Ok(Self::ValidatedHistory),
            "mine" | "my" | "my-requests" => Ok(Self::MyRequests),
            _ => Err(DomainError::UnknownQueue(value.trim().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{is_visible, QueueKind};
    use crate::domain::function::RequestFunction;
    use crate::domain::request::{Request, RequestFields, RequestId, RequestStatus};
    use crate::domain::user::Role;

    fn request(status: RequestStatus) -> Request {
        let mut request = Request::submitted(
            RequestId(1),
            RequestFunction::PartCodeModification,
            "owner@demo.com",
            RequestFields::new(),
            Utc::now(),
        );
        request.status = status;
        request
    }

    #[test]
    fn pending_queues_are_disjoint_for_every_status() {
        for status in [
            RequestStatus::Submitted,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::ReturnedForCorrection,
            RequestStatus::Validated,
        ] {
            let request = request(status);
            let pending_in = [QueueKind::Approval, QueueKind::Validation]
                .into_iter()
                .filter(|queue| queue.admits(&request, "anyone@demo.com"))
                .count();
            assert!(pending_in <= 1, "{status} is pending in more than one queue");
        }
    }

    #[test]
    fn approved_history_keeps_validated_requests() {
        assert!(QueueKind::ApprovedHistory.admits(&request(RequestStatus::Approved), "x"));
        assert!(QueueKind::ApprovedHistory.admits(&request(RequestStatus::Validated), "x"));
        assert!(!QueueKind::ApprovedHistory.admits(&request(RequestStatus::Submitted), "x"));
    }

    #[test]
    fn my_requests_is_scoped_to_owner() {
        let request = request(RequestStatus::Rejected);
        assert!(QueueKind::MyRequests.admits(&request, "Owner@Demo.com"));
        assert!(!QueueKind::MyRequests.admits(&request, "someone@demo.com"));
    }

    #[test]
    fn only_pending_queues_expose_action_paths() {
        assert_eq!(
            QueueKind::Approval.action_path(RequestId(4)).as_deref(),
            Some("/api/approve-requests/4/action/")
        );
        assert_eq!(
            QueueKind::Validation.action_path(RequestId(9)).as_deref(),
            Some("/api/validation-requests/9/action/")
        );
        assert_eq!(QueueKind::MyRequests.action_path(RequestId(4)), None);
    }

    #[test]
    fn single_records_follow_queue_visibility() {
        let pending = request(RequestStatus::Submitted);
        assert!(is_visible(&pending, "owner@demo.com", Role::Submitter));
        assert!(is_visible(&pending, "approver@demo.com", Role::Approver));
        assert!(!is_visible(&pending, "validator@demo.com", Role::Validator));
        assert!(is_visible(&request(RequestStatus::Validated), "x@demo.com", Role::Submitter));
    }

    #[test]
    fn queue_aliases_parse() {
        assert_eq!("approve-requests".parse::<QueueKind>(), Ok(QueueKind::Approval));
        assert_eq!("my_requests".parse::<QueueKind>(), Ok(QueueKind::MyRequests));
        assert!("inbox".parse::<QueueKind>().is_err());
    }
}
