//! Edit-after-return: a returned request is reopened into a draft, edited, and
//! replaced in place.

use thiserror::Error;
use tracing::info;

use reqflow_core::domain::request::{Request, RequestFields, RequestId, RequestStatus};
use reqflow_core::forms::{FieldProblem, FormError, FormSchema};

use crate::backend::{Backend, BackendError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResubmitError {
    #[error("request {id} is {status}; only returned requests can be resubmitted")]
    NotOffered { id: RequestId, status: RequestStatus },
    #[error("request {id} belongs to another submitter")]
    NotOwner { id: RequestId },
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Clone, Debug)]
pub struct ResubmissionDraft {
    request_id: RequestId,
    schema: FormSchema,
    fields: RequestFields,
    reason_for_return: Option<String>,
}

impl ResubmissionDraft {
    /// Reopens `request` for its owner. Offered for returned requests only.
    pub fn open(request: &Request, viewer: &str) -> Result<Self, ResubmitError> {
        if !request.offers_resubmission() {
            return Err(ResubmitError::NotOffered { id: request.id, status: request.status });
        }
        if !request.owner.eq_ignore_ascii_case(viewer) {
            return Err(ResubmitError::NotOwner { id: request.id });
        }

        Ok(Self {
            request_id: request.id,
            schema: FormSchema::for_function(request.function)?,
            fields: request.fields.clone(),
            reason_for_return: request.reason_for_return.clone(),
        })
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn fields(&self) -> &RequestFields {
        &self.fields
    }

    /// Why the request came back; shown next to the form.
    pub fn reason_for_return(&self) -> Option<&str> {
        self.reason_for_return.as_deref()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), ResubmitError> {
        if self.schema.field(name).is_none() {
            let problem = FieldProblem::Unknown { field: name.to_owned() };
            return Err(FormError::Invalid(vec![problem]).into());
        }
        self.fields.insert(name.to_owned(), value.into());
        Ok(())
    }

    /// Validates the draft locally, then replaces the record's fields on the backend.
    pub async fn resubmit<B>(self, backend: &B) -> Result<Request, ResubmitError>
    where
        B: Backend + ?Sized,
    {
        let fields = self.schema.validate(&self.fields)?;
        let updated = backend.replace_request(self.request_id, &fields).await?;
        info!(
            event_name = "request.resubmit.applied",
            request_id = %updated.id,
            status = %updated.status,
            "request resubmitted for approval"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use reqflow_core::domain::function::RequestFunction;
    use reqflow_core::domain::request::{Request, RequestFields, RequestId, RequestStatus};
    use reqflow_core::domain::user::Role;

    use super::{ResubmissionDraft, ResubmitError};
    use crate::memory::InMemoryBackend;

    fn fields() -> RequestFields {
        RequestFields::from([
            ("plant".to_owned(), "BP01".to_owned()),
            ("sap_part_code".to_owned(), "P-100".to_owned()),
            ("new_material_description".to_owned(), "Bracket".to_owned()),
            ("receiving_plant".to_owned(), "BP02".to_owned()),
            ("remarks".to_owned(), "Please update".to_owned()),
        ])
    }

    fn returned() -> Request {
        let mut request = Request::submitted(
            RequestId(5),
            RequestFunction::PartCodeModification,
            "s@demo.com",
            fields(),
            Utc::now(),
        );
        request.status = RequestStatus::ReturnedForCorrection;
        request.reason_for_return = Some("HSN code missing".to_owned());
        request
    }

    #[test]
    fn draft_opens_only_for_the_owner_of_a_returned_request() {
        let draft = ResubmissionDraft::open(&returned(), "S@demo.com").expect("owner");
        assert_eq!(draft.reason_for_return(), Some("HSN code missing"));

        assert_eq!(
            ResubmissionDraft::open(&returned(), "other@demo.com").map(|_| ()),
            Err(ResubmitError::NotOwner { id: RequestId(5) })
        );

        let mut approved = returned();
        approved.status = RequestStatus::Approved;
        assert!(matches!(
            ResubmissionDraft::open(&approved, "s@demo.com"),
            Err(ResubmitError::NotOffered { status: RequestStatus::Approved, .. })
        ));
    }

    #[test]
    fn unknown_fields_cannot_be_set() {
        let mut draft = ResubmissionDraft::open(&returned(), "s@demo.com").expect("owner");
        assert!(matches!(draft.set("colour", "blue"), Err(ResubmitError::Form(_))));
        draft.set("hsn_code", "8302").expect("known field");
        assert_eq!(draft.fields().get("hsn_code").map(String::as_str), Some("8302"));
    }

    #[tokio::test]
    async fn resubmission_moves_the_record_back_to_submitted() {
        let store = InMemoryBackend::new();
        store.put(returned());
        let owner = store.as_user("s@demo.com", Role::Submitter);

        let mut draft = ResubmissionDraft::open(&returned(), "s@demo.com").expect("owner");
        draft.set("hsn_code", "8302").expect("set");
        let updated = draft.resubmit(&owner).await.expect("resubmit");

        assert_eq!(updated.id, RequestId(5));
        assert_eq!(updated.status, RequestStatus::Submitted);
        assert_eq!(updated.field("hsn_code"), Some("8302"));
        assert_eq!(updated.reason_for_return.as_deref(), Some("HSN code missing"));
    }

    #[tokio::test]
    async fn invalid_draft_is_not_sent() {
        let store = InMemoryBackend::new();
        store.put(returned());
        let owner = store.as_user("s@demo.com", Role::Submitter);

        let mut draft = ResubmissionDraft::open(&returned(), "s@demo.com").expect("owner");
        draft.set("plant", "XX99").expect("known field");
        assert!(matches!(draft.resubmit(&owner).await, Err(ResubmitError::Form(_))));
        assert_eq!(
            store.get(RequestId(5)).map(|request| request.status),
            Some(RequestStatus::ReturnedForCorrection)
        );
    }
}
