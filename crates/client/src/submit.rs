use thiserror::Error;
use tracing::info;

use reqflow_core::domain::function::RequestFunction;
use reqflow_core::domain::request::{Request, RequestFields};
use reqflow_core::forms::{FormError, FormSchema};

use crate::backend::{Backend, BackendError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Creates a new request after checking `fields` against the function's form.
/// Nothing is sent when the form is invalid.
pub async fn create_request<B>(
    backend: &B,
    function: RequestFunction,
    fields: &RequestFields,
) -> Result<Request, SubmitError>
where
    B: Backend + ?Sized,
{
    let fields = FormSchema::for_function(function)?.validate(fields)?;
    let created = backend.create_request(function, &fields).await?;
    info!(
        event_name = "request.create.applied",
        request_id = %created.id,
        function = %created.function,
        "request submitted for approval"
    );
    Ok(created)
}
