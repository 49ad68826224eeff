//! JSON bodies exchanged between the lifecycle client and the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::function::RequestFunction;
use crate::domain::request::RequestFields;
use crate::domain::user::Role;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequestBody {
    pub function: RequestFunction,
    #[serde(default)]
    pub fields: RequestFields,
}

/// Full replacement of the editable fields of a returned request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceFieldsBody {
    pub fields: RequestFields,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}
