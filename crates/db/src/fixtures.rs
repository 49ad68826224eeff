use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;

use reqflow_core::domain::function::RequestFunction;
use reqflow_core::domain::request::{Request, RequestFields, RequestStatus};
use reqflow_core::domain::user::{Role, UserAccount};
use reqflow_core::flows::{definition, ActionKind, LifecycleEngine, Stage};

use crate::connection::DbPool;
use crate::password::hash_password;
use crate::repositories::{
    NewRequest, RepositoryError, RequestRepository, SqlRequestRepository, SqlUserRepository,
    UserRepository,
};

pub const DEMO_PASSWORD: &str = "demo-password";

const DEMO_USERS: &[(&str, Role)] = &[
    ("submitter@demo.com", Role::Submitter),
    ("approver@demo.com", Role::Approver),
    ("validator@demo.com", Role::Validator),
];

/// One seeded request: function, plant, and the decisions taken on it in order.
struct SeedRequest {
    function: RequestFunction,
    plant: &'static str,
    description: &'static str,
    decisions: &'static [(Stage, ActionKind, Option<&'static str>)],
}

const SEED_REQUESTS: &[SeedRequest] = &[
    SeedRequest {
        function: RequestFunction::PartCodeModification,
        plant: "BP01",
        description: "Bracket, zinc plated",
        decisions: &[],
    },
    SeedRequest {
        function: RequestFunction::PartCodeModification,
        plant: "BP07",
        description: "Hose clamp 40mm",
        decisions: &[],
    },
    SeedRequest {
        function: RequestFunction::VendorMaster,
        plant: "AM01",
        description: "New vendor onboarding",
        decisions: &[],
    },
    SeedRequest {
        function: RequestFunction::PartCodeModification,
        plant: "BP02",
        description: "Gasket, nitrile",
        decisions: &[(Stage::Approval, ActionKind::Approve, None)],
    },
    SeedRequest {
        function: RequestFunction::PartCodeModification,
        plant: "EA01",
        description: "Spring washer M8",
        decisions: &[(Stage::Approval, ActionKind::Return, Some("HSN code missing"))],
    },
    SeedRequest {
        function: RequestFunction::PartCodeModification,
        plant: "SY01",
        description: "Duplicate bracket",
        decisions: &[(
            Stage::Approval,
            ActionKind::Reject,
            Some("Duplicate of an existing part code"),
        )],
    },
    SeedRequest {
        function: RequestFunction::PartCodeModification,
        plant: "BP03",
        description: "Bearing 6204-2RS",
        decisions: &[
            (Stage::Approval, ActionKind::Approve, None),
            (Stage::Validation, ActionKind::Approve, None),
        ],
    },
];

/// Deterministic demo dataset: one user per role and requests in every status.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let users = SqlUserRepository::new(pool.clone());
        let requests = SqlRequestRepository::new(pool.clone());
        Self::load_into(&users, &requests).await
    }

    /// Seeds through the repository traits. A second call is a no-op.
    pub async fn load_into(
        users: &dyn UserRepository,
        requests: &dyn RequestRepository,
    ) -> Result<SeedResult, RepositoryError> {
        if users.find_by_email(DEMO_USERS[0].0).await?.is_some() {
            return Ok(SeedResult { already_seeded: true, users: seeded_users(), requests: 0 });
        }

        let created_at = base_time();
        for (email, role) in DEMO_USERS {
            let password_hash = hash_password(DEMO_PASSWORD)
                .map_err(|e| RepositoryError::Decode(format!("password hash: {e}")))?;
            users
                .save(UserAccount {
                    email: (*email).to_owned(),
                    role: *role,
                    password_hash,
                    active: true,
                    created_at,
                })
                .await?;
        }

        let mut seeded = 0;
        for (index, seed) in SEED_REQUESTS.iter().enumerate() {
            let submitted_at = created_at + Duration::minutes(index as i64 * 10);
            let mut request = requests
                .insert(NewRequest {
                    function: seed.function,
                    owner: DEMO_USERS[0].0.to_owned(),
                    fields: seed_fields(seed),
                    submitted_at,
                })
                .await?;

            for (step, (stage, action, remarks)) in seed.decisions.iter().enumerate() {
                apply_decision(
                    requests,
                    &mut request,
                    *stage,
                    *action,
                    *remarks,
                    submitted_at + Duration::minutes(step as i64 + 1),
                )
                .await?;
            }
            seeded += 1;
        }

        Ok(SeedResult { already_seeded: false, users: seeded_users(), requests: seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for (email, role) in DEMO_USERS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM app_user WHERE email = ?1 AND role = ?2)",
            )
            .bind(*email)
            .bind(role.as_str())
            .fetch_one(pool)
            .await?;
            checks.push(((*email).to_owned(), exists == 1));
        }

        for status in [
            RequestStatus::Submitted,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::ReturnedForCorrection,
            RequestStatus::Validated,
        ] {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM change_request WHERE status = ?1")
                    .bind(status.as_str())
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("status:{status}"), count > 0));
        }

        let all_passed = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_passed, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for (email, _) in DEMO_USERS {
            sqlx::query("DELETE FROM change_request WHERE owner = ?1 COLLATE NOCASE")
                .bind(*email)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM app_user WHERE email = ?1 COLLATE NOCASE")
                .bind(*email)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

async fn apply_decision(
    requests: &dyn RequestRepository,
    request: &mut Request,
    stage: Stage,
    action: ActionKind,
    remarks: Option<&str>,
    at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let expected = request.status;
    let outcome =
        LifecycleEngine::new(definition(stage)).apply(&expected, &action).map_err(seed_error)?;
    let actor = match stage {
        Stage::Approval => DEMO_USERS[1].0,
        Stage::Validation => DEMO_USERS[2].0,
    };
    request.apply_transition(&outcome, actor, remarks, at).map_err(seed_error)?;

    if requests.update_if_status(request, expected).await? {
        Ok(())
    } else {
        Err(RepositoryError::Decode(format!("seed request {} moved during seeding", request.id)))
    }
}

fn seed_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(format!("seed decision: {error}"))
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).single().unwrap_or_else(Utc::now)
}

fn seed_fields(seed: &SeedRequest) -> RequestFields {
    if seed.function != RequestFunction::PartCodeModification {
        return RequestFields::from([("summary".to_owned(), seed.description.to_owned())]);
    }

    RequestFields::from([
        ("plant".to_owned(), seed.plant.to_owned()),
        ("sap_part_code".to_owned(), format!("{}-{:04}", seed.plant, seed.description.len())),
        ("new_material_description".to_owned(), seed.description.to_owned()),
        ("receiving_plant".to_owned(), seed.plant.to_owned()),
        ("remarks".to_owned(), "Seeded demo request".to_owned()),
    ])
}

fn seeded_users() -> Vec<SeededUser> {
    DEMO_USERS
        .iter()
        .map(|(email, role)| SeededUser { email: (*email).to_owned(), role: *role })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeededUser {
    pub email: String,
    pub role: Role,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub already_seeded: bool,
    pub users: Vec<SeededUser>,
    pub requests: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub all_passed: bool,
    pub checks: Vec<(String, bool)>,
}

#[cfg(test)]
mod tests {
    use reqflow_core::domain::function::FunctionFilter;
    use reqflow_core::domain::queue::QueueKind;
    use reqflow_core::domain::request::RequestStatus;
    use reqflow_core::flows::Stage;

    use super::{DemoSeedDataset, DEMO_PASSWORD};
    use crate::password::verify_password;
    use crate::repositories::{
        InMemoryRequestRepository, InMemoryUserRepository, RequestQuery, RequestRepository,
        UserRepository,
    };
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_loads_verifies_and_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let first = DemoSeedDataset::load(&pool).await.expect("seed");
        assert!(!first.already_seeded);
        assert_eq!(first.requests, 7);

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_passed, "{:?}", verification.checks);

        let second = DemoSeedDataset::load(&pool).await.expect("seed again");
        assert!(second.already_seeded);

        DemoSeedDataset::clean(&pool).await.expect("clean");
        let after_clean = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(!after_clean.all_passed);
    }

    #[tokio::test]
    async fn seeded_records_carry_decision_metadata() {
        let users = InMemoryUserRepository::default();
        let requests = InMemoryRequestRepository::default();
        DemoSeedDataset::load_into(&users, &requests).await.expect("seed");

        let approver = users.find_by_email("approver@demo.com").await.expect("find").expect("user");
        assert!(verify_password(DEMO_PASSWORD, &approver.password_hash).expect("verify"));

        let mine = requests
            .list(&RequestQuery::for_queue(
                QueueKind::MyRequests,
                "submitter@demo.com",
                FunctionFilter::All,
            ))
            .await
            .expect("list");
        let returned = mine
            .iter()
            .find(|request| request.status == RequestStatus::ReturnedForCorrection)
            .expect("a returned request");
        assert_eq!(returned.reason_for_return.as_deref(), Some("HSN code missing"));
        assert_eq!(returned.returned_by, Some(Stage::Approval));

        let validated = mine
            .iter()
            .find(|request| request.status == RequestStatus::Validated)
            .expect("a validated request");
        assert_eq!(validated.validated_by.as_deref(), Some("validator@demo.com"));
        assert_eq!(validated.approver.as_deref(), Some("approver@demo.com"));
    }
}
