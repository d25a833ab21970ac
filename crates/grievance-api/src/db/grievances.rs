//! Postgres [`GrievanceStore`].
//!
//! Every [`TransitionCommit`] runs in one transaction. The grievance row is
//! updated with `WHERE version = expected`; zero affected rows means either
//! the grievance is gone or another writer got there first, and the
//! transaction is rolled back. Outcome rows upsert by
//! `(grievance_id, step_number)` and keep the latest completion.
//!
//! Analytics snapshots read under `REPEATABLE READ, READ ONLY` so the
//! grievance and outcome lists come from the same point in time.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use grievance_core::{
    AgreementId, BargainingUnitId, GrievanceId, GrievanceStatus, OrganizationId, UserId,
    ValidationError,
};
use grievance_lifecycle::{
    EventQuery, GrievanceEvent, GrievanceSnapshot, GrievanceStepInstance, GrievanceStepOutcome,
    GrievanceStore, Grievance, Paginated, ResolutionDetails, StoreError, TransitionCommit,
};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{store_error, to_i32, to_u32};

#[derive(Debug, Clone)]
pub struct PgGrievanceStore {
    pool: PgPool,
}

impl PgGrievanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn malformed(table: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("malformed {table} row: {detail}"))
}

fn to_version(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|_| StoreError::Backend(format!("version out of range: {version}")))
}

fn bind_int(column: &'static str, value: u32) -> Result<i32, StoreError> {
    to_i32(column, value).map_err(StoreError::Backend)
}

// -- Rows ---------------------------------------------------------------------

const GRIEVANCE_COLUMNS: &str = "id, organization_id, bargaining_unit_id, agreement_id, \
     grievance_type, status, stage, current_step_number, outcomes, resolution_details, \
     status_before_deletion, version, filed_at, created_at, updated_at";

/// Database row for `grievances`.
#[derive(sqlx::FromRow)]
struct GrievanceRow {
    id: Uuid,
    organization_id: Uuid,
    bargaining_unit_id: Uuid,
    agreement_id: Uuid,
    grievance_type: String,
    status: String,
    stage: String,
    current_step_number: Option<i32>,
    outcomes: Option<String>,
    resolution_details: Option<Json<ResolutionDetails>>,
    status_before_deletion: Option<String>,
    version: i64,
    filed_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GrievanceRow> for Grievance {
    type Error = StoreError;

    fn try_from(row: GrievanceRow) -> Result<Self, Self::Error> {
        let bad = |e: ValidationError| malformed("grievances", e);
        Ok(Self {
            id: GrievanceId::from_uuid(row.id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            bargaining_unit_id: BargainingUnitId::from_uuid(row.bargaining_unit_id),
            agreement_id: AgreementId::from_uuid(row.agreement_id),
            grievance_type: row.grievance_type.parse().map_err(bad)?,
            status: row.status.parse().map_err(bad)?,
            stage: row.stage.parse().map_err(bad)?,
            current_step_number: row
                .current_step_number
                .map(|n| to_u32("current_step_number", n))
                .transpose()
                .map_err(|e| malformed("grievances", e))?,
            outcomes: row.outcomes,
            resolution_details: row.resolution_details.map(|Json(d)| d),
            status_before_deletion: row
                .status_before_deletion
                .map(|s| s.parse::<GrievanceStatus>())
                .transpose()
                .map_err(bad)?,
            version: u64::try_from(row.version).map_err(|e| malformed("grievances", e))?,
            filed_at: row.filed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Database row for `grievance_step_outcomes`.
#[derive(sqlx::FromRow)]
struct OutcomeRow {
    grievance_id: Uuid,
    organization_id: Uuid,
    step_number: i32,
    stage: String,
    outcome: String,
    completed_date: DateTime<Utc>,
    recorded_by: Uuid,
}

impl TryFrom<OutcomeRow> for GrievanceStepOutcome {
    type Error = StoreError;

    fn try_from(row: OutcomeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            grievance_id: GrievanceId::from_uuid(row.grievance_id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            step_number: to_u32("step_number", row.step_number)
                .map_err(|e| malformed("grievance_step_outcomes", e))?,
            stage: row
                .stage
                .parse()
                .map_err(|e: ValidationError| malformed("grievance_step_outcomes", e))?,
            outcome: row.outcome,
            completed_date: row.completed_date,
            recorded_by: UserId::from_uuid(row.recorded_by),
        })
    }
}

/// Database row for `grievance_step_instances`.
#[derive(sqlx::FromRow)]
struct InstanceRow {
    grievance_id: Uuid,
    organization_id: Uuid,
    step_number: i32,
    stage: String,
    name: String,
    due_date: NaiveDate,
    completed_date: Option<DateTime<Utc>>,
    status: String,
}

impl TryFrom<InstanceRow> for GrievanceStepInstance {
    type Error = StoreError;

    fn try_from(row: InstanceRow) -> Result<Self, Self::Error> {
        let bad = |e: ValidationError| malformed("grievance_step_instances", e);
        Ok(Self {
            grievance_id: GrievanceId::from_uuid(row.grievance_id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            step_number: to_u32("step_number", row.step_number)
                .map_err(|e| malformed("grievance_step_instances", e))?,
            stage: row.stage.parse().map_err(bad)?,
            name: row.name,
            due_date: row.due_date,
            completed_date: row.completed_date,
            status: row.status.parse().map_err(bad)?,
        })
    }
}

/// Database row for `grievance_events`.
#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    grievance_id: Uuid,
    organization_id: Uuid,
    user_id: Uuid,
    event_type: String,
    previous_value: Option<String>,
    new_value: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for GrievanceEvent {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            grievance_id: GrievanceId::from_uuid(row.grievance_id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            user_id: UserId::from_uuid(row.user_id),
            event_type: row
                .event_type
                .parse()
                .map_err(|e: ValidationError| malformed("grievance_events", e))?,
            previous_value: row.previous_value,
            new_value: row.new_value,
            created_at: row.created_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// -- Writes -------------------------------------------------------------------

async fn insert_grievance(conn: &mut PgConnection, g: &Grievance) -> Result<bool, StoreError> {
    let result = sqlx::query(&format!(
        "INSERT INTO grievances ({GRIEVANCE_COLUMNS})
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
         ON CONFLICT (id) DO NOTHING"
    ))
    .bind(g.id.as_uuid())
    .bind(g.organization_id.as_uuid())
    .bind(g.bargaining_unit_id.as_uuid())
    .bind(g.agreement_id.as_uuid())
    .bind(g.grievance_type.as_str())
    .bind(g.status.as_str())
    .bind(g.stage.as_str())
    .bind(g.current_step_number.map(|n| bind_int("current_step_number", n)).transpose()?)
    .bind(&g.outcomes)
    .bind(g.resolution_details.as_ref().map(Json))
    .bind(g.status_before_deletion.map(|s| s.as_str()))
    .bind(to_version(g.version)?)
    .bind(g.filed_at)
    .bind(g.created_at)
    .bind(g.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(store_error)?;
    Ok(result.rows_affected() == 1)
}

/// Update the grievance row if its version still matches. Returns whether a
/// row was updated.
async fn update_grievance(
    conn: &mut PgConnection,
    g: &Grievance,
    expected_version: u64,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE grievances
         SET status = $3, stage = $4, current_step_number = $5, outcomes = $6,
             resolution_details = $7, status_before_deletion = $8, version = $9, updated_at = $10
         WHERE organization_id = $1 AND id = $2 AND version = $11",
    )
    .bind(g.organization_id.as_uuid())
    .bind(g.id.as_uuid())
    .bind(g.status.as_str())
    .bind(g.stage.as_str())
    .bind(g.current_step_number.map(|n| bind_int("current_step_number", n)).transpose()?)
    .bind(&g.outcomes)
    .bind(g.resolution_details.as_ref().map(Json))
    .bind(g.status_before_deletion.map(|s| s.as_str()))
    .bind(to_version(g.version)?)
    .bind(g.updated_at)
    .bind(to_version(expected_version)?)
    .execute(&mut *conn)
    .await
    .map_err(store_error)?;
    Ok(result.rows_affected() == 1)
}

/// Write the outcome, step instances and events of a commit.
async fn write_history(conn: &mut PgConnection, commit: &TransitionCommit) -> Result<(), StoreError> {
    if let Some(o) = &commit.outcome {
        sqlx::query(
            "INSERT INTO grievance_step_outcomes
                 (grievance_id, organization_id, step_number, stage, outcome, completed_date, recorded_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (grievance_id, step_number) DO UPDATE
             SET stage = EXCLUDED.stage, outcome = EXCLUDED.outcome,
                 completed_date = EXCLUDED.completed_date, recorded_by = EXCLUDED.recorded_by
             WHERE grievance_step_outcomes.completed_date <= EXCLUDED.completed_date",
        )
        .bind(o.grievance_id.as_uuid())
        .bind(o.organization_id.as_uuid())
        .bind(bind_int("step_number", o.step_number)?)
        .bind(o.stage.as_str())
        .bind(&o.outcome)
        .bind(o.completed_date)
        .bind(o.recorded_by.as_uuid())
        .execute(&mut *conn)
        .await
        .map_err(store_error)?;
    }

    for i in &commit.instances {
        sqlx::query(
            "INSERT INTO grievance_step_instances
                 (grievance_id, organization_id, step_number, stage, name, due_date, completed_date, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (grievance_id, step_number) DO UPDATE
             SET stage = EXCLUDED.stage, name = EXCLUDED.name, due_date = EXCLUDED.due_date,
                 completed_date = EXCLUDED.completed_date, status = EXCLUDED.status",
        )
        .bind(i.grievance_id.as_uuid())
        .bind(i.organization_id.as_uuid())
        .bind(bind_int("step_number", i.step_number)?)
        .bind(i.stage.as_str())
        .bind(&i.name)
        .bind(i.due_date)
        .bind(i.completed_date)
        .bind(i.status.as_str())
        .execute(&mut *conn)
        .await
        .map_err(store_error)?;
    }

    for e in &commit.events {
        insert_event(conn, e).await?;
    }
    Ok(())
}

async fn insert_event(conn: &mut PgConnection, e: &GrievanceEvent) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO grievance_events
             (id, grievance_id, organization_id, user_id, event_type, previous_value, new_value, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(e.id)
    .bind(e.grievance_id.as_uuid())
    .bind(e.organization_id.as_uuid())
    .bind(e.user_id.as_uuid())
    .bind(e.event_type.as_str())
    .bind(&e.previous_value)
    .bind(&e.new_value)
    .bind(e.created_at)
    .execute(&mut *conn)
    .await
    .map_err(store_error)?;
    Ok(())
}

async fn current_version(
    conn: &mut PgConnection,
    org: &OrganizationId,
    id: &GrievanceId,
) -> Result<Option<i64>, StoreError> {
    sqlx::query_scalar("SELECT version FROM grievances WHERE organization_id = $1 AND id = $2")
        .bind(org.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(store_error)
}

// -- Event query ----------------------------------------------------------------

const EVENT_FILTER: &str = "organization_id = $1
     AND ($2::date IS NULL OR (created_at AT TIME ZONE 'UTC')::date >= $2::date)
     AND ($3::date IS NULL OR (created_at AT TIME ZONE 'UTC')::date <= $3::date)
     AND (cardinality($4::text[]) = 0 OR event_type = ANY($4::text[]))
     AND ($5::uuid IS NULL OR user_id = $5::uuid)
     AND ($6::uuid IS NULL OR grievance_id = $6::uuid)";

#[async_trait]
impl GrievanceStore for PgGrievanceStore {
    async fn load(
        &self,
        org: &OrganizationId,
        id: &GrievanceId,
    ) -> Result<Option<Grievance>, StoreError> {
        let row = sqlx::query_as::<_, GrievanceRow>(&format!(
            "SELECT {GRIEVANCE_COLUMNS} FROM grievances WHERE organization_id = $1 AND id = $2"
        ))
        .bind(org.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        row.map(Grievance::try_from).transpose()
    }

    async fn list(&self, org: &OrganizationId) -> Result<Vec<Grievance>, StoreError> {
        let rows = sqlx::query_as::<_, GrievanceRow>(&format!(
            "SELECT {GRIEVANCE_COLUMNS} FROM grievances WHERE organization_id = $1
             ORDER BY created_at DESC, id"
        ))
        .bind(org.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        convert_all(rows)
    }

    async fn create(&self, commit: TransitionCommit) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        if !insert_grievance(&mut tx, &commit.grievance).await? {
            return Err(StoreError::AlreadyExists {
                grievance_id: commit.grievance.id.to_string(),
            });
        }
        write_history(&mut tx, &commit).await?;
        tx.commit().await.map_err(store_error)
    }

    async fn commit(&self, commit: TransitionCommit) -> Result<(), StoreError> {
        let g = &commit.grievance;
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        if !update_grievance(&mut tx, g, commit.expected_version).await? {
            let actual = current_version(&mut tx, &g.organization_id, &g.id).await?;
            return Err(match actual {
                None => StoreError::NotFound {
                    grievance_id: g.id.to_string(),
                },
                Some(actual) => StoreError::VersionConflict {
                    grievance_id: g.id.to_string(),
                    expected: commit.expected_version,
                    actual: u64::try_from(actual).unwrap_or_default(),
                },
            });
        }
        write_history(&mut tx, &commit).await?;
        tx.commit().await.map_err(store_error)
    }

    async fn outcomes(
        &self,
        org: &OrganizationId,
        id: &GrievanceId,
    ) -> Result<Vec<GrievanceStepOutcome>, StoreError> {
        let rows = sqlx::query_as::<_, OutcomeRow>(
            "SELECT grievance_id, organization_id, step_number, stage, outcome, completed_date, recorded_by
             FROM grievance_step_outcomes
             WHERE organization_id = $1 AND grievance_id = $2
             ORDER BY step_number",
        )
        .bind(org.as_uuid())
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        convert_all(rows)
    }

    async fn step_instances(
        &self,
        org: &OrganizationId,
        id: &GrievanceId,
    ) -> Result<Vec<GrievanceStepInstance>, StoreError> {
        let rows = sqlx::query_as::<_, InstanceRow>(
            "SELECT grievance_id, organization_id, step_number, stage, name, due_date, completed_date, status
             FROM grievance_step_instances
             WHERE organization_id = $1 AND grievance_id = $2
             ORDER BY step_number",
        )
        .bind(org.as_uuid())
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        convert_all(rows)
    }

    async fn append_event(&self, event: GrievanceEvent) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        if current_version(&mut tx, &event.organization_id, &event.grievance_id)
            .await?
            .is_none()
        {
            return Err(StoreError::NotFound {
                grievance_id: event.grievance_id.to_string(),
            });
        }
        insert_event(&mut tx, &event).await?;
        tx.commit().await.map_err(store_error)
    }

    async fn query_events(
        &self,
        org: &OrganizationId,
        query: &EventQuery,
    ) -> Result<Paginated<GrievanceEvent>, StoreError> {
        let event_types: Vec<&str> = query.event_types.iter().map(|t| t.as_str()).collect();
        let user_id = query.user_id.map(|u| *u.as_uuid());
        let grievance_id = query.grievance_id.map(|g| *g.as_uuid());
        let page_size = query.effective_page_size();
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);

        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM grievance_events WHERE {EVENT_FILTER}"
        ))
        .bind(org.as_uuid())
        .bind(query.date_range.from)
        .bind(query.date_range.to)
        .bind(&event_types)
        .bind(user_id)
        .bind(grievance_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_error)?;

        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT id, grievance_id, organization_id, user_id, event_type, previous_value, new_value, created_at
             FROM grievance_events WHERE {EVENT_FILTER}
             ORDER BY created_at DESC, seq DESC
             LIMIT $7 OFFSET $8"
        ))
        .bind(org.as_uuid())
        .bind(query.date_range.from)
        .bind(query.date_range.to)
        .bind(&event_types)
        .bind(user_id)
        .bind(grievance_id)
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&mut *tx)
        .await
        .map_err(store_error)?;
        tx.commit().await.map_err(store_error)?;

        Ok(Paginated::new(
            convert_all(rows)?,
            u64::try_from(total).unwrap_or_default(),
            query.effective_page(),
            page_size,
        ))
    }

    async fn snapshot(&self, org: &OrganizationId) -> Result<GrievanceSnapshot, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        let grievances = sqlx::query_as::<_, GrievanceRow>(&format!(
            "SELECT {GRIEVANCE_COLUMNS} FROM grievances WHERE organization_id = $1
             ORDER BY created_at DESC, id"
        ))
        .bind(org.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(store_error)?;

        let outcomes = sqlx::query_as::<_, OutcomeRow>(
            "SELECT grievance_id, organization_id, step_number, stage, outcome, completed_date, recorded_by
             FROM grievance_step_outcomes WHERE organization_id = $1
             ORDER BY grievance_id, step_number",
        )
        .bind(org.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(store_error)?;
        tx.commit().await.map_err(store_error)?;

        Ok(GrievanceSnapshot {
            grievances: convert_all(grievances)?,
            outcomes: convert_all(outcomes)?,
        })
    }
}
