//! Postgres [`TemplateCatalog`].
//!
//! A template save deletes and re-inserts the (agreement, type) set in one
//! transaction, so readers see either the old set or the new one.

use async_trait::async_trait;
use grievance_catalog::{
    order_and_renumber, Agreement, BargainingUnit, CatalogError, StepTemplate, StepTemplateInput,
    TemplateCatalog,
};
use grievance_core::{AgreementId, BargainingUnitId, GrievanceType, OrganizationId, ValidationError};
use sqlx::PgPool;
use uuid::Uuid;

use super::{catalog_error, to_i32, to_u32};

#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UnitRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
}

impl From<UnitRow> for BargainingUnit {
    fn from(row: UnitRow) -> Self {
        Self {
            id: BargainingUnitId::from_uuid(row.id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AgreementRow {
    id: Uuid,
    organization_id: Uuid,
    bargaining_unit_id: Uuid,
    name: String,
}

impl From<AgreementRow> for Agreement {
    fn from(row: AgreementRow) -> Self {
        Self {
            id: AgreementId::from_uuid(row.id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            bargaining_unit_id: BargainingUnitId::from_uuid(row.bargaining_unit_id),
            name: row.name,
        }
    }
}

/// Database row for `agreement_step_templates`.
#[derive(sqlx::FromRow)]
struct TemplateRow {
    agreement_id: Uuid,
    grievance_type: String,
    step_number: i32,
    stage: String,
    name: String,
    description: Option<String>,
    time_limit: Option<String>,
    time_limit_days: i32,
    is_calendar_days: bool,
    required_participants: Vec<String>,
    required_documents: Vec<String>,
    notes: Option<String>,
}

impl TryFrom<TemplateRow> for StepTemplate {
    type Error = CatalogError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let malformed = |e: String| CatalogError::Storage(format!("malformed template row: {e}"));
        Ok(Self {
            agreement_id: AgreementId::from_uuid(row.agreement_id),
            grievance_type: row
                .grievance_type
                .parse()
                .map_err(|e: ValidationError| malformed(e.to_string()))?,
            step_number: to_u32("step_number", row.step_number).map_err(malformed)?,
            stage: row
                .stage
                .parse()
                .map_err(|e: ValidationError| malformed(e.to_string()))?,
            name: row.name,
            description: row.description,
            time_limit: row.time_limit,
            time_limit_days: to_u32("time_limit_days", row.time_limit_days).map_err(malformed)?,
            is_calendar_days: row.is_calendar_days,
            required_participants: row.required_participants,
            required_documents: row.required_documents,
            notes: row.notes,
        })
    }
}

const TEMPLATE_COLUMNS: &str = "agreement_id, grievance_type, step_number, stage, name, description, \
     time_limit, time_limit_days, is_calendar_days, required_participants, required_documents, notes";

fn rows_to_templates(rows: Vec<TemplateRow>) -> Result<Vec<StepTemplate>, CatalogError> {
    rows.into_iter().map(StepTemplate::try_from).collect()
}

#[async_trait]
impl TemplateCatalog for PgCatalog {
    async fn agreement(
        &self,
        org: &OrganizationId,
        id: &AgreementId,
    ) -> Result<Option<Agreement>, CatalogError> {
        let row = sqlx::query_as::<_, AgreementRow>(
            "SELECT id, organization_id, bargaining_unit_id, name
             FROM agreements WHERE organization_id = $1 AND id = $2",
        )
        .bind(org.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(catalog_error)?;
        Ok(row.map(Agreement::from))
    }

    async fn bargaining_unit(
        &self,
        org: &OrganizationId,
        id: &BargainingUnitId,
    ) -> Result<Option<BargainingUnit>, CatalogError> {
        let row = sqlx::query_as::<_, UnitRow>(
            "SELECT id, organization_id, name
             FROM bargaining_units WHERE organization_id = $1 AND id = $2",
        )
        .bind(org.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(catalog_error)?;
        Ok(row.map(BargainingUnit::from))
    }

    async fn bargaining_units(
        &self,
        org: &OrganizationId,
    ) -> Result<Vec<BargainingUnit>, CatalogError> {
        let rows = sqlx::query_as::<_, UnitRow>(
            "SELECT id, organization_id, name
             FROM bargaining_units WHERE organization_id = $1 ORDER BY name, id",
        )
        .bind(org.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(catalog_error)?;
        Ok(rows.into_iter().map(BargainingUnit::from).collect())
    }

    async fn register_bargaining_unit(&self, unit: BargainingUnit) -> Result<(), CatalogError> {
        sqlx::query(
            "INSERT INTO bargaining_units (id, organization_id, name) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
             WHERE bargaining_units.organization_id = EXCLUDED.organization_id",
        )
        .bind(unit.id.as_uuid())
        .bind(unit.organization_id.as_uuid())
        .bind(&unit.name)
        .execute(&self.pool)
        .await
        .map_err(catalog_error)?;
        Ok(())
    }

    async fn register_agreement(&self, agreement: Agreement) -> Result<(), CatalogError> {
        if self
            .bargaining_unit(&agreement.organization_id, &agreement.bargaining_unit_id)
            .await?
            .is_none()
        {
            return Err(CatalogError::NotFound {
                kind: "bargaining unit",
                id: agreement.bargaining_unit_id.to_string(),
            });
        }
        sqlx::query(
            "INSERT INTO agreements (id, organization_id, bargaining_unit_id, name)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE
             SET bargaining_unit_id = EXCLUDED.bargaining_unit_id, name = EXCLUDED.name
             WHERE agreements.organization_id = EXCLUDED.organization_id",
        )
        .bind(agreement.id.as_uuid())
        .bind(agreement.organization_id.as_uuid())
        .bind(agreement.bargaining_unit_id.as_uuid())
        .bind(&agreement.name)
        .execute(&self.pool)
        .await
        .map_err(catalog_error)?;
        Ok(())
    }

    async fn template(
        &self,
        org: &OrganizationId,
        agreement_id: &AgreementId,
        grievance_type: GrievanceType,
        step_number: u32,
    ) -> Result<Option<StepTemplate>, CatalogError> {
        let step = to_i32("step_number", step_number).map_err(CatalogError::Storage)?;
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM agreement_step_templates
             WHERE organization_id = $1 AND agreement_id = $2 AND grievance_type = $3 AND step_number = $4"
        ))
        .bind(org.as_uuid())
        .bind(agreement_id.as_uuid())
        .bind(grievance_type.as_str())
        .bind(step)
        .fetch_optional(&self.pool)
        .await
        .map_err(catalog_error)?;
        row.map(StepTemplate::try_from).transpose()
    }

    async fn templates(
        &self,
        org: &OrganizationId,
        agreement_id: &AgreementId,
        grievance_type: GrievanceType,
    ) -> Result<Vec<StepTemplate>, CatalogError> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM agreement_step_templates
             WHERE organization_id = $1 AND agreement_id = $2 AND grievance_type = $3
             ORDER BY step_number"
        ))
        .bind(org.as_uuid())
        .bind(agreement_id.as_uuid())
        .bind(grievance_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(catalog_error)?;
        rows_to_templates(rows)
    }

    async fn save_templates(
        &self,
        org: &OrganizationId,
        agreement_id: &AgreementId,
        grievance_type: GrievanceType,
        steps: Vec<StepTemplateInput>,
    ) -> Result<Vec<StepTemplate>, CatalogError> {
        let ordered = order_and_renumber(*agreement_id, grievance_type, steps)?;
        if self.agreement(org, agreement_id).await?.is_none() {
            return Err(CatalogError::NotFound {
                kind: "agreement",
                id: agreement_id.to_string(),
            });
        }

        let mut tx = self.pool.begin().await.map_err(catalog_error)?;
        sqlx::query(
            "DELETE FROM agreement_step_templates
             WHERE organization_id = $1 AND agreement_id = $2 AND grievance_type = $3",
        )
        .bind(org.as_uuid())
        .bind(agreement_id.as_uuid())
        .bind(grievance_type.as_str())
        .execute(&mut *tx)
        .await
        .map_err(catalog_error)?;

        for step in &ordered {
            let step_number = to_i32("step_number", step.step_number).map_err(CatalogError::Storage)?;
            let days = to_i32("time_limit_days", step.time_limit_days).map_err(CatalogError::Storage)?;
            sqlx::query(&format!(
                "INSERT INTO agreement_step_templates (organization_id, {TEMPLATE_COLUMNS})
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
            ))
            .bind(org.as_uuid())
            .bind(step.agreement_id.as_uuid())
            .bind(step.grievance_type.as_str())
            .bind(step_number)
            .bind(step.stage.as_str())
            .bind(&step.name)
            .bind(&step.description)
            .bind(&step.time_limit)
            .bind(days)
            .bind(step.is_calendar_days)
            .bind(&step.required_participants)
            .bind(&step.required_documents)
            .bind(&step.notes)
            .execute(&mut *tx)
            .await
            .map_err(catalog_error)?;
        }
        tx.commit().await.map_err(catalog_error)?;

        tracing::info!(
            organization_id = %org,
            agreement_id = %agreement_id,
            grievance_type = %grievance_type,
            steps = ordered.len(),
            "template set replaced"
        );
        Ok(ordered)
    }

    async fn all_templates(&self, org: &OrganizationId) -> Result<Vec<StepTemplate>, CatalogError> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM agreement_step_templates
             WHERE organization_id = $1
             ORDER BY agreement_id, grievance_type, step_number"
        ))
        .bind(org.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(catalog_error)?;
        rows_to_templates(rows)
    }
}
