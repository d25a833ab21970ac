//! # Service Bootstrap
//!
//! Wires the API state from configuration at startup.
//!
//! ## Bootstrap Sequence
//!
//! 1. **Connect Storage** — Postgres when `DATABASE_URL` is set, in-memory otherwise.
//! 2. **Build Services** — Engine, event log and analytics over the chosen backends.
//! 3. **Load Reference Data** — Optional YAML file of bargaining units,
//!    agreements and legacy step templates (`REFERENCE_DATA`).
//!
//! Reference data is upserted, so restarting with the same file is harmless.
//! Template sets named in the file replace what is stored for that
//! (agreement, grievance type).

use std::path::Path;
use std::sync::Arc;

use grievance_catalog::{
    migrate_legacy_steps, Agreement, BargainingUnit, CatalogError, InMemoryCatalog, LegacyStep,
    TemplateCatalog,
};
use grievance_core::{AgreementId, BargainingUnitId, GrievanceType, OrganizationId, SystemClock};
use grievance_lifecycle::{GrievanceStore, InMemoryStore};
use serde::Deserialize;

use crate::db::{self, PgCatalog, PgGrievanceStore};
use crate::state::{AppConfig, AppState};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors during service bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Reference data file not found at the given path.
    #[error("reference data not found: {path}")]
    ReferenceDataNotFound { path: String },

    /// Reference data could not be parsed.
    #[error("invalid reference data in {path}: {reason}")]
    InvalidReferenceData { path: String, reason: String },

    /// Database connection or migration failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Catalog rejected a unit, agreement or template set.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// IO error during bootstrap.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Reference data file
// ---------------------------------------------------------------------------

/// Reference data for one organization.
#[derive(Debug, Deserialize)]
pub struct ReferenceData {
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub bargaining_units: Vec<UnitEntry>,
    #[serde(default)]
    pub agreements: Vec<AgreementEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UnitEntry {
    pub id: BargainingUnitId,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AgreementEntry {
    pub id: AgreementId,
    pub bargaining_unit_id: BargainingUnitId,
    pub name: String,
    #[serde(default)]
    pub templates: Vec<TemplateSetEntry>,
}

/// Steps for one grievance type, in the legacy shape (stage optional).
#[derive(Debug, Deserialize)]
pub struct TemplateSetEntry {
    pub grievance_type: GrievanceType,
    pub steps: Vec<LegacyStep>,
}

/// Counts of what a reference data load wrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub bargaining_units: usize,
    pub agreements: usize,
    pub template_sets: usize,
}

/// Parse a reference data file.
pub fn read_reference_data(path: &Path) -> Result<ReferenceData, BootstrapError> {
    if !path.exists() {
        return Err(BootstrapError::ReferenceDataNotFound {
            path: path.display().to_string(),
        });
    }
    let text = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&text).map_err(|e| BootstrapError::InvalidReferenceData {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Register the units, agreements and template sets of `data` in `catalog`.
pub async fn load_reference_data(
    catalog: &dyn TemplateCatalog,
    data: ReferenceData,
) -> Result<LoadSummary, BootstrapError> {
    let org = data.organization_id;
    let mut summary = LoadSummary::default();

    for unit in data.bargaining_units {
        catalog
            .register_bargaining_unit(BargainingUnit {
                id: unit.id,
                organization_id: org,
                name: unit.name,
            })
            .await?;
        summary.bargaining_units += 1;
    }

    for agreement in data.agreements {
        catalog
            .register_agreement(Agreement {
                id: agreement.id,
                organization_id: org,
                bargaining_unit_id: agreement.bargaining_unit_id,
                name: agreement.name,
            })
            .await?;
        summary.agreements += 1;

        for set in agreement.templates {
            let steps = migrate_legacy_steps(agreement.id, set.steps);
            catalog
                .save_templates(&org, &agreement.id, set.grievance_type, steps)
                .await?;
            summary.template_sets += 1;
        }
    }

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Build the application state from configuration.
pub async fn bootstrap(config: AppConfig) -> Result<AppState, BootstrapError> {
    let pool = db::init_pool(config.database_url.as_deref()).await?;

    let (catalog, store): (Arc<dyn TemplateCatalog>, Arc<dyn GrievanceStore>) = match &pool {
        Some(pool) => (
            Arc::new(PgCatalog::new(pool.clone())),
            Arc::new(PgGrievanceStore::new(pool.clone())),
        ),
        None => (Arc::new(InMemoryCatalog::new()), Arc::new(InMemoryStore::new())),
    };

    let reference_data = config.reference_data.clone();
    let state = AppState::from_parts(config, catalog, store, Arc::new(SystemClock), pool);

    match reference_data {
        Some(path) => {
            let data = read_reference_data(&path)?;
            let organization_id = data.organization_id;
            let summary = load_reference_data(state.catalog.as_ref(), data).await?;
            tracing::info!(
                path = %path.display(),
                organization_id = %organization_id,
                bargaining_units = summary.bargaining_units,
                agreements = summary.agreements,
                template_sets = summary.template_sets,
                "reference data loaded"
            );
        }
        None => tracing::info!("REFERENCE_DATA not set, starting with an empty catalog"),
    }

    Ok(state)
}
