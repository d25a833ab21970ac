//! In-memory [`TemplateCatalog`], partitioned by organization.
//!
//! The lock is `parking_lot` and is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use grievance_core::{AgreementId, BargainingUnitId, GrievanceType, OrganizationId};
use parking_lot::RwLock;

use crate::catalog::TemplateCatalog;
use crate::error::CatalogError;
use crate::reference::{Agreement, BargainingUnit};
use crate::template::{order_and_renumber, StepTemplate, StepTemplateInput};

#[derive(Debug, Default)]
struct OrgCatalog {
    units: HashMap<BargainingUnitId, BargainingUnit>,
    agreements: HashMap<AgreementId, Agreement>,
    templates: HashMap<(AgreementId, GrievanceType), Vec<StepTemplate>>,
}

/// Thread-safe, cloneable catalog. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    orgs: Arc<RwLock<HashMap<OrganizationId, OrgCatalog>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateCatalog for InMemoryCatalog {
    async fn agreement(
        &self,
        org: &OrganizationId,
        id: &AgreementId,
    ) -> Result<Option<Agreement>, CatalogError> {
        Ok(self
            .orgs
            .read()
            .get(org)
            .and_then(|c| c.agreements.get(id).cloned()))
    }

    async fn bargaining_unit(
        &self,
        org: &OrganizationId,
        id: &BargainingUnitId,
    ) -> Result<Option<BargainingUnit>, CatalogError> {
        Ok(self
            .orgs
            .read()
            .get(org)
            .and_then(|c| c.units.get(id).cloned()))
    }

    async fn bargaining_units(
        &self,
        org: &OrganizationId,
    ) -> Result<Vec<BargainingUnit>, CatalogError> {
        let mut units: Vec<BargainingUnit> = self
            .orgs
            .read()
            .get(org)
            .map(|c| c.units.values().cloned().collect())
            .unwrap_or_default();
        units.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(units)
    }

    async fn register_bargaining_unit(&self, unit: BargainingUnit) -> Result<(), CatalogError> {
        self.orgs
            .write()
            .entry(unit.organization_id)
            .or_default()
            .units
            .insert(unit.id, unit);
        Ok(())
    }

    async fn register_agreement(&self, agreement: Agreement) -> Result<(), CatalogError> {
        let mut guard = self.orgs.write();
        let catalog = guard.entry(agreement.organization_id).or_default();
        if !catalog.units.contains_key(&agreement.bargaining_unit_id) {
            return Err(CatalogError::NotFound {
                kind: "bargaining unit",
                id: agreement.bargaining_unit_id.to_string(),
            });
        }
        catalog.agreements.insert(agreement.id, agreement);
        Ok(())
    }

    async fn template(
        &self,
        org: &OrganizationId,
        agreement_id: &AgreementId,
        grievance_type: GrievanceType,
        step_number: u32,
    ) -> Result<Option<StepTemplate>, CatalogError> {
        Ok(self.orgs.read().get(org).and_then(|c| {
            c.templates
                .get(&(*agreement_id, grievance_type))
                .and_then(|steps| steps.iter().find(|t| t.step_number == step_number))
                .cloned()
        }))
    }

    async fn templates(
        &self,
        org: &OrganizationId,
        agreement_id: &AgreementId,
        grievance_type: GrievanceType,
    ) -> Result<Vec<StepTemplate>, CatalogError> {
        Ok(self
            .orgs
            .read()
            .get(org)
            .and_then(|c| c.templates.get(&(*agreement_id, grievance_type)).cloned())
            .unwrap_or_default())
    }

    async fn save_templates(
        &self,
        org: &OrganizationId,
        agreement_id: &AgreementId,
        grievance_type: GrievanceType,
        steps: Vec<StepTemplateInput>,
    ) -> Result<Vec<StepTemplate>, CatalogError> {
        let ordered = order_and_renumber(*agreement_id, grievance_type, steps)?;

        let mut guard = self.orgs.write();
        let catalog = guard
            .get_mut(org)
            .filter(|c| c.agreements.contains_key(agreement_id))
            .ok_or_else(|| CatalogError::NotFound {
                kind: "agreement",
                id: agreement_id.to_string(),
            })?;
        catalog
            .templates
            .insert((*agreement_id, grievance_type), ordered.clone());

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
        let mut all: Vec<StepTemplate> = self
            .orgs
            .read()
            .get(org)
            .map(|c| c.templates.values().flatten().cloned().collect())
            .unwrap_or_default();
        all.sort_by_key(|t| (t.agreement_id, t.grievance_type, t.step_number));
        Ok(all)
    }
}
