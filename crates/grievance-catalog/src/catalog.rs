//! # Template Catalog Port
//!
//! The [`TemplateCatalog`] trait is the seam between the engine and
//! wherever agreements and templates are stored. The in-memory catalog in
//! this crate and the Postgres catalog in `grievance-api` both implement it.
//!
//! Every method takes the caller's [`OrganizationId`]. An agreement or unit
//! that exists but belongs to another organization is indistinguishable
//! from one that does not exist.

use std::collections::HashMap;

use async_trait::async_trait;
use grievance_core::{AgreementId, BargainingUnitId, GrievanceType, OrganizationId};

use crate::error::CatalogError;
use crate::reference::{Agreement, BargainingUnit};
use crate::template::{StepTemplate, StepTemplateInput};

#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    async fn agreement(
        &self,
        org: &OrganizationId,
        id: &AgreementId,
    ) -> Result<Option<Agreement>, CatalogError>;

    async fn bargaining_unit(
        &self,
        org: &OrganizationId,
        id: &BargainingUnitId,
    ) -> Result<Option<BargainingUnit>, CatalogError>;

    async fn bargaining_units(&self, org: &OrganizationId)
        -> Result<Vec<BargainingUnit>, CatalogError>;

    /// Insert or replace a bargaining unit.
    async fn register_bargaining_unit(&self, unit: BargainingUnit) -> Result<(), CatalogError>;

    /// Insert or replace an agreement. Its bargaining unit must already be
    /// registered in the same organization.
    async fn register_agreement(&self, agreement: Agreement) -> Result<(), CatalogError>;

    /// The template for one step, or `Ok(None)` when the agreement defines
    /// no such step.
    async fn template(
        &self,
        org: &OrganizationId,
        agreement_id: &AgreementId,
        grievance_type: GrievanceType,
        step_number: u32,
    ) -> Result<Option<StepTemplate>, CatalogError>;

    /// All templates for (agreement, type), ordered by step number.
    async fn templates(
        &self,
        org: &OrganizationId,
        agreement_id: &AgreementId,
        grievance_type: GrievanceType,
    ) -> Result<Vec<StepTemplate>, CatalogError>;

    /// Replace the full template set for (agreement, type).
    ///
    /// The set is ordered and renumbered with
    /// [`order_and_renumber`](crate::template::order_and_renumber) and then
    /// swapped in atomically: readers see either the old set or the new
    /// one, never a mixture. Fails with `NotFound` when the agreement is
    /// not in the organization.
    async fn save_templates(
        &self,
        org: &OrganizationId,
        agreement_id: &AgreementId,
        grievance_type: GrievanceType,
        steps: Vec<StepTemplateInput>,
    ) -> Result<Vec<StepTemplate>, CatalogError>;

    /// Every template in the organization, for building a [`TemplateIndex`].
    async fn all_templates(&self, org: &OrganizationId) -> Result<Vec<StepTemplate>, CatalogError>;
}

/// Lookup table keyed by `(agreement, type, step)`, built once per
/// analytics request.
#[derive(Debug, Clone, Default)]
pub struct TemplateIndex {
    by_key: HashMap<(AgreementId, GrievanceType, u32), StepTemplate>,
}

impl TemplateIndex {
    pub fn new(templates: impl IntoIterator<Item = StepTemplate>) -> Self {
        let by_key = templates
            .into_iter()
            .map(|t| ((t.agreement_id, t.grievance_type, t.step_number), t))
            .collect();
        Self { by_key }
    }

    pub fn get(
        &self,
        agreement_id: AgreementId,
        grievance_type: GrievanceType,
        step_number: u32,
    ) -> Option<&StepTemplate> {
        self.by_key.get(&(agreement_id, grievance_type, step_number))
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
