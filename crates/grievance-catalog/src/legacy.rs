//! # Legacy Stage Migration
//!
//! Early template sets carried no stage; the stage was guessed from the
//! step description at save time. The catalog now stores a typed stage, so
//! step lists that omit it pass through [`migrate_legacy_steps`] first.
//!
//! Inference rules, applied to the lower-cased description (the step name
//! when the description is missing or blank):
//!
//! | Text contains                              | Stage         |
//! |--------------------------------------------|---------------|
//! | `informal`, `discussion`, `supervisor`     | `INFORMAL`    |
//! | `arbitration`                              | `ARBITRATION` |
//! | anything else                              | `FORMAL`      |
//!
//! Every inferred stage is logged at WARN and counted in
//! `grievance_template_stage_inferred_total` so operators can find and fix
//! template sets that still depend on the heuristic.

use grievance_core::{AgreementId, GrievanceStage};
use serde::{Deserialize, Serialize};

use crate::template::StepTemplateInput;

/// Metric incremented once per step whose stage had to be inferred.
pub const STAGE_INFERRED_METRIC: &str = "grievance_template_stage_inferred_total";

/// A template step in the legacy shape: stage optional, everything else
/// lenient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyStep {
    #[serde(default)]
    pub step_number: u32,
    pub name: String,
    #[serde(default)]
    pub stage: Option<GrievanceStage>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub time_limit: Option<String>,
    #[serde(default)]
    pub time_limit_days: u32,
    #[serde(default)]
    pub is_calendar_days: bool,
    #[serde(default)]
    pub required_participants: Vec<String>,
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Guess a stage from free text.
pub fn infer_stage(text: &str) -> GrievanceStage {
    let text = text.to_lowercase();
    if ["informal", "discussion", "supervisor"]
        .iter()
        .any(|kw| text.contains(kw))
    {
        GrievanceStage::Informal
    } else if text.contains("arbitration") {
        GrievanceStage::Arbitration
    } else {
        GrievanceStage::Formal
    }
}

impl LegacyStep {
    /// Text the stage is inferred from: the description, else the name.
    fn inference_text(&self) -> &str {
        match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d,
            _ => &self.name,
        }
    }
}

/// Convert legacy steps to typed save input, inferring missing stages.
///
/// A step without a number takes its 1-based position in the list.
pub fn migrate_legacy_steps(agreement_id: AgreementId, steps: Vec<LegacyStep>) -> Vec<StepTemplateInput> {
    steps
        .into_iter()
        .zip(1u32..)
        .map(|(step, position)| {
            let step_number = if step.step_number == 0 {
                position
            } else {
                step.step_number
            };
            let stage = match step.stage {
                Some(stage) => stage,
                None => {
                    let inferred = infer_stage(step.inference_text());
                    tracing::warn!(
                        agreement_id = %agreement_id,
                        step_number,
                        step_name = %step.name,
                        inferred_stage = %inferred,
                        "template step has no stage; inferred from keywords"
                    );
                    metrics::counter!(STAGE_INFERRED_METRIC, "stage" => inferred.as_str())
                        .increment(1);
                    inferred
                }
            };
            StepTemplateInput {
                step_number,
                stage,
                name: step.name,
                description: step.description,
                time_limit: step.time_limit,
                time_limit_days: step.time_limit_days,
                is_calendar_days: step.is_calendar_days,
                required_participants: step.required_participants,
                required_documents: step.required_documents,
                notes: step.notes,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(name: &str, stage: Option<GrievanceStage>) -> LegacyStep {
        LegacyStep {
            step_number: 0,
            name: name.to_string(),
            stage,
            description: None,
            time_limit: Some("10 working days".into()),
            time_limit_days: 10,
            is_calendar_days: false,
            required_participants: vec![],
            required_documents: vec![],
            notes: None,
        }
    }

    #[test]
    fn keyword_inference() {
        assert_eq!(infer_stage("Informal Discussion"), GrievanceStage::Informal);
        assert_eq!(infer_stage("Meeting with SUPERVISOR"), GrievanceStage::Informal);
        assert_eq!(infer_stage("Referral to Arbitration"), GrievanceStage::Arbitration);
        assert_eq!(infer_stage("Step 2 - Department Head"), GrievanceStage::Formal);
    }

    #[test]
    fn informal_keywords_win_over_arbitration() {
        assert_eq!(
            infer_stage("Pre-arbitration discussion"),
            GrievanceStage::Informal
        );
    }

    #[test]
    fn description_keywords_drive_inference() {
        let mut step = legacy("Step 1", None);
        step.description = Some("Informal discussion with the immediate supervisor".into());
        let mut referral = legacy("Step 4", None);
        referral.description = Some("Referral to binding arbitration".into());

        let migrated = migrate_legacy_steps(AgreementId::new(), vec![step, referral]);
        assert_eq!(migrated[0].stage, GrievanceStage::Informal);
        assert_eq!(migrated[1].stage, GrievanceStage::Arbitration);
    }

    #[test]
    fn description_takes_precedence_over_name() {
        let mut step = legacy("Supervisor review", None);
        step.description = Some("Written grievance to the department head".into());
        let migrated = migrate_legacy_steps(AgreementId::new(), vec![step]);
        assert_eq!(migrated[0].stage, GrievanceStage::Formal);
    }

    #[test]
    fn blank_description_falls_back_to_name() {
        let mut step = legacy("Supervisor meeting", None);
        step.description = Some("   ".into());
        let migrated = migrate_legacy_steps(AgreementId::new(), vec![step]);
        assert_eq!(migrated[0].stage, GrievanceStage::Informal);
    }

    #[test]
    fn explicit_stage_is_kept() {
        let migrated = migrate_legacy_steps(
            AgreementId::new(),
            vec![legacy("Supervisor review", Some(GrievanceStage::Formal))],
        );
        assert_eq!(migrated[0].stage, GrievanceStage::Formal);
    }

    #[test]
    fn missing_numbers_take_list_position() {
        let migrated = migrate_legacy_steps(
            AgreementId::new(),
            vec![legacy("Informal", None), legacy("Grievance Committee", None)],
        );
        assert_eq!(migrated[0].step_number, 1);
        assert_eq!(migrated[1].step_number, 2);
        assert_eq!(migrated[1].stage, GrievanceStage::Formal);
        assert_eq!(migrated[0].time_limit_days, 10);
    }

    #[test]
    fn legacy_json_without_stage_parses() {
        let json = r#"[{"name": "Supervisor", "time_limit_days": 5}]"#;
        let steps: Vec<LegacyStep> = serde_json::from_str(json).unwrap();
        assert_eq!(steps[0].stage, None);
        assert!(!steps[0].is_calendar_days);
    }
}
