//! Onboarding wizard state and its transitions.
//!
//! Step one takes a CSV upload and extracts its stages; step two collects the
//! category for each stage plus the client identifiers, and produces the
//! submission record.

use crate::config::OnboardingConfig;
use crate::error::{OnboardingError, SubmissionError};
use crate::mapping::{build_payload, SubmissionRecord};
use crate::models::{ClientIdentifiers, StageMapping};
use crate::stages::{check_file_name, extract_stages};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Step {
    #[default]
    Upload,
    Mapping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    FileLoaded { name: String, contents: String },
    Continue,
    AssignCategory { index: usize, category: String },
    ClearCategory { index: usize },
    SetSubaccount(String),
    SetAdAccount(String),
    SetCalendar { name: String, id: String },
    SubmissionSucceeded,
    SubmissionFailed(SubmissionError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardState {
    pub step: Step,
    pub file_name: Option<String>,
    pub csv_text: String,
    pub mappings: Vec<StageMapping>,
    pub identifiers: ClientIdentifiers,
    pub error: Option<String>,
}

impl WizardState {
    pub fn apply(
        &self,
        event: WizardEvent,
        config: &OnboardingConfig,
    ) -> Result<WizardState, OnboardingError> {
        let mut next = self.clone();
        next.error = None;

        match event {
            WizardEvent::FileLoaded { name, contents } => {
                check_file_name(&name)?;
                next.file_name = Some(name);
                next.csv_text = contents;
                next.mappings.clear();
                next.step = Step::Upload;
            }
            WizardEvent::Continue => {
                if self.step != Step::Upload {
                    return Err(OnboardingError::WrongStep);
                }
                if self.csv_text.trim().is_empty() {
                    return Err(OnboardingError::EmptyUpload);
                }
                let stages = extract_stages(&self.csv_text, &config.stage_aliases)?;
                next.mappings = stages.into_iter().map(StageMapping::unassigned).collect();
                next.step = Step::Mapping;
            }
            WizardEvent::AssignCategory { index, category } => {
                let canonical = config
                    .taxonomy()
                    .resolve(&category)
                    .map(|c| c.to_string())
                    .ok_or(OnboardingError::UnknownCategory(category))?;
                next.mapping_mut(index)?.category = Some(canonical);
            }
            WizardEvent::ClearCategory { index } => {
                next.mapping_mut(index)?.category = None;
            }
            WizardEvent::SetSubaccount(id) => next.identifiers.subaccount_id = id,
            WizardEvent::SetAdAccount(id) => next.identifiers.ad_account_id = id,
            WizardEvent::SetCalendar { name, id } => {
                next.identifiers.calendars.insert(name, id);
            }
            WizardEvent::SubmissionSucceeded => {
                next = WizardState::default();
            }
            WizardEvent::SubmissionFailed(err) => {
                return Err(OnboardingError::Submission(err));
            }
        }

        Ok(next)
    }

    /// Applies `event`, keeping the current state with the error recorded inline on failure.
    pub fn dispatch(self, event: WizardEvent, config: &OnboardingConfig) -> WizardState {
        match self.apply(event, config) {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(step = ?self.step, error = %err, "wizard action rejected");
                WizardState {
                    error: Some(err.to_string()),
                    ..self
                }
            }
        }
    }

    pub fn ready_to_submit(&self) -> Result<(), OnboardingError> {
        if self.step != Step::Mapping {
            return Err(OnboardingError::WrongStep);
        }
        if self.identifiers.subaccount_id.trim().is_empty() {
            return Err(OnboardingError::MissingField("ghl_subaccount_id"));
        }
        if self.identifiers.ad_account_id.trim().is_empty() {
            return Err(OnboardingError::MissingField("meta_ad_account_id"));
        }
        if self.identifiers.calendars.values().all(|id| id.trim().is_empty()) {
            return Err(OnboardingError::MissingField("calendar id"));
        }
        Ok(())
    }

    pub fn payload(&self, config: &OnboardingConfig) -> SubmissionRecord {
        build_payload(&self.mappings, &self.identifiers, &config.taxonomy())
    }

    pub fn unassigned_stages(&self) -> impl Iterator<Item = &str> {
        self.mappings
            .iter()
            .filter(|m| m.category.is_none())
            .map(|m| m.stage_name.as_str())
    }

    fn mapping_mut(&mut self, index: usize) -> Result<&mut StageMapping, OnboardingError> {
        if self.step != Step::Mapping {
            return Err(OnboardingError::WrongStep);
        }
        self.mappings
            .get_mut(index)
            .ok_or(OnboardingError::StageOutOfRange(index))
    }
}
