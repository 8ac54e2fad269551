//! Caller paths: each one prompts the generative backend and hands the raw
//! text to the recovery pipeline.
//!
//! Itinerary creation and revision surface every failure to the caller.
//! Voice parsing and expense analysis never fail; they degrade to a
//! fallback value instead.

pub mod prompt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::document::{ItineraryDocument, ItineraryPatch, TravelPlanIntent, VoiceIntent};
use crate::recovery::{self, RecoveryError};
use crate::upstream::{GenerativeBackend, UpstreamError};

/// Shown in place of budget advice when the backend is unavailable.
pub const ANALYSIS_UNAVAILABLE: &str =
    "Budget analysis is temporarily unavailable. Please try again later.";

/// Errors from the itinerary paths.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlanningError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error("encoding prior itinerary: {0}")]
    Encode(String),
}

/// What the traveler asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    pub destination: String,
    pub days: u32,
    /// Total budget in CNY.
    pub budget: f64,
    pub travelers_count: u32,
    #[serde(default)]
    pub preferences: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

impl TripRequest {
    /// Build a request from a voice intent. `None` unless the intent names
    /// a destination, a day count, and a budget.
    pub fn from_intent(intent: &TravelPlanIntent) -> Option<Self> {
        if intent.destination.trim().is_empty() {
            return None;
        }
        Some(Self {
            destination: intent.destination.clone(),
            days: intent.days.filter(|d| *d > 0)?,
            budget: intent.budget?,
            travelers_count: intent.travelers_count.unwrap_or(1).max(1),
            preferences: intent.preferences.clone(),
            start_date: intent.start_date,
        })
    }
}

/// Drives a [`GenerativeBackend`] through the recovery pipeline.
pub struct Planner<B> {
    backend: B,
}

impl<B: GenerativeBackend> Planner<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Generate a fresh itinerary.
    pub async fn create_itinerary(
        &self,
        request: &TripRequest,
    ) -> Result<ItineraryDocument, PlanningError> {
        tracing::info!(
            destination = %request.destination,
            days = request.days,
            budget = request.budget,
            "creating itinerary"
        );
        let raw = self.complete(&prompt::itinerary(request)).await?;
        let document = recovery::recover_itinerary(&raw)?;

        let activity_total = document.activity_cost_total();
        if document.daily_itinerary.len() != request.days as usize {
            tracing::warn!(
                requested = request.days,
                generated = document.daily_itinerary.len(),
                "itinerary day count differs from request"
            );
        }
        tracing::info!(
            days = document.daily_itinerary.len(),
            total = document.budget_breakdown.total,
            activity_total,
            "itinerary created"
        );
        Ok(document)
    }

    /// Regenerate `prior` with `feedback` applied. The result replaces the
    /// prior document wholesale.
    pub async fn revise_itinerary(
        &self,
        prior: &ItineraryDocument,
        feedback: &str,
    ) -> Result<ItineraryPatch, PlanningError> {
        tracing::info!(feedback_chars = feedback.chars().count(), "revising itinerary");
        let prompt =
            prompt::revision(prior, feedback).map_err(|e| PlanningError::Encode(e.to_string()))?;
        let raw = self.complete(&prompt).await?;
        let patch = recovery::recover_itinerary_patch(&raw)?;

        let untouched = patch.untouched_days(prior);
        tracing::info!(
            days = patch.document.daily_itinerary.len(),
            untouched = ?untouched,
            "itinerary revised"
        );
        Ok(patch)
    }

    /// Classify a transcribed utterance relative to today's local date.
    pub async fn parse_voice_query(&self, text: &str) -> VoiceIntent {
        let today = chrono::Local::now().date_naive();
        self.parse_voice_query_on(text, today).await
    }

    /// Classify a transcribed utterance. Never fails: an upstream error
    /// becomes the `query` fallback carrying `text`.
    pub async fn parse_voice_query_on(&self, text: &str, today: NaiveDate) -> VoiceIntent {
        match self.complete(&prompt::voice_query(text, today)).await {
            Ok(raw) => {
                // The fallback must carry what the user said, not the model's reply.
                match recovery::recover_voice_intent(&raw) {
                    VoiceIntent::Query { error, .. } => VoiceIntent::fallback(text, error),
                    intent => {
                        tracing::info!(query_type = intent.query_type(), "voice query classified");
                        intent
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "voice query falls back to query");
                VoiceIntent::fallback(text, Some(e.to_string()))
            }
        }
    }

    /// Free-text budget advice. Degrades to [`ANALYSIS_UNAVAILABLE`].
    pub async fn analyze_expenses(&self, plan_info: &str, spent: f64, budget: f64) -> String {
        match self
            .complete(&prompt::expense_analysis(plan_info, spent, budget))
            .await
        {
            Ok(advice) => advice.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "expense analysis unavailable");
                ANALYSIS_UNAVAILABLE.to_string()
            }
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.backend.generate(prompt).await?.into_content()
    }
}
