//! Commands that call the generative backend: `plan`, `revise`,
//! `voice-parse`, and `advise`.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use itinera_core::document::{ItineraryDocument, VoiceIntent};
use itinera_core::planner::{Planner, TripRequest};
use itinera_core::recovery;
use itinera_core::upstream::GenerativeBackend;

use crate::recover_cmd::read_input;

/// Pretty-print `value` to `output`, or to stdout when no path is given.
fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode output")?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn summarize(doc: &ItineraryDocument) {
    eprintln!(
        "{} day(s), budget total {:.0} CNY, activities {:.0} CNY",
        doc.daily_itinerary.len(),
        doc.budget_breakdown.total,
        doc.activity_cost_total()
    );
}

/// Run the plan command.
pub async fn run_plan<B: GenerativeBackend>(
    planner: &Planner<B>,
    request: &TripRequest,
    output: Option<&Path>,
) -> Result<()> {
    let doc = planner
        .create_itinerary(request)
        .await
        .with_context(|| format!("failed to plan a trip to {}", request.destination))?;
    summarize(&doc);
    emit(&doc, output)
}

/// Run the revise command. `prior` is a saved itinerary; it goes through
/// the same recovery pipeline so hand-edited files still load.
pub async fn run_revise<B: GenerativeBackend>(
    planner: &Planner<B>,
    prior: &Path,
    feedback: &str,
    output: Option<&Path>,
) -> Result<()> {
    let text = read_input(Some(prior))?;
    let prior_doc = recovery::recover_itinerary(&text)
        .with_context(|| format!("{} is not a usable itinerary", prior.display()))?;

    let patch = planner
        .revise_itinerary(&prior_doc, feedback)
        .await
        .context("failed to revise itinerary")?;

    let untouched = patch.untouched_days(&prior_doc);
    if !untouched.is_empty() {
        eprintln!("Unchanged day(s): {untouched:?}");
    }
    let doc = patch.into_document();
    summarize(&doc);
    emit(&doc, output)
}

/// Run the voice-parse command.
pub async fn run_voice_parse<B: GenerativeBackend>(
    planner: &Planner<B>,
    text: &str,
    today: Option<NaiveDate>,
) -> Result<()> {
    let intent = match today {
        Some(today) => planner.parse_voice_query_on(text, today).await,
        None => planner.parse_voice_query(text).await,
    };
    if let VoiceIntent::TravelPlan(plan) = &intent {
        let plan = plan.clone().with_derived_dates();
        match TripRequest::from_intent(&plan) {
            Some(request) => eprintln!(
                "Ready to plan: {} for {} day(s), {:.0} CNY",
                request.destination, request.days, request.budget
            ),
            None => eprintln!("Travel plan is missing a destination, day count, or budget"),
        }
    }
    emit(&intent, None)
}

/// Run the advise command.
pub async fn run_advise<B: GenerativeBackend>(
    planner: &Planner<B>,
    plan_info: &str,
    spent: f64,
    budget: f64,
) -> Result<()> {
    let advice = planner.analyze_expenses(plan_info, spent, budget).await;
    println!("{advice}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use itinera_core::upstream::{Generation, UpstreamError};

    use super::*;

    struct FixedBackend {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedBackend {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl GenerativeBackend for FixedBackend {
        async fn generate(&self, prompt: &str) -> Result<Generation, UpstreamError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(Generation::ok(self.reply.clone()))
        }
    }

    const REPLY: &str = r#"{"overview":"o","daily_itinerary":[{"day":1,"activities":[{"activity":"Temple","estimated_cost":30}]}],"transportation":{},"accommodation_summary":{},"budget_breakdown":{"total":500},"tips":[]}"#;

    fn request() -> TripRequest {
        TripRequest {
            destination: "Xi'an".to_string(),
            days: 1,
            budget: 500.0,
            travelers_count: 1,
            preferences: None,
            start_date: None,
        }
    }

    #[tokio::test]
    async fn plan_writes_recovered_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("trip.json");
        let planner = Planner::new(FixedBackend::new(&format!("Sure! {REPLY}")));

        run_plan(&planner, &request(), Some(&out)).await.unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(saved["budget_breakdown"]["total"], 500.0);
    }

    #[tokio::test]
    async fn revise_loads_prior_file_leniently() {
        let dir = tempfile::TempDir::new().unwrap();
        let prior = dir.path().join("prior.json");
        // Trailing comma: a hand-edited file.
        std::fs::write(&prior, REPLY.replace("500}", "500,}")).unwrap();
        let out = dir.path().join("revised.json");

        let revised = REPLY.replace("Temple", "Wall");
        let backend = FixedBackend::new(&revised);
        let planner = Planner::new(backend);
        run_revise(&planner, &prior, "walk the wall", Some(&out))
            .await
            .unwrap();

        let saved = std::fs::read_to_string(&out).unwrap();
        assert!(saved.contains("\"Wall\""), "got: {saved}");
    }

    #[tokio::test]
    async fn revise_rejects_unusable_prior() {
        let dir = tempfile::TempDir::new().unwrap();
        let prior = dir.path().join("prior.json");
        std::fs::write(&prior, "not an itinerary").unwrap();

        let planner = Planner::new(FixedBackend::new(REPLY));
        let err = run_revise(&planner, &prior, "x", None).await.unwrap_err();
        assert!(
            err.to_string().contains("is not a usable itinerary"),
            "unexpected error: {err}"
        );
    }
}
