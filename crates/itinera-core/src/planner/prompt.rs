//! Prompt builders. Pure functions of their inputs.

use chrono::NaiveDate;

use super::TripRequest;
use crate::document::ItineraryDocument;

/// The itinerary schema the model is asked to fill in. Every cost field is
/// shown as a bare number.
const ITINERARY_SCHEMA: &str = r#"{
    "overview": "one-paragraph summary of the trip",
    "daily_itinerary": [
        {
            "day": 1,
            "title": "title of day one",
            "activities": [
                {
                    "time": "09:00",
                    "activity": "what to do",
                    "location": "where",
                    "poi_name": "exact point-of-interest name for map search",
                    "description": "details",
                    "estimated_cost": 50,
                    "duration": "2 hours"
                }
            ],
            "meals": {
                "breakfast": "breakfast suggestion",
                "lunch": "lunch suggestion",
                "dinner": "dinner suggestion"
            },
            "accommodation": "where to stay tonight"
        }
    ],
    "transportation": {
        "to_destination": "how to get there",
        "local": "how to get around",
        "estimated_cost": 500
    },
    "accommodation_summary": {
        "type": "hotel type",
        "suggestions": ["hotel 1", "hotel 2"],
        "estimated_cost_per_night": 200,
        "total_nights": 3,
        "total_cost": 600
    },
    "budget_breakdown": {
        "transportation": 500,
        "accommodation": 600,
        "meals": 400,
        "attractions": 300,
        "shopping": 200,
        "emergency": 100,
        "total": 2100
    },
    "tips": ["tip 1", "tip 2", "tip 3"]
}"#;

const NUMERIC_RULES: &str = "\
Rules:
1. Every cost, price, and budget field is a bare number such as 100. Never \"about 100\", \"100 yuan\", an expression like 1000 + 100, or a description.
2. Every activity has a \"poi_name\": the standard name of the place as a map search would find it (\"Visit the Presidential Palace\" has poi_name \"Nanjing Presidential Palace\").
3. Recommend only real, lawful, publicly listed venues. Keep the content wholesome.
4. The budget total stays close to, and not above, the stated budget.
5. Return only the JSON object. No markdown fences, no comments, no text before or after it.";

/// Prompt for a fresh itinerary.
pub fn itinerary(request: &TripRequest) -> String {
    let preferences = request
        .preferences
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or("general sightseeing");
    let start = match request.start_date {
        Some(date) => format!("Start date: {date}\n"),
        None => String::new(),
    };

    format!(
        "You are a careful travel-planning assistant. Plan a trip from the details below.\n\
         \n\
         Destination: {destination}\n\
         Days: {days}\n\
         {start}\
         Budget: {budget} CNY\n\
         Travelers: {travelers}\n\
         Preferences: {preferences}\n\
         \n\
         Produce a day-by-day itinerary with transportation, accommodation, a budget breakdown, and tips, \
         in exactly this JSON shape:\n\
         {ITINERARY_SCHEMA}\n\
         \n\
         {NUMERIC_RULES}\n",
        destination = request.destination,
        days = request.days,
        budget = request.budget,
        travelers = request.travelers_count,
    )
}

/// Prompt to regenerate `prior` with the user's `feedback` applied.
pub fn revision(prior: &ItineraryDocument, feedback: &str) -> Result<String, serde_json::Error> {
    let prior_json = serde_json::to_string_pretty(prior)?;
    Ok(format!(
        "You are a careful travel-planning assistant. Here is an existing itinerary:\n\
         {prior_json}\n\
         \n\
         The traveler asks for these changes:\n\
         {feedback}\n\
         \n\
         Return the complete revised itinerary, every day included, in the same JSON shape as above. \
         Keep the days the traveler did not ask to change as they are, and update the budget breakdown \
         to match.\n\
         \n\
         {NUMERIC_RULES}\n"
    ))
}

/// Prompt to classify a transcribed utterance. `today` anchors relative
/// dates such as "next Friday".
pub fn voice_query(text: &str, today: NaiveDate) -> String {
    format!(
        r#"Extract structured information from this spoken request.

Request: {text}
Today's date: {today}

First decide the intent:
- Trip planning ("go to X", "plan a trip", dates, budget, number of people): query_type "travel_plan".
- Expense logging ("spent", "cost", "paid", "record an expense"): query_type "expense".
- Anything else: query_type "query".

For travel_plan extract: destination, start_date and end_date (YYYY-MM-DD), days, budget (a bare number), travelers_count, preferences (or null).
For expense extract: category (one of transport, lodging, food, attractions, shopping, other), amount (a bare number), description.

Examples:
{{"query_type": "travel_plan", "destination": "Chongqing", "start_date": "2025-10-27", "end_date": "2025-10-31", "days": 5, "budget": 3000, "travelers_count": 2, "preferences": null}}
{{"query_type": "expense", "category": "lodging", "amount": 300, "description": "hotel"}}

Return only the JSON object, with no comments, markdown, or other text."#
    )
}

/// Prompt for free-text budget advice.
pub fn expense_analysis(plan_info: &str, spent: f64, budget: f64) -> String {
    let remaining = budget - spent;
    format!(
        "You are a travel budget assistant. Review the following.\n\
         \n\
         Trip: {plan_info}\n\
         Total budget: {budget} CNY\n\
         Spent so far: {spent} CNY\n\
         Remaining: {remaining} CNY\n\
         \n\
         Cover how the budget is being used, whether the trip is over or under budget, \
         what to watch for in upcoming spending, and how to make the most of what remains. \
         Keep it short and friendly.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TripRequest {
        TripRequest {
            destination: "Nanjing".to_string(),
            days: 3,
            budget: 3000.0,
            travelers_count: 2,
            preferences: None,
            start_date: None,
        }
    }

    #[test]
    fn itinerary_prompt_carries_trip_details() {
        let prompt = itinerary(&request());
        assert!(prompt.contains("Destination: Nanjing"));
        assert!(prompt.contains("Days: 3"));
        assert!(prompt.contains("Budget: 3000 CNY"));
        assert!(prompt.contains("Travelers: 2"));
        assert!(prompt.contains("Preferences: general sightseeing"));
        assert!(!prompt.contains("Start date"));
    }

    #[test]
    fn itinerary_prompt_demands_numbers_and_poi_names() {
        let prompt = itinerary(&request());
        assert!(prompt.contains("\"estimated_cost\": 50"));
        assert!(prompt.contains("\"poi_name\""));
        assert!(prompt.contains("bare number"));
    }

    #[test]
    fn itinerary_prompt_includes_start_date_when_known() {
        let mut req = request();
        req.start_date = NaiveDate::from_ymd_opt(2025, 10, 27);
        req.preferences = Some("food, museums".to_string());
        let prompt = itinerary(&req);
        assert!(prompt.contains("Start date: 2025-10-27\n"));
        assert!(prompt.contains("Preferences: food, museums"));
    }

    #[test]
    fn revision_prompt_embeds_prior_and_feedback() {
        let raw = r#"{"overview": "two days", "daily_itinerary": [{"day": 1, "title": "Old town"}], "transportation": {}, "accommodation_summary": {}, "budget_breakdown": {"total": 800}, "tips": []}"#;
        let prior = crate::recovery::recover_itinerary(raw).unwrap();
        let prompt = revision(&prior, "swap day 1 for a museum day").unwrap();
        assert!(prompt.contains("\"overview\": \"two days\""));
        assert!(prompt.contains("\"title\": \"Old town\""));
        assert!(prompt.contains("swap day 1 for a museum day"));
        assert!(prompt.contains("complete revised itinerary"));
    }

    #[test]
    fn voice_prompt_anchors_today() {
        let today = NaiveDate::from_ymd_opt(2025, 10, 20).unwrap();
        let prompt = voice_query("next friday to Chengdu", today);
        assert!(prompt.contains("Request: next friday to Chengdu"));
        assert!(prompt.contains("Today's date: 2025-10-20"));
        assert!(prompt.contains(r#"{"query_type": "expense""#));
    }

    #[test]
    fn expense_prompt_computes_remaining() {
        let prompt = expense_analysis("3 days in Xi'an", 1200.0, 3000.0);
        assert!(prompt.contains("Spent so far: 1200 CNY"));
        assert!(prompt.contains("Remaining: 1800 CNY"));
    }
}
