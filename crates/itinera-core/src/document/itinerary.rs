//! Typed itinerary documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lenient, required_field};
use crate::recovery::{InterpretFault, RecoveryError, TargetShape};

/// A complete generated travel plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItineraryDocument {
    pub overview: String,
    pub daily_itinerary: Vec<DayPlan>,
    pub transportation: Transportation,
    pub accommodation_summary: AccommodationSummary,
    pub budget_breakdown: BudgetBreakdown,
    pub tips: Vec<String>,
}

impl ItineraryDocument {
    /// Project a parsed object onto the itinerary shape.
    ///
    /// All six top-level sections must be present and non-null. Nothing is
    /// defaulted at this level, so a partial reply never passes for a plan.
    /// An empty `daily_itinerary` is rejected.
    pub fn from_object(
        obj: &Map<String, Value>,
        shape: TargetShape,
    ) -> Result<Self, RecoveryError> {
        let doc = Self {
            overview: required_field(obj, shape, "overview")?,
            daily_itinerary: required_field(obj, shape, "daily_itinerary")?,
            transportation: required_field(obj, shape, "transportation")?,
            accommodation_summary: required_field(obj, shape, "accommodation_summary")?,
            budget_breakdown: required_field(obj, shape, "budget_breakdown")?,
            tips: required_field::<TipList>(obj, shape, "tips")?.0,
        };
        if doc.daily_itinerary.is_empty() {
            return Err(RecoveryError::InterpretationFailed {
                shape,
                field: "daily_itinerary".to_string(),
                fault: InterpretFault::Invalid("no day records".to_string()),
            });
        }
        Ok(doc)
    }

    /// Every activity across all days, in order.
    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.daily_itinerary.iter().flat_map(|day| day.activities.iter())
    }

    /// Sum of the activity cost estimates.
    pub fn activity_cost_total(&self) -> f64 {
        self.activities().map(|a| a.estimated_cost).sum()
    }
}

#[derive(Debug, Default, Deserialize)]
struct TipList(#[serde(deserialize_with = "lenient::text_list")] Vec<String>);

/// One day of the plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayPlan {
    #[serde(deserialize_with = "lenient::count")]
    pub day: u32,
    #[serde(deserialize_with = "lenient::text")]
    pub title: String,
    pub activities: Vec<Activity>,
    pub meals: Option<Meals>,
    #[serde(deserialize_with = "lenient::opt_venue")]
    pub accommodation: Option<Venue>,
}

/// One scheduled activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Activity {
    #[serde(deserialize_with = "lenient::text")]
    pub time: String,
    #[serde(deserialize_with = "lenient::text")]
    pub activity: String,
    #[serde(deserialize_with = "lenient::text")]
    pub location: String,
    /// Exact place name for map search. Optional in practice even though
    /// the prompt demands it.
    #[serde(deserialize_with = "lenient::opt_text")]
    pub poi_name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::amount")]
    pub estimated_cost: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub duration: String,
}

impl Activity {
    /// The string to hand to a map search: `poi_name`, else `location`,
    /// else the activity text itself.
    pub fn map_query(&self) -> &str {
        [self.poi_name.as_deref(), Some(self.location.as_str())]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or(&self.activity)
    }
}

/// Meal suggestions for a day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meals {
    #[serde(deserialize_with = "lenient::opt_venue")]
    pub breakfast: Option<Venue>,
    #[serde(deserialize_with = "lenient::opt_venue")]
    pub lunch: Option<Venue>,
    #[serde(deserialize_with = "lenient::opt_venue")]
    pub dinner: Option<Venue>,
}

/// A meal or lodging entry. Older plans carry a plain suggestion string;
/// newer ones a detailed record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Venue {
    Suggestion(String),
    Detailed(VenueDetail),
}

impl Venue {
    /// Resolve a raw value into one of the two shapes.
    ///
    /// Blank strings, `null`, and anything that is neither a string nor an
    /// object yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(Self::Suggestion(s)),
            Value::Object(_) => match serde_json::from_value::<VenueDetail>(value) {
                Ok(detail) => Some(Self::Detailed(detail)),
                Err(e) => {
                    tracing::debug!(error = %e, "dropping malformed venue record");
                    None
                }
            },
            _ => None,
        }
    }

    /// Display name of the venue.
    pub fn name(&self) -> &str {
        match self {
            Self::Suggestion(s) => s,
            Self::Detailed(d) => &d.name,
        }
    }

    /// The string to hand to a map search.
    pub fn map_query(&self) -> &str {
        match self {
            Self::Suggestion(s) => s,
            Self::Detailed(d) => d
                .poi_name
                .as_deref()
                .or(Some(d.name.as_str()).filter(|n| !n.trim().is_empty()))
                .or(d.address.as_deref())
                .unwrap_or_default(),
        }
    }
}

/// A concrete restaurant or hotel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VenueDetail {
    #[serde(
        alias = "restaurant_name",
        alias = "hotel_name",
        deserialize_with = "lenient::text"
    )]
    pub name: String,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub address: Option<String>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub poi_name: Option<String>,
    #[serde(
        alias = "avg_cost",
        alias = "price_per_night",
        deserialize_with = "lenient::opt_amount"
    )]
    pub cost: Option<f64>,
}

/// Getting there and getting around.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transportation {
    #[serde(deserialize_with = "lenient::text")]
    pub to_destination: String,
    #[serde(deserialize_with = "lenient::text")]
    pub local: String,
    #[serde(deserialize_with = "lenient::amount")]
    pub estimated_cost: f64,
}

/// Lodging overview for the whole trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccommodationSummary {
    #[serde(rename = "type", deserialize_with = "lenient::text")]
    pub kind: String,
    #[serde(deserialize_with = "lenient::venue_list")]
    pub suggestions: Vec<Venue>,
    #[serde(deserialize_with = "lenient::amount")]
    pub estimated_cost_per_night: f64,
    #[serde(deserialize_with = "lenient::count")]
    pub total_nights: u32,
    #[serde(deserialize_with = "lenient::amount")]
    pub total_cost: f64,
}

/// Budget split by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetBreakdown {
    #[serde(deserialize_with = "lenient::amount")]
    pub transportation: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub accommodation: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub meals: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub attractions: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub shopping: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub emergency: f64,
    #[serde(deserialize_with = "lenient::amount")]
    pub total: f64,
}

impl BudgetBreakdown {
    /// Sum of the category lines, excluding `total`.
    pub fn line_items_sum(&self) -> f64 {
        self.transportation
            + self.accommodation
            + self.meals
            + self.attractions
            + self.shopping
            + self.emergency
    }
}

/// A regenerated itinerary returned for a modification request.
///
/// The backend is asked to keep sections the user did not mention; this is
/// not verified; the document is accepted wholesale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ItineraryPatch {
    pub document: ItineraryDocument,
}

impl ItineraryPatch {
    /// Day numbers whose records are identical in `prior` and in this patch.
    /// Diagnostic only.
    pub fn untouched_days(&self, prior: &ItineraryDocument) -> Vec<u32> {
        self.document
            .daily_itinerary
            .iter()
            .filter(|day| prior.daily_itinerary.iter().any(|p| p == *day))
            .map(|day| day.day)
            .collect()
    }

    pub fn into_document(self) -> ItineraryDocument {
        self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interpret(value: Value) -> Result<ItineraryDocument, RecoveryError> {
        ItineraryDocument::from_object(value.as_object().unwrap(), TargetShape::Itinerary)
    }

    fn minimal() -> Value {
        json!({
            "overview": "A 3-day trip",
            "daily_itinerary": [{ "day": 1, "activities": [] }],
            "transportation": { "to_destination": "Train", "local": "Metro" },
            "accommodation_summary": { "type": "Hotel" },
            "budget_breakdown": { "total": 1000 },
            "tips": []
        })
    }

    fn assert_missing(value: Value, expected: &str) {
        let err = interpret(value).unwrap_err();
        assert!(
            matches!(
                &err,
                RecoveryError::InterpretationFailed { field, fault: InterpretFault::Missing, .. }
                    if field == expected
            ),
            "expected {expected} missing, got: {err}"
        );
    }

    #[test]
    fn minimal_document_interprets() {
        let doc = interpret(minimal()).unwrap();
        assert_eq!(doc.overview, "A 3-day trip");
        assert_eq!(doc.budget_breakdown.total, 1000.0);
        assert_eq!(doc.transportation.local, "Metro");
        assert_eq!(doc.accommodation_summary.kind, "Hotel");
        assert!(doc.tips.is_empty());
    }

    #[test]
    fn missing_transportation_is_named() {
        let mut value = minimal();
        value.as_object_mut().unwrap().remove("transportation");
        assert_missing(value, "transportation");
    }

    #[test]
    fn missing_accommodation_summary_is_named() {
        let mut value = minimal();
        value.as_object_mut().unwrap().remove("accommodation_summary");
        assert_missing(value, "accommodation_summary");
    }

    #[test]
    fn null_tips_count_as_missing() {
        let mut value = minimal();
        value["tips"] = Value::Null;
        assert_missing(value, "tips");
    }

    #[test]
    fn missing_overview_is_named() {
        let mut value = minimal();
        value.as_object_mut().unwrap().remove("overview");
        assert_missing(value, "overview");
    }

    #[test]
    fn null_budget_counts_as_missing() {
        let mut value = minimal();
        value["budget_breakdown"] = Value::Null;
        let err = interpret(value).unwrap_err();
        assert!(
            matches!(&err, RecoveryError::InterpretationFailed { field, .. } if field == "budget_breakdown"),
            "got: {err}"
        );
    }

    #[test]
    fn empty_day_list_is_rejected() {
        let mut value = minimal();
        value["daily_itinerary"] = json!([]);
        let err = interpret(value).unwrap_err();
        assert!(
            matches!(
                &err,
                RecoveryError::InterpretationFailed { fault: InterpretFault::Invalid(_), .. }
            ),
            "got: {err}"
        );
    }

    #[test]
    fn wrong_type_is_invalid_not_missing() {
        let mut value = minimal();
        value["daily_itinerary"] = json!("day one: museum");
        let err = interpret(value).unwrap_err();
        assert!(
            matches!(
                &err,
                RecoveryError::InterpretationFailed { field, fault: InterpretFault::Invalid(_), .. }
                    if field == "daily_itinerary"
            ),
            "got: {err}"
        );
    }

    #[test]
    fn activity_without_poi_name_falls_back_to_location() {
        let mut value = minimal();
        value["daily_itinerary"][0]["activities"] = json!([
            { "activity": "Stroll", "location": "Old Town", "estimated_cost": "free" },
            { "activity": "Museum", "location": "Center", "poi_name": "City Museum" },
            { "activity": "Rest" }
        ]);
        let doc = interpret(value).unwrap();
        let acts: Vec<&Activity> = doc.activities().collect();
        assert_eq!(acts[0].poi_name, None);
        assert_eq!(acts[0].map_query(), "Old Town");
        assert_eq!(acts[0].estimated_cost, 0.0);
        assert_eq!(acts[1].map_query(), "City Museum");
        assert_eq!(acts[2].map_query(), "Rest");
    }

    #[test]
    fn meals_accept_both_shapes() {
        let mut value = minimal();
        value["daily_itinerary"][0]["meals"] = json!({
            "breakfast": "Hotel buffet",
            "lunch": { "restaurant_name": "Noodle House", "address": "1 Main St", "avg_cost": 40 },
            "dinner": { "name": "Duck Place", "poi_name": "Duck Place Flagship" }
        });
        value["daily_itinerary"][0]["accommodation"] =
            json!({ "hotel_name": "Lakeside Inn", "price_per_night": "about 300" });
        let doc = interpret(value).unwrap();
        let day = &doc.daily_itinerary[0];
        let meals = day.meals.as_ref().unwrap();

        assert_eq!(meals.breakfast, Some(Venue::Suggestion("Hotel buffet".to_string())));
        let Some(Venue::Detailed(lunch)) = &meals.lunch else {
            panic!("lunch should be detailed: {:?}", meals.lunch);
        };
        assert_eq!(lunch.name, "Noodle House");
        assert_eq!(lunch.cost, Some(40.0));
        assert_eq!(meals.dinner.as_ref().unwrap().map_query(), "Duck Place Flagship");

        let Some(Venue::Detailed(hotel)) = &day.accommodation else {
            panic!("accommodation should be detailed");
        };
        assert_eq!(hotel.name, "Lakeside Inn");
        assert_eq!(hotel.cost, Some(300.0));
    }

    #[test]
    fn blank_or_odd_venues_are_dropped() {
        assert_eq!(Venue::from_value(json!("  ")), None);
        assert_eq!(Venue::from_value(json!(42)), None);
        assert_eq!(Venue::from_value(Value::Null), None);
    }

    #[test]
    fn venue_serializes_in_original_shape() {
        let plain = serde_json::to_value(Venue::Suggestion("Inn".to_string())).unwrap();
        assert_eq!(plain, json!("Inn"));
        let detailed = serde_json::to_value(Venue::Detailed(VenueDetail {
            name: "Inn".to_string(),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(detailed["name"], "Inn");
    }

    #[test]
    fn accommodation_summary_reads_type_and_suggestions() {
        let mut value = minimal();
        value["accommodation_summary"] = json!({
            "type": "Boutique hotel",
            "suggestions": ["Inn A", { "hotel_name": "Inn B", "address": "2 Lake Rd" }],
            "estimated_cost_per_night": 200,
            "total_nights": 2,
            "total_cost": 400
        });
        let doc = interpret(value).unwrap();
        let summary = &doc.accommodation_summary;
        assert_eq!(summary.kind, "Boutique hotel");
        assert_eq!(summary.suggestions.len(), 2);
        assert_eq!(summary.suggestions[1].name(), "Inn B");
        assert_eq!(summary.total_nights, 2);
    }

    #[test]
    fn budget_line_items_sum_excludes_total() {
        let budget = BudgetBreakdown {
            transportation: 500.0,
            accommodation: 600.0,
            meals: 400.0,
            total: 9999.0,
            ..Default::default()
        };
        assert_eq!(budget.line_items_sum(), 1500.0);
    }

    #[test]
    fn untouched_days_reports_identical_records() {
        let mut prior = minimal();
        prior["daily_itinerary"] = json!([
            { "day": 1, "title": "Arrive" },
            { "day": 2, "title": "Museums" }
        ]);
        let prior = interpret(prior).unwrap();
        let mut patched = minimal();
        patched["overview"] = json!("new");
        patched["daily_itinerary"] = json!([
            { "day": 1, "title": "Arrive" },
            { "day": 2, "title": "Beach instead" }
        ]);
        let patched = interpret(patched).unwrap();
        let patch = ItineraryPatch { document: patched };
        assert_eq!(patch.untouched_days(&prior), vec![1]);
    }
}
