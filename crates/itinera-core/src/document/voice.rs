//! Voice-query intents.
//!
//! A transcribed utterance is classified by the model into one of three
//! intents via the `query_type` discriminator. `query` is also the fallback
//! for anything that could not be classified or parsed.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::{lenient, required_field};
use crate::recovery::{InterpretFault, RecoveryError, TargetShape};

/// The intent extracted from a voice query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "query_type", rename_all = "snake_case")]
pub enum VoiceIntent {
    TravelPlan(TravelPlanIntent),
    Expense(ExpenseIntent),
    Query {
        raw_text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl VoiceIntent {
    /// The fallback intent: keep the text, note why nothing better came out.
    pub fn fallback(raw_text: impl Into<String>, error: Option<String>) -> Self {
        Self::Query {
            raw_text: raw_text.into(),
            error,
        }
    }

    /// Classify a parsed object by its `query_type`.
    ///
    /// `raw_text` is carried into a `query` result. A missing or unknown
    /// discriminator, or a travel/expense record lacking its key field, is
    /// an interpretation failure; callers turn that into the fallback.
    pub fn from_object(obj: &Map<String, Value>, raw_text: &str) -> Result<Self, RecoveryError> {
        let shape = TargetShape::VoiceIntent;
        let query_type = match obj.get("query_type") {
            None | Some(Value::Null) => {
                return Err(RecoveryError::InterpretationFailed {
                    shape,
                    field: "query_type".to_string(),
                    fault: InterpretFault::Missing,
                });
            }
            Some(Value::String(s)) => s.trim().to_ascii_lowercase(),
            Some(other) => {
                return Err(RecoveryError::InterpretationFailed {
                    shape,
                    field: "query_type".to_string(),
                    fault: InterpretFault::Invalid(format!("expected a string, found {other}")),
                });
            }
        };

        match query_type.as_str() {
            "travel_plan" => {
                let _: String = required_field(obj, shape, "destination")?;
                let intent: TravelPlanIntent = deserialize_object(obj, shape)?;
                Ok(Self::TravelPlan(intent.with_derived_dates()))
            }
            "expense" => {
                let _: Value = required_field(obj, shape, "amount")?;
                Ok(Self::Expense(deserialize_object(obj, shape)?))
            }
            "query" => Ok(Self::fallback(raw_text, None)),
            other => Err(RecoveryError::InterpretationFailed {
                shape,
                field: "query_type".to_string(),
                fault: InterpretFault::Invalid(format!("unknown query type {other:?}")),
            }),
        }
    }

    /// The `query_type` discriminator of this intent.
    pub fn query_type(&self) -> &'static str {
        match self {
            Self::TravelPlan(_) => "travel_plan",
            Self::Expense(_) => "expense",
            Self::Query { .. } => "query",
        }
    }
}

fn deserialize_object<T: serde::de::DeserializeOwned>(
    obj: &Map<String, Value>,
    shape: TargetShape,
) -> Result<T, RecoveryError> {
    let value = Value::Object(obj.clone());
    <T as Deserialize>::deserialize(&value).map_err(|e| RecoveryError::InterpretationFailed {
        shape,
        field: "$".to_string(),
        fault: InterpretFault::Invalid(e.to_string()),
    })
}

/// A request to plan a trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelPlanIntent {
    #[serde(deserialize_with = "lenient::text")]
    pub destination: String,
    #[serde(deserialize_with = "lenient::opt_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::opt_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::opt_count")]
    pub days: Option<u32>,
    #[serde(deserialize_with = "lenient::opt_amount")]
    pub budget: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_count")]
    pub travelers_count: Option<u32>,
    #[serde(deserialize_with = "lenient::opt_text")]
    pub preferences: Option<String>,
}

impl TravelPlanIntent {
    /// Fill in whichever of `days` / `end_date` can be derived from the
    /// others. Both dates present: `days` is the inclusive span. Start and
    /// day count present: `end_date` follows. Reversed dates derive nothing.
    pub fn with_derived_dates(mut self) -> Self {
        match (self.start_date, self.end_date, self.days) {
            (Some(start), Some(end), None) if end >= start => {
                let span = (end - start).num_days() + 1;
                self.days = u32::try_from(span).ok();
            }
            (Some(start), None, Some(days)) if days > 0 => {
                self.end_date = start.checked_add_days(chrono::Days::new(u64::from(days - 1)));
            }
            _ => {}
        }
        self
    }
}

/// A spending record dictated by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpenseIntent {
    pub category: ExpenseCategory,
    #[serde(deserialize_with = "lenient::amount")]
    pub amount: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
}

/// Fixed expense categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Transport,
    Lodging,
    Food,
    Attractions,
    Shopping,
    #[default]
    Other,
}

impl ExpenseCategory {
    /// Map an English or Chinese label to a category. Unknown labels are
    /// [`ExpenseCategory::Other`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "transport" | "transportation" | "traffic" | "交通" => Self::Transport,
            "lodging" | "accommodation" | "hotel" | "住宿" => Self::Lodging,
            "food" | "meals" | "dining" | "餐饮" => Self::Food,
            "attractions" | "attraction" | "tickets" | "景点" | "门票" => Self::Attractions,
            "shopping" | "购物" => Self::Shopping,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transport => "transport",
            Self::Lodging => "lodging",
            Self::Food => "food",
            Self::Attractions => "attractions",
            Self::Shopping => "shopping",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

impl<'de> Deserialize<'de> for ExpenseCategory {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let label = lenient::text(d)?;
        Ok(Self::from_label(&label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(value: Value) -> Result<VoiceIntent, RecoveryError> {
        VoiceIntent::from_object(value.as_object().unwrap(), "original words")
    }

    #[test]
    fn travel_plan_derives_day_count() {
        let intent = classify(json!({
            "query_type": "travel_plan",
            "destination": "Chongqing",
            "start_date": "2025-10-27",
            "end_date": "2025-10-31",
            "budget": 3000,
            "travelers_count": 2,
            "preferences": null
        }))
        .unwrap();
        let VoiceIntent::TravelPlan(plan) = intent else {
            panic!("expected travel plan");
        };
        assert_eq!(plan.destination, "Chongqing");
        assert_eq!(plan.days, Some(5));
        assert_eq!(plan.budget, Some(3000.0));
        assert_eq!(plan.travelers_count, Some(2));
        assert_eq!(plan.preferences, None);
    }

    #[test]
    fn travel_plan_derives_end_date_from_days() {
        let plan = TravelPlanIntent {
            start_date: NaiveDate::from_ymd_opt(2025, 10, 27),
            days: Some(3),
            ..Default::default()
        }
        .with_derived_dates();
        assert_eq!(plan.end_date, NaiveDate::from_ymd_opt(2025, 10, 29));
    }

    #[test]
    fn reversed_dates_derive_nothing() {
        let plan = TravelPlanIntent {
            start_date: NaiveDate::from_ymd_opt(2025, 10, 31),
            end_date: NaiveDate::from_ymd_opt(2025, 10, 27),
            ..Default::default()
        }
        .with_derived_dates();
        assert_eq!(plan.days, None);
    }

    #[test]
    fn explicit_days_are_not_overwritten() {
        let plan = TravelPlanIntent {
            start_date: NaiveDate::from_ymd_opt(2025, 10, 27),
            end_date: NaiveDate::from_ymd_opt(2025, 10, 31),
            days: Some(4),
            ..Default::default()
        }
        .with_derived_dates();
        assert_eq!(plan.days, Some(4));
    }

    #[test]
    fn travel_plan_without_destination_fails() {
        let err = classify(json!({ "query_type": "travel_plan", "days": 3 })).unwrap_err();
        assert!(
            matches!(&err, RecoveryError::InterpretationFailed { field, .. } if field == "destination"),
            "got: {err}"
        );
    }

    #[test]
    fn expense_maps_chinese_category() {
        let intent = classify(json!({
            "query_type": "expense",
            "category": "住宿",
            "amount": 300,
            "description": "hotel night"
        }))
        .unwrap();
        assert_eq!(
            intent,
            VoiceIntent::Expense(ExpenseIntent {
                category: ExpenseCategory::Lodging,
                amount: 300.0,
                description: "hotel night".to_string(),
            })
        );
    }

    #[test]
    fn unknown_category_is_other() {
        assert_eq!(ExpenseCategory::from_label("souvenir tax"), ExpenseCategory::Other);
        assert_eq!(ExpenseCategory::from_label(" Food "), ExpenseCategory::Food);
    }

    #[test]
    fn expense_without_amount_fails() {
        let err = classify(json!({ "query_type": "expense", "category": "food" })).unwrap_err();
        assert!(
            matches!(&err, RecoveryError::InterpretationFailed { field, .. } if field == "amount"),
            "got: {err}"
        );
    }

    #[test]
    fn query_type_query_keeps_raw_text() {
        let intent = classify(json!({ "query_type": "query" })).unwrap();
        assert_eq!(intent, VoiceIntent::fallback("original words", None));
    }

    #[test]
    fn missing_query_type_fails() {
        let err = classify(json!({ "destination": "Paris" })).unwrap_err();
        assert!(
            matches!(
                &err,
                RecoveryError::InterpretationFailed { fault: InterpretFault::Missing, .. }
            ),
            "got: {err}"
        );
    }

    #[test]
    fn unknown_query_type_fails() {
        assert!(classify(json!({ "query_type": "weather" })).is_err());
    }

    #[test]
    fn serializes_with_discriminator() {
        let value = serde_json::to_value(VoiceIntent::fallback("hi", Some("boom".into()))).unwrap();
        assert_eq!(
            value,
            json!({ "query_type": "query", "raw_text": "hi", "error": "boom" })
        );

        let value = serde_json::to_value(VoiceIntent::Expense(ExpenseIntent {
            category: ExpenseCategory::Food,
            amount: 12.0,
            description: "noodles".into(),
        }))
        .unwrap();
        assert_eq!(value["query_type"], "expense");
        assert_eq!(value["category"], "food");
    }
}
