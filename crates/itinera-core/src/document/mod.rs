//! Typed documents recovered from model output, and the interpreter that
//! projects a parsed JSON object onto them.

pub mod itinerary;
pub mod lenient;
pub mod voice;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::recovery::{InterpretFault, RecoveryError, TargetShape};

pub use itinerary::{
    AccommodationSummary, Activity, BudgetBreakdown, DayPlan, ItineraryDocument, ItineraryPatch,
    Meals, Transportation, Venue, VenueDetail,
};
pub use voice::{ExpenseCategory, ExpenseIntent, TravelPlanIntent, VoiceIntent};

/// The result of a successful recovery, tagged by shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InterpretedDocument {
    Itinerary(ItineraryDocument),
    ItineraryPatch(ItineraryPatch),
    VoiceIntent(VoiceIntent),
}

impl InterpretedDocument {
    pub fn shape(&self) -> TargetShape {
        match self {
            Self::Itinerary(_) => TargetShape::Itinerary,
            Self::ItineraryPatch(_) => TargetShape::ItineraryPatch,
            Self::VoiceIntent(_) => TargetShape::VoiceIntent,
        }
    }
}

/// Project `parsed` onto `shape`.
///
/// `raw_text` is only used by the voice shape, whose `query` intent echoes
/// the text it was given.
pub fn interpret(
    parsed: &Value,
    shape: TargetShape,
    raw_text: &str,
) -> Result<InterpretedDocument, RecoveryError> {
    let obj = as_object(parsed, shape)?;
    match shape {
        TargetShape::Itinerary => {
            ItineraryDocument::from_object(obj, shape).map(InterpretedDocument::Itinerary)
        }
        TargetShape::ItineraryPatch => ItineraryDocument::from_object(obj, shape)
            .map(|document| InterpretedDocument::ItineraryPatch(ItineraryPatch { document })),
        TargetShape::VoiceIntent => {
            VoiceIntent::from_object(obj, raw_text).map(InterpretedDocument::VoiceIntent)
        }
    }
}

/// The top-level object of a parsed document.
pub(crate) fn as_object(
    parsed: &Value,
    shape: TargetShape,
) -> Result<&Map<String, Value>, RecoveryError> {
    parsed.as_object().ok_or_else(|| RecoveryError::InterpretationFailed {
        shape,
        field: "$".to_string(),
        fault: InterpretFault::Invalid("expected a JSON object".to_string()),
    })
}

/// Read a field that must be present and non-null.
pub(crate) fn required_field<T: DeserializeOwned>(
    obj: &Map<String, Value>,
    shape: TargetShape,
    key: &str,
) -> Result<T, RecoveryError> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(RecoveryError::InterpretationFailed {
            shape,
            field: key.to_string(),
            fault: InterpretFault::Missing,
        }),
        Some(value) => decode_field(value, shape, key),
    }
}

fn decode_field<T: DeserializeOwned>(
    value: &Value,
    shape: TargetShape,
    key: &str,
) -> Result<T, RecoveryError> {
    <T as Deserialize>::deserialize(value).map_err(|e| RecoveryError::InterpretationFailed {
        shape,
        field: key.to_string(),
        fault: InterpretFault::Invalid(e.to_string()),
    })
}
