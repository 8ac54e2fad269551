//! Generative-output recovery: raw model text in, typed document out.
//!
//! The pipeline is linear with no retries:
//! `Raw → Extracted → Repaired → Parsed → Interpreted`.
//! Each stage either advances or fails with a [`RecoveryError`]. The whole
//! thing is a pure function of the input text and the target shape; the
//! only side effect is diagnostic logging.

pub mod extract;
pub mod repair;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::document::{self, InterpretedDocument, ItineraryDocument, ItineraryPatch, VoiceIntent};

pub use extract::extract_block;
pub use repair::repair;

/// Longest excerpt of repaired text kept on a parse failure, in chars.
pub const EXCERPT_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which typed document the caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetShape {
    Itinerary,
    ItineraryPatch,
    VoiceIntent,
}

impl fmt::Display for TargetShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Itinerary => "itinerary",
            Self::ItineraryPatch => "itinerary_patch",
            Self::VoiceIntent => "voice_intent",
        };
        f.write_str(s)
    }
}

impl FromStr for TargetShape {
    type Err = TargetShapeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "itinerary" => Ok(Self::Itinerary),
            "itinerary_patch" => Ok(Self::ItineraryPatch),
            "voice_intent" => Ok(Self::VoiceIntent),
            other => Err(TargetShapeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TargetShape`] string.
#[derive(Debug, Clone, Error)]
#[error("invalid target shape: {0:?} (expected itinerary, itinerary_patch, or voice_intent)")]
pub struct TargetShapeParseError(pub String);

/// Why a field could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpretFault {
    /// Absent or `null`.
    Missing,
    /// Present but unusable.
    Invalid(String),
}

impl fmt::Display for InterpretFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing"),
            Self::Invalid(reason) => write!(f, "invalid: {reason}"),
        }
    }
}

/// Failure taxonomy of the recovery pipeline.
#[derive(Debug, Clone, Error)]
pub enum RecoveryError {
    #[error("no JSON object found in model output")]
    NoJsonFound,

    #[error("JSON still invalid after repair: {reason}")]
    RepairFailed {
        reason: String,
        /// Leading part of the repaired text, at most [`EXCERPT_CHARS`] chars.
        excerpt: String,
    },

    #[error("{shape} field {field:?} {fault}")]
    InterpretationFailed {
        shape: TargetShape,
        field: String,
        fault: InterpretFault,
    },
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the full pipeline on `raw` for the given shape.
///
/// The voice shape always succeeds with at least the `query` fallback, as
/// [`recover_voice_intent`] does.
pub fn recover(raw: &str, shape: TargetShape) -> Result<InterpretedDocument, RecoveryError> {
    if shape == TargetShape::VoiceIntent {
        return Ok(InterpretedDocument::VoiceIntent(recover_voice_intent(raw)));
    }
    let parsed = parse_stage(raw, shape)?;
    let doc = document::interpret(&parsed, shape, raw)
        .inspect_err(|e| log_interpretation(shape, e))?;
    tracing::debug!(%shape, "recovered document");
    Ok(doc)
}

/// Recover a fresh itinerary.
pub fn recover_itinerary(raw: &str) -> Result<ItineraryDocument, RecoveryError> {
    let shape = TargetShape::Itinerary;
    let parsed = parse_stage(raw, shape)?;
    document::as_object(&parsed, shape)
        .and_then(|obj| ItineraryDocument::from_object(obj, shape))
        .inspect_err(|e| log_interpretation(shape, e))
}

/// Recover a regenerated itinerary for a modification request.
pub fn recover_itinerary_patch(raw: &str) -> Result<ItineraryPatch, RecoveryError> {
    let shape = TargetShape::ItineraryPatch;
    let parsed = parse_stage(raw, shape)?;
    document::as_object(&parsed, shape)
        .and_then(|obj| ItineraryDocument::from_object(obj, shape))
        .map(|document| ItineraryPatch { document })
        .inspect_err(|e| log_interpretation(shape, e))
}

/// Recover a voice intent. Never fails: any error becomes a `query` intent
/// carrying `raw` and the error text.
pub fn recover_voice_intent(raw: &str) -> VoiceIntent {
    let shape = TargetShape::VoiceIntent;
    let result = parse_stage(raw, shape).and_then(|parsed| {
        document::as_object(&parsed, shape).and_then(|obj| VoiceIntent::from_object(obj, raw))
    });
    match result {
        Ok(intent) => intent,
        Err(e) => {
            tracing::info!(error = %e, "voice intent falls back to query");
            VoiceIntent::fallback(raw, Some(e.to_string()))
        }
    }
}

/// Extract, repair, and parse.
fn parse_stage(raw: &str, shape: TargetShape) -> Result<serde_json::Value, RecoveryError> {
    let block = extract_block(raw).inspect_err(|_| {
        tracing::warn!(%shape, raw_len = raw.len(), "no JSON block in model output");
    })?;

    let repaired = repair(block);
    if repaired != block {
        tracing::debug!(
            %shape,
            before = block.len(),
            after = repaired.len(),
            "repaired JSON block"
        );
    }

    serde_json::from_str(&repaired).map_err(|e| {
        let excerpt = excerpt(&repaired);
        tracing::warn!(%shape, error = %e, excerpt = %excerpt, "repaired JSON does not parse");
        RecoveryError::RepairFailed {
            reason: e.to_string(),
            excerpt,
        }
    })
}

fn log_interpretation(shape: TargetShape, e: &RecoveryError) {
    tracing::warn!(%shape, error = %e, "interpretation failed");
}

/// First [`EXCERPT_CHARS`] chars of `text`.
fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
