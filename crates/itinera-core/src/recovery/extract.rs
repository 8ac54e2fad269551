//! Block extraction: locate the JSON object inside model prose.
//!
//! The scan is deliberately naive: the block runs from the first `{` to the
//! last `}` in the text. Prose that itself contains braces will widen the
//! block and usually surface later as a parse failure. Balanced-brace
//! matching would accept different inputs, so it is not used here.

use super::RecoveryError;

/// Return the candidate block: first `{` through last `}`, inclusive.
///
/// Fails with [`RecoveryError::NoJsonFound`] when either brace is missing,
/// or when the last `}` comes before the first `{`.
pub fn extract_block(raw: &str) -> Result<&str, RecoveryError> {
    let start = raw.find('{').ok_or(RecoveryError::NoJsonFound)?;
    let end = raw.rfind('}').ok_or(RecoveryError::NoJsonFound)?;
    if end < start {
        return Err(RecoveryError::NoJsonFound);
    }
    // Both braces are single-byte, so `end + 1` is a char boundary.
    Ok(&raw[start..=end])
}
