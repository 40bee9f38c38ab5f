use ulid::Ulid;

use crate::model::*;
use crate::validate::{validate, ScheduleParams};

use super::EngineError;

/// Decide whether `candidate` may join `existing`.
///
/// Only schedules on the candidate's slot key count, minus `exclude` (the
/// record being updated). Intervals are closed, so a booking ending at 11:00
/// collides with one starting at 11:00.
///
/// 1. Reject when an existing booking starts inside `[start, end]`.
/// 2. Reject when an existing booking ends inside `[start, end]`.
/// 3. Of the bookings starting in `[OPEN_TIME, start]`, take the latest
///    (last one wins on ties). Reject when it ends after `end`: the candidate
///    sits inside it.
pub fn check_conflict<'a>(
    candidate: &ScheduleDraft,
    existing: impl IntoIterator<Item = &'a Schedule>,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    let key = candidate.slot_key();
    let others: Vec<&Schedule> = existing
        .into_iter()
        .filter(|s| s.slot_key() == key && Some(s.id) != exclude)
        .collect();
    if others.is_empty() {
        return Ok(());
    }

    let window = candidate.span;
    if others.iter().any(|s| window.contains_instant(s.span.start)) {
        return Err(EngineError::Overlap);
    }
    if others.iter().any(|s| window.contains_instant(s.span.end)) {
        return Err(EngineError::Overlap);
    }

    let preceding = others
        .iter()
        .filter(|s| OPEN_TIME <= s.span.start && s.span.start <= window.start)
        .max_by_key(|s| s.span.start);
    if let Some(s) = preceding
        && s.span.end > window.end
    {
        return Err(EngineError::Overlap);
    }
    Ok(())
}

/// Validator followed by the conflict checker, first failure wins.
pub fn validate_and_check<'a>(
    params: &ScheduleParams,
    existing: impl IntoIterator<Item = &'a Schedule>,
    exclude: Option<Ulid>,
) -> Result<ScheduleDraft, EngineError> {
    let draft = validate(params)?;
    check_conflict(&draft, existing, exclude)?;
    Ok(draft)
}
