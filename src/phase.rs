use crate::types::Phase;
use chrono::NaiveDate;

/// Classifies an exhibition relative to `today`. Boundaries are inclusive on
/// both ends; `None` means there is nothing to go on.
pub fn classify(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    ongoing: bool,
    today: NaiveDate,
) -> Option<Phase> {
    if ongoing {
        return Some(Phase::Current);
    }
    match (start, end) {
        (Some(start), Some(end)) => {
            if today < start {
                Some(Phase::Future)
            } else if today > end {
                Some(Phase::Past)
            } else {
                Some(Phase::Current)
            }
        }
        // the venue lists it, so an end-only listing is on view until it closes
        (None, Some(end)) => {
            if today <= end {
                Some(Phase::Current)
            } else {
                Some(Phase::Past)
            }
        }
        (Some(start), None) => {
            if today < start {
                Some(Phase::Future)
            } else {
                Some(Phase::Current)
            }
        }
        (None, None) => None,
    }
}
