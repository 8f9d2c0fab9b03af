//! Decides whether a fetched trade is one we have not alerted on yet.

use crate::events::TradeEvent;

/// True if nothing has been seen yet or `candidate` differs from `last`.
///
/// Comparison is structural over the whole record. Ordering is not
/// inferred: the feed's newest element is trusted as-is.
pub fn is_new(candidate: &TradeEvent, last: Option<&TradeEvent>) -> bool {
    match last {
        None => true,
        Some(last) => candidate != last,
    }
}
