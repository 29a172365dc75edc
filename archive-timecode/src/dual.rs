//! Reconciliation of two independent timecode streams.
//!
//! Archive captures usually carry both VITC and LTC. Either may be absent on
//! a frame, frozen through a dropout or broken independently of the other.
//! [`find_position_at_dual_timecode`] finds the single content package
//! position where both observations hold.

use crate::index::TimecodeIndexSearcher;
use crate::smpte::Timecode;

/// Find the position where `vitc` and `ltc` were both observed.
///
/// Either timecode may be [`Timecode::invalid`]; the valid one then decides
/// the position and the other searcher is moved along with it. On success
/// both searchers are left at the returned position. On failure neither
/// searcher moves.
pub fn find_position_at_dual_timecode(
    vitc_searcher: &mut TimecodeIndexSearcher<'_>,
    vitc: &Timecode,
    ltc_searcher: &mut TimecodeIndexSearcher<'_>,
    ltc: &Timecode,
) -> Option<i64> {
    let vitc_snapshot = *vitc_searcher;
    let ltc_snapshot = *ltc_searcher;

    let result = reconcile(vitc_searcher, vitc, ltc_searcher, ltc);
    match result {
        Some(position) => {
            vitc_searcher.mark_matched();
            ltc_searcher.mark_matched();
            Some(position)
        }
        None => {
            *vitc_searcher = vitc_snapshot;
            *ltc_searcher = ltc_snapshot;
            None
        }
    }
}

fn reconcile(
    vitc_searcher: &mut TimecodeIndexSearcher<'_>,
    vitc: &Timecode,
    ltc_searcher: &mut TimecodeIndexSearcher<'_>,
    ltc: &Timecode,
) -> Option<i64> {
    match (vitc.is_valid(), ltc.is_valid()) {
        (false, false) => None,
        (true, false) => follow(vitc_searcher, vitc, ltc_searcher),
        (false, true) => follow(ltc_searcher, ltc, vitc_searcher),
        (true, true) => {
            let mut vitc_pos = vitc_searcher.find_position(vitc)?;
            let mut ltc_pos = ltc_searcher.find_position(ltc)?;

            while vitc_pos != ltc_pos {
                if vitc_pos < ltc_pos {
                    vitc_pos = catch_up(vitc_searcher, vitc, ltc_pos)?;
                } else {
                    ltc_pos = catch_up(ltc_searcher, ltc, vitc_pos)?;
                }
            }
            Some(vitc_pos)
        }
    }
}

/// Resolve `timecode` with `leader` and drag `follower` to the same position.
fn follow(
    leader: &mut TimecodeIndexSearcher<'_>,
    timecode: &Timecode,
    follower: &mut TimecodeIndexSearcher<'_>,
) -> Option<i64> {
    let position = leader.find_position(timecode)?;
    follower.move_to(position).then_some(position)
}

/// Advance the lagging searcher toward `target`, returning its new position.
///
/// The result is strictly greater than the searcher's current position, so
/// the reconciliation loop always terminates.
fn catch_up(
    searcher: &mut TimecodeIndexSearcher<'_>,
    timecode: &Timecode,
    target: i64,
) -> Option<i64> {
    let start = searcher.position();

    // a frozen run spanning the target already holds the timecode there
    if let Some(element) = searcher.current_element() {
        let element_end = searcher.current_element_start() + element.duration;
        if element.frozen && target < element_end {
            return searcher.move_to(target).then_some(target);
        }
    }

    let position = searcher.find_position(timecode)?;
    if position > start {
        return Some(position);
    }

    if !searcher.move_to_next_element() {
        return None;
    }
    let position = searcher.find_position(timecode)?;
    (position > start).then_some(position)
}
