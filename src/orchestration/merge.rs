//! Merging gateway data into a stored raffle.
//!
//! Authoritative fields always overwrite heuristic placeholders wholesale;
//! absent fields leave the stored value untouched. Winner identity is
//! monotonic: it can be overwritten by a different authoritative value but
//! never cleared.

use crate::client::RaffleData;
use crate::models::Raffle;
use tracing::debug;

fn overwrite<T: Clone + PartialEq>(target: &mut Option<T>, source: &Option<T>, changed: &mut bool) {
    if source.is_some() && *target != *source {
        *target = source.clone();
        *changed = true;
    }
}

/// Apply an authoritative gateway payload. Returns whether anything
/// changed.
pub fn merge_authoritative(raffle: &mut Raffle, data: &RaffleData, now: i64) -> bool {
    let mut changed = false;

    let details = &mut raffle.raffle;
    overwrite(&mut details.end_time, &data.end_time, &mut changed);
    overwrite(&mut details.sticker_id, &data.sticker_id, &mut changed);
    overwrite(&mut details.sticker_name, &data.sticker_name, &mut changed);
    overwrite(&mut details.sticker_stars, &data.sticker_stars, &mut changed);
    overwrite(&mut details.participant_ids, &data.participant_ids, &mut changed);
    overwrite(
        &mut details.participant_count,
        &data.participant_count,
        &mut changed,
    );
    overwrite(
        &mut details.unrevealed_for_current_user,
        &data.unrevealed_for_current_user,
        &mut changed,
    );
    overwrite(&mut raffle.permalink, &data.permalink, &mut changed);

    // Winner identity: only non-empty values land, and landing one stamps
    // the fetch time. An authoritative winner overrides a heuristic one
    // (recognizable by its missing fetch time) but nothing ever clears it.
    let incoming_id = data.winner_id.clone().filter(|v| !v.is_empty());
    let incoming_name = data.winner_name.clone().filter(|v| !v.is_empty());
    if incoming_id.is_some() || incoming_name.is_some() {
        let mut winner_changed = false;
        overwrite(&mut raffle.winner.winner_id, &incoming_id, &mut winner_changed);
        overwrite(
            &mut raffle.winner.winner_name,
            &incoming_name,
            &mut winner_changed,
        );
        if winner_changed || raffle.winner.winner_fetched_at.is_none() {
            raffle.winner.winner_fetched_at = Some(now);
            changed = true;
        }
        changed |= winner_changed;
    }

    if changed {
        debug!(post_id = %raffle.post_id, "authoritative data merged");
    }
    changed
}

/// Heuristic winner inference, separate from the authoritative merge: the
/// raffle ended, the gateway reported no winner, and the participant list
/// is exactly the current user. The inferred record deliberately leaves
/// `winner_fetched_at` unset so authoritative data remains distinguishable
/// and can override it.
pub fn apply_solo_winner_fallback(raffle: &mut Raffle, current_user_id: &str, now: i64) -> bool {
    if current_user_id.is_empty()
        || !raffle.has_ended(now)
        || raffle.winner.is_recorded()
    {
        return false;
    }
    let solo = raffle
        .raffle
        .participant_ids
        .as_deref()
        .is_some_and(|ids| ids.len() == 1 && ids[0] == current_user_id);
    if !solo {
        return false;
    }
    raffle.winner.winner_id = Some(current_user_id.to_string());
    raffle.winner.winner_fetched_at = None;
    debug!(post_id = %raffle.post_id, "winner inferred from solo participation");
    true
}
