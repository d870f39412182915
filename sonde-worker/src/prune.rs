//! Context pruning: keep the system prompt and a recent-observation
//! window, drop the oldest middle messages.

use sonde_types::{estimate_messages, Message, Role};

/// Prune `messages` until the estimate fits `target` tokens.
///
/// System messages and everything from the Nth-last observation onward are
/// protected; older non-system messages are dropped front-first. Protected
/// system messages float to the front of the transcript. Returns whether
/// the target was reached.
pub(crate) fn prune_to_fit(
    messages: &mut Vec<Message>,
    target: usize,
    keep_recent_observations: usize,
) -> bool {
    if estimate_messages(messages) <= target {
        return true;
    }

    let observation_positions: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::Observation)
        .map(|(i, _)| i)
        .collect();
    let window_start = if observation_positions.is_empty() || keep_recent_observations == 0 {
        messages.len()
    } else if observation_positions.len() >= keep_recent_observations {
        observation_positions[observation_positions.len() - keep_recent_observations]
    } else {
        observation_positions[0]
    };

    let tail = messages.split_off(window_start);
    let (system, mut middle): (Vec<Message>, Vec<Message>) =
        messages.drain(..).partition(|m| m.role == Role::System);

    let fixed = estimate_messages(&system) + estimate_messages(&tail);
    let mut dropped = 0usize;
    while !middle.is_empty() && fixed + estimate_messages(&middle) > target {
        middle.remove(0);
        dropped += 1;
    }
    if dropped > 0 {
        tracing::debug!(dropped, "pruned oldest transcript messages");
    }

    messages.extend(system);
    messages.extend(middle);
    messages.extend(tail);
    estimate_messages(messages) <= target
}
