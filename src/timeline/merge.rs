use tracing::debug;

use super::blocks::TimeBlock;

/// Collapses runs of touching blocks that show the same thing: either the same dominant activity
/// or nothing meaningful at all. Total covered time is unchanged.
pub fn merge(blocks: Vec<TimeBlock>) -> Vec<TimeBlock> {
    let total = blocks.len();
    let mut merged: Vec<TimeBlock> = Vec::with_capacity(total);

    for block in blocks {
        match merged.last_mut() {
            Some(previous) if previous.end == block.start && can_merge(previous, &block) => {
                absorb(previous, block);
            }
            Some(_) | None => merged.push(block),
        }
    }

    debug!("Merged {total} blocks into {}", merged.len());
    merged
}

fn can_merge(previous: &TimeBlock, next: &TimeBlock) -> bool {
    if previous.is_empty() || next.is_empty() {
        return false;
    }
    let same_activity = matches!(
        (previous.dominant_name(), next.dominant_name()),
        (Some(a), Some(b)) if a == b
    );
    same_activity || (previous.inactive_only && next.inactive_only)
}

fn absorb(previous: &mut TimeBlock, next: TimeBlock) {
    previous.end = next.end;
    previous.afk_only &= next.afk_only;
    previous.inactive_only &= next.inactive_only;
    previous.covered += next.covered;
    previous.members.extend(next.members);
}
