use crate::db::models::{Counts, Vote};

/// Counts votes per option. Options are taken verbatim, so an unexpected
/// option simply becomes its own key.
pub fn aggregate<'a, I>(votes: I) -> Counts
where
    I: IntoIterator<Item = &'a Vote>,
{
    let mut counts = Counts::new();
    for vote in votes {
        *counts.entry(vote.option.clone()).or_insert(0) += 1;
    }
    counts
}
