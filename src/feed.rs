//! Feed composition: variant generation and viral blending.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::event::Event;
use crate::repository::EventWithMeta;
use crate::scoring::{affinity_score, Weights};

/// Number of feed variants generated per viewer and kind.
pub const NUM_VARIANTS: usize = 5;
/// Maximum notes per variant.
pub const VARIANT_SIZE: usize = 100;

/// A scored, positioned feed candidate.
#[derive(Debug, Clone)]
pub struct FeedNote {
    pub event: Event,
    pub score: f64,
}

/// Build the viewer's feed variants from affinity candidates and the
/// shared viral pool.
///
/// Every variant holds at most one note per author; an author's i-th
/// best note (wrapping) lands in variant i so successive variants show
/// different material. Viral entries fill the remaining space without
/// repeating authors, then each variant is sorted by score.
pub fn compose_variants(
    candidates: Vec<EventWithMeta>,
    viral: &[FeedNote],
    viewer: &str,
    kind: u32,
    weights: &Weights,
    now: DateTime<Utc>,
) -> Vec<Vec<FeedNote>> {
    let mut scored: Vec<FeedNote> = candidates
        .into_iter()
        .filter(|c| c.event.pubkey != viewer && c.event.kind == kind)
        .map(|c| {
            let age_hours = age_hours(c.created_at, now);
            let score = affinity_score(
                c.global_comments,
                c.global_reactions,
                c.global_zaps,
                c.interaction_count,
                age_hours,
                weights,
            );
            FeedNote {
                event: c.event,
                score,
            }
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    // Group by author, best note first, preserving score order of authors.
    let mut author_order: Vec<String> = Vec::new();
    let mut by_author: HashMap<String, Vec<FeedNote>> = HashMap::new();
    for note in scored {
        let author = note.event.pubkey.clone();
        let entry = by_author.entry(author.clone()).or_default();
        if entry.is_empty() {
            author_order.push(author);
        }
        entry.push(note);
    }

    (0..NUM_VARIANTS)
        .map(|i| {
            let mut variant: Vec<FeedNote> = author_order
                .iter()
                .map(|author| {
                    let notes = &by_author[author];
                    notes[i % notes.len()].clone()
                })
                .collect();

            let mut seen_authors: HashSet<String> = variant
                .iter()
                .map(|n| n.event.pubkey.clone())
                .collect();
            for pool_note in viral {
                if variant.len() >= VARIANT_SIZE {
                    break;
                }
                if pool_note.event.kind != kind || pool_note.event.pubkey == viewer {
                    continue;
                }
                if seen_authors.insert(pool_note.event.pubkey.clone()) {
                    variant.push(pool_note.clone());
                }
            }

            variant.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            variant.truncate(VARIANT_SIZE);
            variant
        })
        .collect()
}

/// Hours elapsed between a note's creation and `now`, floored at zero.
pub fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - created_at).num_seconds().max(0)) as f64 / 3600.0
}
