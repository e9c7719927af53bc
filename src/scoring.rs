//! Pure scoring functions for feed ranking.

/// Scoring weights, either the process defaults or a viewer's saved
/// overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    /// Weight of the viewer's interaction count with the author.
    pub author_interactions: f64,
    /// Weight of the note's global comment count.
    pub global_comments: f64,
    /// Weight of the note's global reaction count.
    pub global_reactions: f64,
    /// Weight of the note's global zap count.
    pub global_zaps: f64,
    /// Weight of the recency factor.
    pub recency: f64,
    /// Exponential decay rate per hour of age, in `[0, 1]`.
    pub decay_rate: f64,
    /// Minimum engagement sum for a note to count as viral.
    pub viral_threshold: f64,
    /// Multiplier applied to viral scores, in `[0, 1]`.
    pub viral_dampening: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            author_interactions: 1.0,
            global_comments: 1.0,
            global_reactions: 1.0,
            global_zaps: 1.0,
            recency: 1.0,
            decay_rate: 1.0,
            viral_threshold: 1.0,
            viral_dampening: 1.0,
        }
    }
}

/// Exponential recency factor for a note of the given age, clamped to
/// `[0.001, 1.0]`.
pub fn recency_factor(age_hours: f64, decay_rate: f64) -> f64 {
    let factor = (-decay_rate * age_hours).exp() * 100.0;
    factor.clamp(0.001, 1.0)
}

/// Score for a note from one of the viewer's affinity authors.
pub fn affinity_score(
    comments: i64,
    reactions: i64,
    zaps: i64,
    interaction_count: i64,
    age_hours: f64,
    w: &Weights,
) -> f64 {
    comments as f64 * w.global_comments
        + reactions as f64 * w.global_reactions
        + zaps as f64 * w.global_zaps
        + recency_factor(age_hours, w.decay_rate) * w.recency
        + interaction_count as f64 * w.author_interactions
}

/// Dampened score for a globally popular note.
pub fn viral_score(comments: i64, reactions: i64, zaps: i64, age_hours: f64, w: &Weights) -> f64 {
    (comments as f64 * w.global_comments
        + reactions as f64 * w.global_reactions
        + zaps as f64 * w.global_zaps
        + recency_factor(age_hours, w.decay_rate) * w.recency)
        * w.viral_dampening
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recency_factor_is_clamped() {
        // Brand-new notes saturate at 1.0 despite the 100x scale.
        assert_eq!(recency_factor(0.0, 0.5), 1.0);
        // Old notes floor at 0.001.
        assert_eq!(recency_factor(10_000.0, 0.5), 0.001);
        let mid = recency_factor(10.0, 0.5);
        assert!(mid > 0.001 && mid < 1.0);
        // Zero decay leaves the scale factor saturated for any age.
        assert_eq!(recency_factor(10_000.0, 0.0), 1.0);
    }

    #[test]
    fn affinity_score_is_monotone_in_counts() {
        let w = Weights::default();
        let base = affinity_score(1, 2, 3, 4, 5.0, &w);
        assert!(affinity_score(2, 2, 3, 4, 5.0, &w) >= base);
        assert!(affinity_score(1, 3, 3, 4, 5.0, &w) >= base);
        assert!(affinity_score(1, 2, 4, 4, 5.0, &w) >= base);
        assert!(affinity_score(1, 2, 3, 5, 5.0, &w) >= base);
    }

    #[test]
    fn affinity_score_weighs_counts() {
        let w = Weights {
            global_comments: 2.0,
            global_reactions: 3.0,
            global_zaps: 5.0,
            author_interactions: 7.0,
            recency: 0.0,
            ..Weights::default()
        };
        let score = affinity_score(1, 1, 1, 1, 0.0, &w);
        assert_eq!(score, 2.0 + 3.0 + 5.0 + 7.0);
    }

    #[test]
    fn viral_score_applies_dampening() {
        let w = Weights {
            viral_dampening: 0.5,
            recency: 0.0,
            ..Weights::default()
        };
        assert_eq!(viral_score(2, 2, 2, 0.0, &w), 3.0);
        // Dampening ignores the author-interaction term entirely.
        let undamped = Weights {
            recency: 0.0,
            ..Weights::default()
        };
        assert_eq!(viral_score(2, 2, 2, 0.0, &undamped), 6.0);
    }
}
