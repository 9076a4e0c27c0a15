//! Ranking and shortlist selection.

use crate::types::IdeaCandidate;

/// Stable sort by score, highest first.
pub fn rank(ideas: &mut [IdeaCandidate]) {
    ideas.sort_by(|a, b| b.score.cmp(&a.score));
}

/// The first `size` verified ideas of an already ranked, deduplicated list.
pub fn shortlist(ranked: &[IdeaCandidate], size: usize) -> Vec<IdeaCandidate> {
    ranked
        .iter()
        .filter(|idea| idea.verified)
        .take(size)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idea(title: &str, score: u8, verified: bool) -> IdeaCandidate {
        let mut idea = IdeaCandidate::new(title, score, Vec::new());
        idea.verified = verified;
        idea
    }

    #[test]
    fn test_rank_is_stable_descending() {
        let mut ideas = vec![idea("a", 50, true), idea("b", 90, true), idea("c", 50, true)];
        rank(&mut ideas);
        let titles: Vec<_> = ideas.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_shortlist_only_verified_capped() {
        let ranked: Vec<_> = (0..8)
            .map(|i| idea(&format!("i{i}"), 100 - i, i % 4 != 1))
            .collect();
        let picked = shortlist(&ranked, 5);
        assert_eq!(picked.len(), 5);
        assert!(picked.iter().all(|i| i.verified));
        assert_eq!(picked[0].title, "i0");
        assert_eq!(picked[1].title, "i2");
    }

    #[test]
    fn test_shortlist_fewer_than_size() {
        let ranked = vec![idea("a", 10, false), idea("b", 5, true)];
        assert_eq!(shortlist(&ranked, 5).len(), 1);
    }
}
