use std::ops::ControlFlow;

/// Running best of a sequence of scored attempts.
///
/// An attempt replaces the current best only when its score is strictly higher,
/// and never when it does not beat the floor. Offering an attempt whose score
/// reaches the threshold asks the caller to stop.
#[derive(Debug, Clone)]
pub struct BestOf<T> {
    best: Option<(i32, T)>,
    floor: i32,
    threshold: Option<i32>,
}

impl<T> BestOf<T> {
    pub fn new(threshold: Option<i32>) -> Self {
        Self::with_floor(0, threshold)
    }

    pub fn with_floor(floor: i32, threshold: Option<i32>) -> Self {
        BestOf {
            best: None,
            floor,
            threshold,
        }
    }

    pub fn offer(&mut self, score: i32, item: T) -> ControlFlow<()> {
        let current = self.best.as_ref().map_or(self.floor, |(s, _)| *s);
        if score > current {
            self.best = Some((score, item));
        }
        match self.threshold {
            Some(threshold) if score >= threshold => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }

    pub fn best_score(&self) -> Option<i32> {
        self.best.as_ref().map(|(s, _)| *s)
    }

    pub fn best(&self) -> Option<&T> {
        self.best.as_ref().map(|(_, item)| item)
    }

    pub fn into_best(self) -> Option<(i32, T)> {
        self.best
    }
}

/// Picks the highest-scoring item, stopping early once one reaches `threshold`.
pub fn select_best<T, I, F>(items: I, threshold: Option<i32>, mut score: F) -> Option<(i32, T)>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> i32,
{
    let mut best = BestOf::new(threshold);
    for item in items {
        let s = score(&item);
        if best.offer(s, item).is_break() {
            break;
        }
    }
    best.into_best()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ties_keep_first() {
        let picked = select_best(vec![("a", 40), ("b", 40), ("c", 10)], None, |(_, s)| *s);
        assert_eq!(picked.map(|(_, (name, _))| name), Some("a"));
    }

    #[test]
    fn test_zero_scores_never_win() {
        let picked = select_best(vec![0, 0, -5], None, |s| *s);
        assert!(picked.is_none());
    }

    #[test]
    fn test_threshold_stops_iteration() {
        let mut seen = Vec::new();
        let picked = select_best(vec![30, 95, 120], Some(90), |s| {
            seen.push(*s);
            *s
        });
        assert_eq!(picked, Some((95, 95)));
        assert_eq!(seen, vec![30, 95]);
    }

    #[test]
    fn test_break_even_when_not_improving() {
        let mut best = BestOf::new(Some(50));
        assert!(best.offer(80, "first").is_break());
        assert!(best.offer(60, "second").is_break());
        assert_eq!(best.best(), Some(&"first"));
        assert_eq!(best.best_score(), Some(80));
    }
}
