/// Per-cycle winner among the analyzed cameras, fed in fixed camera order.
///
/// A candidate wins only with a score strictly greater than the running
/// maximum (which starts at 0), so ties keep the earliest camera. If nobody
/// scores above 0, the last camera offered wins.
#[derive(Clone, Debug, Default)]
pub struct CycleSelection {
    best: Option<usize>,
    max_score: f64,
    last_seen: Option<usize>,
}

impl CycleSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, camera: usize, score: f64) {
        self.last_seen = Some(camera);
        if score > self.max_score {
            self.max_score = score;
            self.best = Some(camera);
        }
    }

    /// `None` only when no camera was offered this cycle.
    pub fn winner(&self) -> Option<usize> {
        self.best.or(self.last_seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_max() {
        let mut sel = CycleSelection::new();
        sel.offer(0, 10.0);
        sel.offer(1, 10.0);
        sel.offer(2, 3.0);
        assert_eq!(sel.winner(), Some(0));
    }

    #[test]
    fn test_all_zero_falls_back_to_last() {
        let mut sel = CycleSelection::new();
        for cam in [0, 1, 3] {
            sel.offer(cam, 0.0);
        }
        assert_eq!(sel.winner(), Some(3));
    }

    #[test]
    fn test_empty_cycle() {
        assert_eq!(CycleSelection::new().winner(), None);
    }
}
