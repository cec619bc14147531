//! 投票平滑 (temporal smoothing by majority vote)

use tracing::warn;

/// Committed on-air camera plus the votes of the current window.
/// Owned by the coordinator thread only.
#[derive(Clone, Debug)]
pub struct SwitchState {
    committed: usize,
    votes: Vec<u32>,
    window: usize,
    cycle: u64,
}

impl SwitchState {
    /// `window` is clamped to at least 1.
    pub fn new(num_cameras: usize, window: usize, initial: usize) -> Self {
        Self {
            committed: initial,
            votes: vec![0; num_cameras],
            window: window.max(1),
            cycle: 0,
        }
    }

    /// Records the winner of one cycle. At every multiple of the window length
    /// the camera with the most votes is committed (lowest index on ties), the
    /// votes are reset and the committed index is returned.
    pub fn record(&mut self, winner: usize) -> Option<usize> {
        match self.votes.get_mut(winner) {
            Some(count) => *count += 1,
            None => {
                warn!("⚠️  vote for unknown camera index {} ignored", winner);
                return None;
            }
        }
        self.cycle += 1;
        if self.cycle % self.window as u64 != 0 {
            return None;
        }

        let mut best = self.committed;
        let mut best_votes = 0;
        for (idx, &count) in self.votes.iter().enumerate() {
            if count > best_votes {
                best = idx;
                best_votes = count;
            }
        }
        self.committed = best;
        self.votes.iter_mut().for_each(|v| *v = 0);
        Some(best)
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn votes(&self) -> &[u32] {
        &self.votes
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn window(&self) -> usize {
        self.window
    }
}
