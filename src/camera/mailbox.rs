//! 单槽邮箱 (single-slot mailbox)
//!
//! A capacity-1 channel between one camera worker and the coordinator.
//! `publish` blocks while the previous sample is unconsumed; `receive` blocks
//! until a sample arrives. Both also wake up on cancellation. The mailbox is
//! closed when either side is dropped.

use crate::frame::VideoFrame;
use crate::lifecycle::CancellationToken;
use crate::motion::ScoreSample;
use crossbeam_channel::{bounded, select, Receiver, Sender};

/// One published frame and its motion score (zero for display-only cameras).
#[derive(Clone, Debug)]
pub struct Sample {
    pub frame: VideoFrame,
    pub score: ScoreSample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// The coordinator is gone.
    Closed,
    Cancelled,
}

#[derive(Debug)]
pub enum Received {
    Sample(Sample),
    /// The worker is gone: end of stream, source failure or cancellation.
    Closed,
    Cancelled,
}

pub fn mailbox(token: &CancellationToken) -> (MailboxSender, MailboxReceiver) {
    let (tx, rx) = bounded(1);
    (
        MailboxSender {
            tx,
            token: token.clone(),
        },
        MailboxReceiver {
            rx,
            token: token.clone(),
        },
    )
}

pub struct MailboxSender {
    tx: Sender<Sample>,
    token: CancellationToken,
}

impl MailboxSender {
    /// Waits for the slot to be free, then stores `sample`.
    pub fn publish(&self, sample: Sample) -> Result<(), PublishError> {
        if self.token.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        select! {
            send(self.tx, sample) -> res => res.map_err(|_| PublishError::Closed),
            recv(self.token.receiver()) -> _ => Err(PublishError::Cancelled),
        }
    }
}

pub struct MailboxReceiver {
    rx: Receiver<Sample>,
    token: CancellationToken,
}

impl MailboxReceiver {
    /// Takes the pending sample, freeing the slot for the worker.
    /// A sample taken after cancellation is discarded and reported as `Cancelled`.
    pub fn receive(&self) -> Received {
        if self.token.is_cancelled() {
            return Received::Cancelled;
        }
        select! {
            recv(self.rx) -> msg => match msg {
                Ok(_) if self.token.is_cancelled() => Received::Cancelled,
                Ok(sample) => Received::Sample(sample),
                Err(_) => Received::Closed,
            },
            recv(self.token.receiver()) -> _ => Received::Cancelled,
        }
    }

    /// Number of unconsumed samples (0 or 1).
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn sample(seq: u64, score: f64) -> Sample {
        Sample {
            frame: VideoFrame::new(RgbImage::new(2, 2), seq),
            score: ScoreSample {
                score,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_at_most_one_pending() {
        let token = CancellationToken::new();
        let (tx, rx) = mailbox(&token);
        let published = Arc::new(AtomicUsize::new(0));

        let producer = {
            let published = published.clone();
            thread::spawn(move || {
                for i in 0..5 {
                    if tx.publish(sample(i, i as f64)).is_err() {
                        break;
                    }
                    published.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        // 消费者很慢: 生产者最多领先一个样本
        thread::sleep(Duration::from_millis(50));
        assert_eq!(published.load(Ordering::SeqCst), 1);
        assert_eq!(rx.pending(), 1);

        let mut seqs = Vec::new();
        for _ in 0..5 {
            match rx.receive() {
                Received::Sample(s) => seqs.push(s.frame.seq),
                other => panic!("unexpected {other:?}"),
            }
            assert!(rx.pending() <= 1);
        }
        producer.join().unwrap();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
        assert!(matches!(rx.receive(), Received::Closed));
    }

    #[test]
    fn test_cancel_unblocks_publisher() {
        let token = CancellationToken::new();
        let (tx, _rx) = mailbox(&token);
        tx.publish(sample(0, 0.0)).unwrap();
        let blocked = thread::spawn(move || tx.publish(sample(1, 0.0)));
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert_eq!(blocked.join().unwrap(), Err(PublishError::Cancelled));
    }

    #[test]
    fn test_cancel_unblocks_receiver() {
        let token = CancellationToken::new();
        let (_tx, rx) = mailbox(&token);
        let waiter = thread::spawn(move || rx.receive());
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(matches!(waiter.join().unwrap(), Received::Cancelled));
    }

    #[test]
    fn test_dropped_receiver_closes_publisher() {
        let token = CancellationToken::new();
        let (tx, rx) = mailbox(&token);
        drop(rx);
        assert_eq!(tx.publish(sample(0, 0.0)), Err(PublishError::Closed));
    }

    #[test]
    fn test_pending_sample_delivered_before_close() {
        let token = CancellationToken::new();
        let (tx, rx) = mailbox(&token);
        tx.publish(sample(7, 3.5)).unwrap();
        drop(tx);
        match rx.receive() {
            Received::Sample(s) => assert_eq!(s.score.score, 3.5),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(rx.receive(), Received::Closed));
    }
}
