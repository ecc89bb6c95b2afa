//! Cadencement temps réel de l'envoi

use crate::skip::SkipSignal;
use std::time::Duration;
use tokio::time::Instant;

/// Keeps a sender at (or just under) the real-time byte rate of a stream
#[derive(Debug)]
pub struct Pacer {
    bytes_per_sec: Option<f64>,
    started: Instant,
    sent: u64,
}

impl Pacer {
    pub fn new(bytes_per_sec: Option<f64>) -> Self {
        Self {
            bytes_per_sec: bytes_per_sec.filter(|rate| *rate > 0.0),
            started: Instant::now(),
            sent: 0,
        }
    }

    /// Constant bitrate output, e.g. the ffmpeg mp3 stream
    pub fn for_bitrate(kbps: u32) -> Self {
        Self::new(Some(kbps as f64 * 1000.0 / 8.0))
    }

    /// Passthrough output: average rate of the file over its duration
    pub fn for_file(size: u64, duration: Duration) -> Self {
        if duration.is_zero() {
            Self::new(None)
        } else {
            Self::new(Some(size as f64 / duration.as_secs_f64()))
        }
    }

    pub fn record(&mut self, bytes: usize) {
        self.sent += bytes as u64;
    }

    /// Time left before the bytes recorded so far are due
    pub fn delay(&self) -> Duration {
        match self.bytes_per_sec {
            Some(rate) => {
                let due = Duration::from_secs_f64(self.sent as f64 / rate);
                due.saturating_sub(self.started.elapsed())
            }
            None => Duration::ZERO,
        }
    }

    /// Sleeps until the next chunk is due; returns `true` if woken by a skip
    pub async fn wait(&self, skip: &mut SkipSignal) -> bool {
        let delay = self.delay();
        if delay.is_zero() {
            return skip.is_set();
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = skip.raised() => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skip::SkipChannel;

    #[test]
    fn test_delay_tracks_byte_rate() {
        let mut pacer = Pacer::new(Some(1000.0));
        pacer.record(500);
        let delay = pacer.delay();
        assert!(delay <= Duration::from_millis(500));
        assert!(delay > Duration::from_millis(300));
    }

    #[test]
    fn test_unpaced_sources() {
        let mut pacer = Pacer::for_file(10_000, Duration::ZERO);
        pacer.record(10_000);
        assert_eq!(pacer.delay(), Duration::ZERO);
        assert_eq!(Pacer::for_bitrate(128).bytes_per_sec, Some(16_000.0));
    }

    #[tokio::test]
    async fn test_skip_interrupts_wait() {
        let channel = SkipChannel::new();
        let mut signal = channel.subscribe();
        let mut pacer = Pacer::new(Some(10.0));
        pacer.record(1000);

        channel.publish();
        let skipped = tokio::time::timeout(Duration::from_secs(1), pacer.wait(&mut signal))
            .await
            .unwrap();
        assert!(skipped);
    }
}
