//! Outgoing report queue between the main loop and the BLE connection.
//!
//! Keys are always sent as a press report followed by a release report.
//! A pair goes in whole or not at all, so the host never sees a press
//! without the release that follows it.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use super::HidReport;

/// Bounded report queue.  The main loop is the only producer.
pub struct ReportQueue<M: RawMutex, const N: usize> {
    channel: Channel<M, HidReport, N>,
}

impl<M: RawMutex, const N: usize> ReportQueue<M, N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Queue a press + release pair.  Returns `false`, queueing nothing,
    /// when both do not fit.
    pub fn try_send_tap(&self, tap: [HidReport; 2]) -> bool {
        if self.channel.free_capacity() < tap.len() {
            return false;
        }
        for report in tap {
            // Cannot fail: capacity was checked and nobody else sends.
            if self.channel.try_send(report).is_err() {
                return false;
            }
        }
        true
    }

    /// Next report for the connection task.
    pub async fn receive(&self) -> HidReport {
        self.channel.receive().await
    }

    pub fn try_receive(&self) -> Option<HidReport> {
        self.channel.try_receive().ok()
    }

    /// Drop everything queued, e.g. for a fresh connection.
    pub fn clear(&self) {
        self.channel.clear();
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl<M: RawMutex, const N: usize> Default for ReportQueue<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::{consumer_tap, letter_tap, ConsumerUsage};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    type Queue = ReportQueue<NoopRawMutex, 5>;

    #[test]
    fn taps_are_queued_in_order() {
        let queue = Queue::new();
        let tap = consumer_tap(ConsumerUsage::VolumeUp);
        assert!(queue.try_send_tap(tap));
        assert_eq!(queue.try_receive(), Some(tap[0]));
        assert_eq!(queue.try_receive(), Some(tap[1]));
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_never_splits_a_pair() {
        let queue = Queue::new();
        let up = consumer_tap(ConsumerUsage::VolumeUp);
        assert!(queue.try_send_tap(up));
        assert!(queue.try_send_tap(up));
        // One slot left: the next pair must be refused whole.
        assert!(!queue.try_send_tap(up));
        assert_eq!(queue.len(), 4);

        // Every press in the queue is followed by its release.
        let mut drained = std::vec::Vec::new();
        while let Some(report) = queue.try_receive() {
            drained.push(report);
        }
        assert_eq!(drained, [up[0], up[1], up[0], up[1]]);
    }

    #[test]
    fn room_frees_up_as_the_connection_drains() {
        let queue = Queue::new();
        let letter = letter_tap('q').unwrap();
        assert!(queue.try_send_tap(letter));
        assert!(queue.try_send_tap(letter));
        assert!(!queue.try_send_tap(letter));

        queue.try_receive();
        assert!(queue.try_send_tap(letter));
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn clear_empties_the_queue() {
        let queue = Queue::new();
        queue.try_send_tap(consumer_tap(ConsumerUsage::VolumeDown));
        queue.clear();
        assert!(queue.is_empty());
    }
}
