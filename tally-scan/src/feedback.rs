//! Operator feedback dispatch
//!
//! The controller asks for a vibration pulse and an audio cue on every
//! accepted scan. Playback itself belongs to the presentation client; the
//! default sink forwards requests over the event bus. Dispatch never blocks
//! and a failure never fails the scan: the controller only logs it.

use std::time::Duration;
use tally_common::events::{Cue, EventBus, FeedbackRequest, ScanEvent};
use tally_common::{Error, Result};

pub trait FeedbackSink: Send + Sync {
    fn vibrate(&self, duration: Duration) -> Result<()>;

    fn play(&self, cue: Cue) -> Result<()>;
}

/// Publishes feedback requests as `FeedbackRequested` events
pub struct EventFeedback {
    bus: EventBus,
}

impl EventFeedback {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    fn send(&self, feedback: FeedbackRequest) -> Result<()> {
        self.bus
            .emit(ScanEvent::FeedbackRequested {
                feedback,
                timestamp: chrono::Utc::now(),
            })
            .map(|_| ())
            .map_err(|_| Error::Feedback("no presentation client connected".to_string()))
    }
}

impl FeedbackSink for EventFeedback {
    fn vibrate(&self, duration: Duration) -> Result<()> {
        self.send(FeedbackRequest::Vibrate {
            duration_ms: duration.as_millis() as u64,
        })
    }

    fn play(&self, cue: Cue) -> Result<()> {
        self.send(FeedbackRequest::Cue {
            cue,
            asset: cue.asset_name().to_string(),
        })
    }
}

/// Discards all feedback (headless or scripted runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentFeedback;

impl FeedbackSink for SilentFeedback {
    fn vibrate(&self, _duration: Duration) -> Result<()> {
        Ok(())
    }

    fn play(&self, _cue: Cue) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_feedback_without_client_fails() {
        let feedback = EventFeedback::new(EventBus::new(10));
        assert!(matches!(feedback.play(Cue::Normal), Err(Error::Feedback(_))));
    }

    #[test]
    fn test_event_feedback_publishes_requests() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let feedback = EventFeedback::new(bus);

        feedback.vibrate(Duration::from_millis(200)).unwrap();
        feedback.play(Cue::Escalation).unwrap();

        match rx.try_recv().unwrap() {
            ScanEvent::FeedbackRequested { feedback, .. } => {
                assert_eq!(feedback, FeedbackRequest::Vibrate { duration_ms: 200 });
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.try_recv().unwrap() {
            ScanEvent::FeedbackRequested { feedback, .. } => {
                assert_eq!(
                    feedback,
                    FeedbackRequest::Cue {
                        cue: Cue::Escalation,
                        asset: "hangchuy.mp3".to_string()
                    }
                );
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
