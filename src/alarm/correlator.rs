use super::decoder::DecodedAlarmEvent;
use crate::events::{AlarmAction, CameraEvent};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Silence after which an alarm the device stopped repeating is ended
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(2);

/// Identity of one ongoing alarm condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmKey {
    pub code: String,
    pub channel: u32,
}

impl AlarmKey {
    pub fn new<S: Into<String>>(code: S, channel: u32) -> Self {
        Self {
            code: code.into(),
            channel,
        }
    }
}

/// A coalesced alarm transition ready to be published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmTransition {
    pub code: String,
    pub action: AlarmAction,
    pub channel: u32,
}

impl AlarmTransition {
    fn stop(key: &AlarmKey) -> Self {
        Self {
            code: key.code.clone(),
            action: AlarmAction::Stop,
            channel: key.channel,
        }
    }

    pub fn into_event(self) -> CameraEvent {
        CameraEvent::alarm(self.code, self.action, self.channel)
    }
}

/// Turns the device's repeated per-packet reports into Start/Stop pairs.
///
/// The device re-sends an active report while a condition persists and a
/// single `activePostCount == 0` heartbeat once everything is clear. A
/// heartbeat ends every tracked alarm at once; an alarm that simply stops
/// being reported is ended by the next sweep after `stale_after` of silence.
#[derive(Debug)]
pub struct AlarmCorrelator {
    active: BTreeMap<AlarmKey, Instant>,
    trigger_active: bool,
    stale_after: Duration,
    verbose: bool,
}

impl AlarmCorrelator {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            active: BTreeMap::new(),
            trigger_active: false,
            stale_after,
            verbose: false,
        }
    }

    /// Also report heartbeats received while nothing is active
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn process(&mut self, event: &DecodedAlarmEvent) -> Vec<AlarmTransition> {
        self.process_at(event, Instant::now())
    }

    /// Apply one decoded report observed at `now`
    pub fn process_at(&mut self, event: &DecodedAlarmEvent, now: Instant) -> Vec<AlarmTransition> {
        let key = AlarmKey::new(event.code.clone(), event.channel);
        let mut transitions = Vec::new();

        if event.is_heartbeat() {
            if self.trigger_active {
                for (key, last_seen) in std::mem::take(&mut self.active) {
                    debug!(
                        "Ending alarm {} on channel {} after {:?} (heartbeat)",
                        key.code,
                        key.channel,
                        now.saturating_duration_since(last_seen)
                    );
                    transitions.push(AlarmTransition::stop(&key));
                }
                self.trigger_active = false;
            } else if self.verbose {
                transitions.push(AlarmTransition {
                    code: event.code.clone(),
                    action: event.action.clone(),
                    channel: event.channel,
                });
            }
        } else if !self.active.contains_key(&key) {
            self.active.insert(key, now);
            self.trigger_active = true;
            transitions.push(AlarmTransition {
                code: event.code.clone(),
                action: event.action.clone(),
                channel: event.channel,
            });
        } else {
            trace!(
                "Refreshing alarm {} {} on channel {} (count {})",
                event.code,
                event.action,
                event.channel,
                event.active_post_count
            );
            self.active.insert(key, now);

            let stale_after = self.stale_after;
            let mut stale = Vec::new();
            self.active.retain(|key, last_seen| {
                let silent_for = now.saturating_duration_since(*last_seen);
                if silent_for > stale_after {
                    debug!(
                        "Ending alarm {} on channel {} after {:?} of silence",
                        key.code, key.channel, silent_for
                    );
                    stale.push(AlarmTransition::stop(key));
                    false
                } else {
                    true
                }
            });
            transitions.extend(stale);
            self.trigger_active = !self.active.is_empty();
        }

        transitions
    }

    /// Number of alarms currently considered ongoing
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, code: &str, channel: u32) -> bool {
        self.active.contains_key(&AlarmKey::new(code, channel))
    }

    /// True while at least one alarm is ongoing
    pub fn is_trigger_active(&self) -> bool {
        self.trigger_active
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }
}

impl Default for AlarmCorrelator {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}
