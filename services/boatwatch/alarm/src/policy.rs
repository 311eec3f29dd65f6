//! Detection policy: what an arming mode does with a presence event.

use boatwatch_wire::{AlarmMode, Detection, DetectionKind, Zone};
use serde::{Deserialize, Serialize};

/// Default detector sensitivity (0-100)
pub const DEFAULT_SENSITIVITY: u8 = 50;

/// What the hub should do about one detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionDecision {
    /// Nothing to do
    Ignore,
    /// Visitor at the entrance; chime, no alarm
    Chime,
    /// Trip the alarm
    Trigger {
        /// Whether the siren should sound on the nodes
        audible: bool,
    },
}

/// Maps detections to decisions for a given sensitivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionPolicy {
    sensitivity: u8,
}

impl DetectionPolicy {
    /// Policy for a sensitivity in 0-100 (higher values are clamped)
    pub fn new(sensitivity: u8) -> Self {
        Self {
            sensitivity: sensitivity.min(100),
        }
    }

    /// Configured sensitivity
    pub fn sensitivity(&self) -> u8 {
        self.sensitivity
    }

    /// Lowest confidence that counts; 95 at sensitivity 0, 40 at sensitivity 100
    pub fn min_confidence(&self) -> u8 {
        (95 - (self.sensitivity as u16 * 55 / 100)) as u8
    }

    /// Decide what `detection` means while the system is in `mode`
    pub fn decide(&self, mode: AlarmMode, detection: &Detection) -> DetectionDecision {
        if detection.confidence < self.min_confidence() {
            return DetectionDecision::Ignore;
        }

        match (mode, detection.kind) {
            (AlarmMode::Disarmed, _) => DetectionDecision::Ignore,
            (_, DetectionKind::Doorbell) if mode != AlarmMode::Full => DetectionDecision::Chime,
            (AlarmMode::Doorbell, _) => DetectionDecision::Ignore,
            (AlarmMode::Perimeter, DetectionKind::Approach | DetectionKind::Entry) => {
                DetectionDecision::Trigger { audible: true }
            }
            (AlarmMode::Perimeter, _) => DetectionDecision::Ignore,
            (AlarmMode::Full, _) => DetectionDecision::Trigger { audible: true },
            (AlarmMode::Quiet, _) => DetectionDecision::Trigger { audible: false },
        }
    }
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVITY)
    }
}

/// Upper bounds of the detection distance bands (cm)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneLimits {
    /// Near band upper bound
    pub near_max_cm: u16,
    /// Middle band upper bound
    pub middle_max_cm: u16,
    /// Far band upper bound; anything beyond is out of range
    pub far_max_cm: u16,
}

impl ZoneLimits {
    /// Band for a measured distance, or `None` when out of range
    pub fn classify(&self, distance_cm: u16) -> Option<Zone> {
        if distance_cm <= self.near_max_cm {
            Some(Zone::Near)
        } else if distance_cm <= self.middle_max_cm {
            Some(Zone::Middle)
        } else if distance_cm <= self.far_max_cm {
            Some(Zone::Far)
        } else {
            None
        }
    }
}

impl Default for ZoneLimits {
    fn default() -> Self {
        Self {
            near_max_cm: 100,
            middle_max_cm: 300,
            far_max_cm: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(kind: DetectionKind, confidence: u8) -> Detection {
        Detection {
            kind,
            confidence,
            distance_cm: 150,
            zone: Zone::Middle,
        }
    }

    #[test]
    fn test_min_confidence() {
        assert_eq!(DetectionPolicy::new(0).min_confidence(), 95);
        assert_eq!(DetectionPolicy::new(50).min_confidence(), 68);
        assert_eq!(DetectionPolicy::new(100).min_confidence(), 40);
        assert_eq!(DetectionPolicy::new(200).min_confidence(), 40);
    }

    #[test]
    fn test_disarmed_ignores_everything() {
        let policy = DetectionPolicy::default();
        for kind in [DetectionKind::Approach, DetectionKind::Entry, DetectionKind::Doorbell] {
            assert_eq!(
                policy.decide(AlarmMode::Disarmed, &detection(kind, 100)),
                DetectionDecision::Ignore
            );
        }
    }

    #[test]
    fn test_low_confidence_ignored() {
        let policy = DetectionPolicy::default();
        assert_eq!(
            policy.decide(AlarmMode::Full, &detection(DetectionKind::Entry, 67)),
            DetectionDecision::Ignore
        );
        assert_eq!(
            policy.decide(AlarmMode::Full, &detection(DetectionKind::Entry, 68)),
            DetectionDecision::Trigger { audible: true }
        );
    }

    #[test]
    fn test_mode_table() {
        let policy = DetectionPolicy::default();
        let approach = detection(DetectionKind::Approach, 90);
        let doorbell = detection(DetectionKind::Doorbell, 90);
        let unknown = detection(DetectionKind::Other(7), 90);

        assert_eq!(policy.decide(AlarmMode::Doorbell, &doorbell), DetectionDecision::Chime);
        assert_eq!(policy.decide(AlarmMode::Doorbell, &approach), DetectionDecision::Ignore);

        assert_eq!(
            policy.decide(AlarmMode::Perimeter, &approach),
            DetectionDecision::Trigger { audible: true }
        );
        assert_eq!(policy.decide(AlarmMode::Perimeter, &doorbell), DetectionDecision::Chime);
        assert_eq!(policy.decide(AlarmMode::Perimeter, &unknown), DetectionDecision::Ignore);

        assert_eq!(
            policy.decide(AlarmMode::Full, &doorbell),
            DetectionDecision::Trigger { audible: true }
        );
        assert_eq!(
            policy.decide(AlarmMode::Full, &unknown),
            DetectionDecision::Trigger { audible: true }
        );

        assert_eq!(
            policy.decide(AlarmMode::Quiet, &approach),
            DetectionDecision::Trigger { audible: false }
        );
        assert_eq!(policy.decide(AlarmMode::Quiet, &doorbell), DetectionDecision::Chime);
    }

    #[test]
    fn test_zone_classification() {
        let limits = ZoneLimits::default();
        assert_eq!(limits.classify(0), Some(Zone::Near));
        assert_eq!(limits.classify(100), Some(Zone::Near));
        assert_eq!(limits.classify(101), Some(Zone::Middle));
        assert_eq!(limits.classify(600), Some(Zone::Far));
        assert_eq!(limits.classify(601), None);
    }
}
