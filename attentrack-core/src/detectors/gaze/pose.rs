//! Head-pose estimation and the looking/not-looking classifier

use std::time::Duration;

use tokio::time::Instant;

use crate::config::AttentionConfig;
use crate::types::AttentionState;

use super::camera::FaceLandmarks;

/// Fraction of the ear-line-to-chin height where the nose tip sits on a level head
const NEUTRAL_NOSE_DROP: f32 = 0.35;
/// Nose displacement (in face heights) that corresponds to a 90 degree pitch
const PITCH_SPAN: f32 = 0.5;
const MIN_FACE_EXTENT: f32 = 1e-3;

/// Simplified head orientation in degrees
///
/// Positive yaw is turned toward the image's right, positive pitch is tilted down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    pub yaw: f32,
    pub pitch: f32,
}

impl HeadPose {
    /// Estimate yaw from the nose's offset between the ears and pitch from its
    /// height between the ear line and the chin.
    ///
    /// Returns `None` for degenerate landmarks (ears or chin collapsed onto
    /// the nose), which a model can produce on heavily occluded faces.
    pub fn from_landmarks(landmarks: &FaceLandmarks) -> Option<Self> {
        let ear_mid_x = (landmarks.left_ear.x + landmarks.right_ear.x) / 2.0;
        let ear_mid_y = (landmarks.left_ear.y + landmarks.right_ear.y) / 2.0;

        let half_width = (landmarks.right_ear.x - landmarks.left_ear.x).abs() / 2.0;
        let face_height = landmarks.chin.y - ear_mid_y;
        if half_width < MIN_FACE_EXTENT || face_height < MIN_FACE_EXTENT {
            return None;
        }

        let yaw_ratio = (landmarks.nose_tip.x - ear_mid_x) / half_width;
        let drop = (landmarks.nose_tip.y - ear_mid_y) / face_height;
        let pitch_ratio = (drop - NEUTRAL_NOSE_DROP) / PITCH_SPAN;

        Some(Self {
            yaw: yaw_ratio.clamp(-1.0, 1.0).asin().to_degrees(),
            pitch: pitch_ratio.clamp(-1.0, 1.0).asin().to_degrees(),
        })
    }

    pub fn is_looking(&self, thresholds: &PoseThresholds) -> bool {
        self.yaw.abs() < thresholds.max_yaw_degrees
            && self.pitch.abs() < thresholds.max_pitch_degrees
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseThresholds {
    pub max_yaw_degrees: f32,
    pub max_pitch_degrees: f32,
}

impl Default for PoseThresholds {
    fn default() -> Self {
        Self {
            max_yaw_degrees: 30.0,
            max_pitch_degrees: 25.0,
        }
    }
}

/// Result of one gaze poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    Face(HeadPose),
    /// No face, a degenerate face, or a dropped frame
    NoFace,
}

/// Turns per-poll observations into debounced state proposals
#[derive(Debug, Clone)]
pub struct GazeClassifier {
    thresholds: PoseThresholds,
    no_face_grace_frames: u32,
    look_away_threshold: Duration,
    no_face_run: u32,
    not_looking_since: Option<Instant>,
    proposed: AttentionState,
}

impl GazeClassifier {
    pub fn new(
        thresholds: PoseThresholds,
        no_face_grace_frames: u32,
        look_away_threshold: Duration,
    ) -> Self {
        Self {
            thresholds,
            no_face_grace_frames,
            look_away_threshold,
            no_face_run: 0,
            not_looking_since: None,
            proposed: AttentionState::Focused,
        }
    }

    pub fn from_config(config: &AttentionConfig) -> Self {
        Self::new(
            PoseThresholds {
                max_yaw_degrees: config.max_yaw_degrees,
                max_pitch_degrees: config.max_pitch_degrees,
            },
            config.no_face_grace_frames,
            config.look_away_threshold(),
        )
    }

    /// Feed one observation; returns a new proposal when it changes.
    ///
    /// A missing face is held as "no change" for up to `no_face_grace_frames`
    /// consecutive polls. After that, or with a face turned away, the
    /// subject is not looking; once that lasts `look_away_threshold` the
    /// proposal becomes `Distracted`.
    pub fn observe(&mut self, observation: Observation, now: Instant) -> Option<AttentionState> {
        let looking = match observation {
            Observation::Face(pose) => {
                self.no_face_run = 0;
                pose.is_looking(&self.thresholds)
            }
            Observation::NoFace => {
                self.no_face_run = self.no_face_run.saturating_add(1);
                if self.no_face_run <= self.no_face_grace_frames {
                    return None;
                }
                false
            }
        };

        if looking {
            self.not_looking_since = None;
            return self.propose(AttentionState::Focused);
        }

        let since = *self.not_looking_since.get_or_insert(now);
        if now.saturating_duration_since(since) >= self.look_away_threshold {
            self.propose(AttentionState::Distracted)
        } else {
            None
        }
    }

    pub fn proposed(&self) -> AttentionState {
        self.proposed
    }

    fn propose(&mut self, state: AttentionState) -> Option<AttentionState> {
        if self.proposed == state {
            return None;
        }
        self.proposed = state;
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::gaze::camera::Point;

    fn frontal() -> FaceLandmarks {
        FaceLandmarks {
            nose_tip: Point::new(0.5, 0.5),
            left_ear: Point::new(0.3, 0.4),
            right_ear: Point::new(0.7, 0.4),
            chin: Point::new(0.5, 0.6857),
        }
    }

    fn classifier() -> GazeClassifier {
        GazeClassifier::new(PoseThresholds::default(), 4, Duration::from_secs(2))
    }

    fn turned() -> HeadPose {
        HeadPose {
            yaw: 60.0,
            pitch: 0.0,
        }
    }

    fn level() -> HeadPose {
        HeadPose { yaw: 0.0, pitch: 0.0 }
    }

    #[test]
    fn test_frontal_face_is_looking() {
        let pose = HeadPose::from_landmarks(&frontal()).unwrap();
        assert!(pose.yaw.abs() < 1.0);
        assert!(pose.pitch.abs() < 1.0);
        assert!(pose.is_looking(&PoseThresholds::default()));
    }

    #[test]
    fn test_turned_head_has_large_yaw() {
        let mut landmarks = frontal();
        landmarks.nose_tip.x = 0.68;
        let pose = HeadPose::from_landmarks(&landmarks).unwrap();
        assert!(pose.yaw > 60.0);
        assert!(!pose.is_looking(&PoseThresholds::default()));
    }

    #[test]
    fn test_looking_down_has_positive_pitch() {
        let mut landmarks = frontal();
        landmarks.nose_tip.y = 0.62;
        let pose = HeadPose::from_landmarks(&landmarks).unwrap();
        assert!(pose.pitch > 25.0);
        assert!(!pose.is_looking(&PoseThresholds::default()));
    }

    #[test]
    fn test_degenerate_landmarks() {
        let mut landmarks = frontal();
        landmarks.right_ear = landmarks.left_ear;
        assert!(HeadPose::from_landmarks(&landmarks).is_none());
    }

    #[test]
    fn test_short_no_face_run_is_forgiven() {
        let mut classifier = classifier();
        let start = Instant::now();

        for i in 0..4 {
            let at = start + Duration::from_millis(500 * i);
            assert_eq!(classifier.observe(Observation::NoFace, at), None);
        }
        assert_eq!(
            classifier.observe(Observation::Face(level()), start + Duration::from_secs(2)),
            None
        );
        assert_eq!(classifier.proposed(), AttentionState::Focused);
    }

    #[test]
    fn test_long_no_face_run_becomes_distracted() {
        let mut classifier = classifier();
        let start = Instant::now();
        let mut proposals = Vec::new();

        for i in 0..12 {
            let at = start + Duration::from_millis(500 * i);
            proposals.extend(classifier.observe(Observation::NoFace, at));
        }

        // Not looking from the 5th poll (2.0s), distracted 2s later (4.0s)
        assert_eq!(proposals, vec![AttentionState::Distracted]);

        let back = classifier.observe(Observation::Face(level()), start + Duration::from_secs(7));
        assert_eq!(back, Some(AttentionState::Focused));
    }

    #[test]
    fn test_brief_glance_away_is_not_distracted() {
        let mut classifier = classifier();
        let start = Instant::now();

        assert_eq!(classifier.observe(Observation::Face(turned()), start), None);
        assert_eq!(
            classifier.observe(Observation::Face(turned()), start + Duration::from_secs(1)),
            None
        );
        assert_eq!(
            classifier.observe(Observation::Face(level()), start + Duration::from_millis(1500)),
            None
        );
        assert_eq!(
            classifier.observe(Observation::Face(turned()), start + Duration::from_secs(3)),
            None
        );
        assert_eq!(
            classifier.observe(Observation::Face(turned()), start + Duration::from_secs(5)),
            Some(AttentionState::Distracted)
        );
    }

    #[test]
    fn test_dropped_frame_does_not_reset_look_away_timer() {
        let mut classifier = classifier();
        let start = Instant::now();

        classifier.observe(Observation::Face(turned()), start);
        classifier.observe(Observation::NoFace, start + Duration::from_secs(1));
        assert_eq!(
            classifier.observe(Observation::Face(turned()), start + Duration::from_secs(2)),
            Some(AttentionState::Distracted)
        );
    }
}
