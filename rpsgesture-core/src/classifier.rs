//! Gesture classification from hand landmarks
//!
//! Two interchangeable strategies sit behind [`GestureClassifier`]:
//! - [`GeometricClassifier`]: counts extended fingers and maps the count to a
//!   gesture through a [`BandingPolicy`]
//! - [`ExternalModelClassifier`]: delegates scoring to a pluggable
//!   [`ModelBackend`]
//!
//! Classification never fails. Malformed input yields
//! [`ClassificationResult::unknown`].

use serde::{Deserialize, Serialize};

use crate::gesture::{ClassificationResult, Gesture};
use crate::landmarks::{pip_of, LandmarkSet, FINGER_TIPS, THUMB_TIP, WRIST};
use crate::settings::ClassifierSettings;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Thumb counts as extended when its tip sits this much further from the
/// wrist (horizontally) than its reference joint does
const THUMB_EXTENSION_RATIO: f32 = 1.5;

const ROCK_CONFIDENCE: f32 = 0.90;
const SCISSORS_CONFIDENCE: f32 = 0.85;
const PAPER_CONFIDENCE: f32 = 0.90;
const UNMATCHED_CONFIDENCE: f32 = 0.50;

// ============================================================================
// CAPABILITY
// ============================================================================

/// Landmark set in, classification out
pub trait GestureClassifier {
    fn classify(&self, hand: &LandmarkSet) -> ClassificationResult;
}

/// How an extended-finger count maps to a gesture
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandingPolicy {
    /// 0-1 Rock, 2-3 Scissors, 4-5 Paper
    #[default]
    RangeBased,
    /// 0 Rock, 2 Scissors, 5 Paper, anything else Unknown
    ExactMatch,
}

impl BandingPolicy {
    pub fn band(self, extended_fingers: u8) -> ClassificationResult {
        let (gesture, confidence) = match self {
            BandingPolicy::RangeBased => match extended_fingers {
                0 | 1 => (Gesture::Rock, ROCK_CONFIDENCE),
                2 | 3 => (Gesture::Scissors, SCISSORS_CONFIDENCE),
                _ => (Gesture::Paper, PAPER_CONFIDENCE),
            },
            BandingPolicy::ExactMatch => match extended_fingers {
                0 => (Gesture::Rock, ROCK_CONFIDENCE),
                2 => (Gesture::Scissors, SCISSORS_CONFIDENCE),
                5 => (Gesture::Paper, PAPER_CONFIDENCE),
                _ => (Gesture::Unknown, UNMATCHED_CONFIDENCE),
            },
        };
        ClassificationResult::new(gesture, confidence, extended_fingers)
    }
}

// ============================================================================
// GEOMETRIC RULE
// ============================================================================

/// Which digits are extended: thumb, index, middle, ring, pinky.
///
/// Assumes an upright hand with the palm toward the camera. Returns `None`
/// for malformed landmark sets.
pub fn extended_digits(hand: &LandmarkSet) -> Option<[bool; 5]> {
    if let Err(err) = hand.validate() {
        tracing::debug!("Rejecting landmark set: {}", err);
        return None;
    }

    let wrist = hand.get(WRIST)?;
    let thumb_tip = hand.get(THUMB_TIP)?;
    let thumb_pip = hand.get(pip_of(THUMB_TIP))?;

    let mut digits = [false; 5];
    digits[0] = thumb_tip.dx(wrist) > THUMB_EXTENSION_RATIO * thumb_pip.dx(wrist);

    for (slot, &tip) in digits[1..].iter_mut().zip(FINGER_TIPS.iter()) {
        let tip_pt = hand.get(tip)?;
        let pip_pt = hand.get(pip_of(tip))?;
        // Smaller y is higher in the image
        *slot = tip_pt.y < pip_pt.y;
    }

    Some(digits)
}

/// Number of extended digits (0-5), `None` for malformed input
pub fn count_extended(hand: &LandmarkSet) -> Option<u8> {
    extended_digits(hand).map(|digits| digits.iter().filter(|&&d| d).count() as u8)
}

/// Extended-finger counting classifier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeometricClassifier {
    pub banding: BandingPolicy,
}

impl GeometricClassifier {
    pub fn new(banding: BandingPolicy) -> Self {
        Self { banding }
    }
}

impl GestureClassifier for GeometricClassifier {
    fn classify(&self, hand: &LandmarkSet) -> ClassificationResult {
        match count_extended(hand) {
            Some(count) => self.banding.band(count),
            None => ClassificationResult::unknown(),
        }
    }
}

// ============================================================================
// EXTERNAL MODEL
// ============================================================================

/// Per-gesture scores produced by a model backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GestureScores {
    pub rock: f32,
    pub paper: f32,
    pub scissors: f32,
}

impl GestureScores {
    /// Highest-scoring gesture; ties resolve in rock, paper, scissors order
    pub fn best(&self) -> (Gesture, f32) {
        [
            (Gesture::Rock, self.rock),
            (Gesture::Paper, self.paper),
            (Gesture::Scissors, self.scissors),
        ]
        .into_iter()
        .fold((Gesture::Unknown, f32::NEG_INFINITY), |best, cand| {
            if cand.1 > best.1 {
                cand
            } else {
                best
            }
        })
    }
}

/// A trained model that scores a hand
pub trait ModelBackend: Send {
    fn scores(&self, hand: &LandmarkSet) -> anyhow::Result<GestureScores>;
}

/// Classifier backed by an external model
pub struct ExternalModelClassifier {
    backend: Box<dyn ModelBackend>,
    min_score: f32,
}

impl ExternalModelClassifier {
    pub fn new(backend: Box<dyn ModelBackend>, min_score: f32) -> Self {
        Self { backend, min_score }
    }
}

impl GestureClassifier for ExternalModelClassifier {
    fn classify(&self, hand: &LandmarkSet) -> ClassificationResult {
        let Some(extended) = count_extended(hand) else {
            return ClassificationResult::unknown();
        };

        let scores = match self.backend.scores(hand) {
            Ok(scores) => scores,
            Err(err) => {
                tracing::warn!("Model backend failed: {:#}", err);
                return ClassificationResult::unknown();
            }
        };

        let (gesture, score) = scores.best();
        if !score.is_finite() {
            return ClassificationResult::new(Gesture::Unknown, 0.0, extended);
        }
        let confidence = score.clamp(0.0, 1.0);
        if score < self.min_score {
            return ClassificationResult::new(Gesture::Unknown, confidence, extended);
        }
        ClassificationResult::new(gesture, confidence, extended)
    }
}

// ============================================================================
// CONFIGURED CLASSIFIER
// ============================================================================

/// Strategy selector carried in settings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierKind {
    #[default]
    Geometric,
    ExternalModel,
}

/// Classifier chosen by configuration
pub enum Classifier {
    Geometric(GeometricClassifier),
    ExternalModel(ExternalModelClassifier),
}

impl Classifier {
    /// Build the configured strategy.
    ///
    /// The external model variant needs a backend; without one this fails.
    pub fn from_settings(
        settings: &ClassifierSettings,
        backend: Option<Box<dyn ModelBackend>>,
    ) -> anyhow::Result<Self> {
        match settings.kind {
            ClassifierKind::Geometric => Ok(Classifier::Geometric(GeometricClassifier::new(
                settings.banding,
            ))),
            ClassifierKind::ExternalModel => {
                let backend = backend.ok_or_else(|| {
                    anyhow::anyhow!("External model classifier selected but no model backend was provided")
                })?;
                Ok(Classifier::ExternalModel(ExternalModelClassifier::new(
                    backend,
                    settings.model_min_score,
                )))
            }
        }
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            Classifier::Geometric(_) => ClassifierKind::Geometric,
            Classifier::ExternalModel(_) => ClassifierKind::ExternalModel,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier::Geometric(GeometricClassifier::default())
    }
}

impl GestureClassifier for Classifier {
    fn classify(&self, hand: &LandmarkSet) -> ClassificationResult {
        match self {
            Classifier::Geometric(c) => c.classify(hand),
            Classifier::ExternalModel(c) => c.classify(hand),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Point, LANDMARK_COUNT};

    /// Upright hand with the given digits (thumb first) extended
    fn hand(digits: [bool; 5]) -> LandmarkSet {
        let mut points = vec![Point::new(0.5, 0.7); LANDMARK_COUNT];
        points[WRIST] = Point::new(0.5, 0.9);

        points[pip_of(THUMB_TIP)] = Point::new(0.4, 0.7);
        points[THUMB_TIP] = if digits[0] {
            Point::new(0.25, 0.6)
        } else {
            Point::new(0.45, 0.7)
        };

        for (i, &tip) in FINGER_TIPS.iter().enumerate() {
            let x = 0.45 + 0.05 * i as f32;
            points[pip_of(tip)] = Point::new(x, 0.5);
            points[tip] = if digits[i + 1] {
                Point::new(x, 0.3)
            } else {
                Point::new(x, 0.6)
            };
        }
        LandmarkSet::new(points)
    }

    fn hand_with(count: usize) -> LandmarkSet {
        let mut digits = [false; 5];
        digits.iter_mut().take(count).for_each(|d| *d = true);
        hand(digits)
    }

    #[test]
    fn test_count_extended() {
        for count in 0..=5 {
            assert_eq!(count_extended(&hand_with(count)), Some(count as u8));
        }
        assert_eq!(
            extended_digits(&hand([false, true, true, false, false])),
            Some([false, true, true, false, false])
        );
    }

    #[test]
    fn test_thumb_ratio() {
        // Thumb pip sits 0.1 from the wrist, so the tip must clear 0.15
        let mut points = hand([false; 5]).points().to_vec();
        points[THUMB_TIP] = Point::new(0.36, 0.7);
        assert_eq!(count_extended(&LandmarkSet::new(points.clone())), Some(0));

        points[THUMB_TIP] = Point::new(0.34, 0.7);
        assert_eq!(count_extended(&LandmarkSet::new(points.clone())), Some(1));

        // Either side of the wrist counts
        points[THUMB_TIP] = Point::new(0.66, 0.7);
        assert_eq!(count_extended(&LandmarkSet::new(points)), Some(1));
    }

    #[test]
    fn test_range_banding() {
        let classifier = GeometricClassifier::default();
        let expected = [
            (Gesture::Rock, 0.90),
            (Gesture::Rock, 0.90),
            (Gesture::Scissors, 0.85),
            (Gesture::Scissors, 0.85),
            (Gesture::Paper, 0.90),
            (Gesture::Paper, 0.90),
        ];
        for (count, (gesture, confidence)) in expected.into_iter().enumerate() {
            let result = classifier.classify(&hand_with(count));
            assert_eq!(result.gesture, gesture, "count {}", count);
            assert_eq!(result.confidence, confidence);
            assert_eq!(result.extended_fingers, count as u8);
        }
    }

    #[test]
    fn test_exact_banding() {
        let classifier = GeometricClassifier::new(BandingPolicy::ExactMatch);
        let gestures: Vec<_> = (0..=5)
            .map(|c| classifier.classify(&hand_with(c)).gesture)
            .collect();
        assert_eq!(
            gestures,
            vec![
                Gesture::Rock,
                Gesture::Unknown,
                Gesture::Scissors,
                Gesture::Unknown,
                Gesture::Unknown,
                Gesture::Paper,
            ]
        );
        assert_eq!(classifier.classify(&hand_with(3)).confidence, 0.50);
    }

    #[test]
    fn test_malformed_is_unknown() {
        let classifier = GeometricClassifier::default();
        let short = LandmarkSet::new(vec![Point::new(0.5, 0.5); 20]);
        assert_eq!(classifier.classify(&short), ClassificationResult::unknown());
        assert_eq!(classifier.classify(&LandmarkSet::default()), ClassificationResult::unknown());

        let mut points = hand_with(5).points().to_vec();
        points[12].y = f32::INFINITY;
        assert_eq!(
            classifier.classify(&LandmarkSet::new(points)),
            ClassificationResult::unknown()
        );
    }

    struct FixedModel(anyhow::Result<GestureScores>);

    impl ModelBackend for FixedModel {
        fn scores(&self, _hand: &LandmarkSet) -> anyhow::Result<GestureScores> {
            match &self.0 {
                Ok(s) => Ok(*s),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    #[test]
    fn test_external_model() {
        let scores = GestureScores { rock: 0.1, paper: 0.2, scissors: 0.7 };
        let classifier = ExternalModelClassifier::new(Box::new(FixedModel(Ok(scores))), 0.5);
        let result = classifier.classify(&hand_with(5));
        assert_eq!(result.gesture, Gesture::Scissors);
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.extended_fingers, 5);

        let weak = GestureScores { rock: 0.3, paper: 0.3, scissors: 0.4 };
        let classifier = ExternalModelClassifier::new(Box::new(FixedModel(Ok(weak))), 0.5);
        assert_eq!(classifier.classify(&hand_with(0)).gesture, Gesture::Unknown);

        let failing = ExternalModelClassifier::new(
            Box::new(FixedModel(Err(anyhow::anyhow!("no model")))),
            0.5,
        );
        assert_eq!(failing.classify(&hand_with(0)), ClassificationResult::unknown());
        assert_eq!(
            ExternalModelClassifier::new(Box::new(FixedModel(Ok(scores))), 0.5)
                .classify(&LandmarkSet::default()),
            ClassificationResult::unknown()
        );
    }

    #[test]
    fn test_classifier_from_settings() {
        let settings = ClassifierSettings::default();
        let classifier = Classifier::from_settings(&settings, None).unwrap();
        assert_eq!(classifier.kind(), ClassifierKind::Geometric);
        assert_eq!(classifier.classify(&hand_with(0)).gesture, Gesture::Rock);

        let model_settings = ClassifierSettings {
            kind: ClassifierKind::ExternalModel,
            ..Default::default()
        };
        assert!(Classifier::from_settings(&model_settings, None).is_err());

        let scores = GestureScores { rock: 0.9, paper: 0.05, scissors: 0.05 };
        let classifier =
            Classifier::from_settings(&model_settings, Some(Box::new(FixedModel(Ok(scores))))).unwrap();
        assert_eq!(classifier.kind(), ClassifierKind::ExternalModel);
        assert_eq!(classifier.classify(&hand_with(5)).gesture, Gesture::Rock);
    }
}
