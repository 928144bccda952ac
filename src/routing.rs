//! Confidence-band topic routing.
//!
//! Bands are open intervals and deliberately leave gaps: `0.4`, `0.5`, `0.8`
//! and everything in `[0.5, 0.6]` route nowhere.

pub const TOPIC_UNKNOWN: &str = "images/captured/unknown_classification";
pub const TOPIC_MAYBE_KNOWN: &str = "images/captured/partially/maybe_known";
pub const TOPIC_ALMOST_SURE: &str = "images/captures/almost_sure";
pub const TOPIC_RECOGNIZED: &str = "images/captured/recognized";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    UnknownClassification,
    MaybeKnown,
    AlmostSure,
    Recognized,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::UnknownClassification,
        Topic::MaybeKnown,
        Topic::AlmostSure,
        Topic::Recognized,
    ];

    pub fn for_confidence(confidence: f32) -> Option<Topic> {
        if confidence < 0.4 {
            Some(Topic::UnknownClassification)
        } else if 0.4 < confidence && confidence < 0.5 {
            Some(Topic::MaybeKnown)
        } else if 0.6 < confidence && confidence < 0.8 {
            Some(Topic::AlmostSure)
        } else if confidence > 0.8 {
            Some(Topic::Recognized)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::UnknownClassification => TOPIC_UNKNOWN,
            Topic::MaybeKnown => TOPIC_MAYBE_KNOWN,
            Topic::AlmostSure => TOPIC_ALMOST_SURE,
            Topic::Recognized => TOPIC_RECOGNIZED,
        }
    }

    /// Unrecognized captures are also echoed to stdout.
    pub fn echo_to_stdout(&self) -> bool {
        matches!(self, Topic::UnknownClassification)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_route_to_expected_topics() {
        assert_eq!(Topic::for_confidence(0.0), Some(Topic::UnknownClassification));
        assert_eq!(Topic::for_confidence(0.35), Some(Topic::UnknownClassification));
        assert_eq!(Topic::for_confidence(0.45), Some(Topic::MaybeKnown));
        assert_eq!(Topic::for_confidence(0.7), Some(Topic::AlmostSure));
        assert_eq!(Topic::for_confidence(0.9), Some(Topic::Recognized));
        assert_eq!(Topic::for_confidence(1.0), Some(Topic::Recognized));
    }

    #[test]
    fn boundaries_and_gap_route_nowhere() {
        for c in [0.4_f32, 0.5, 0.55, 0.6, 0.8] {
            assert_eq!(Topic::for_confidence(c), None, "confidence {c}");
        }
        let mut c = 0.5_f32;
        while c <= 0.6 {
            assert_eq!(Topic::for_confidence(c), None, "confidence {c}");
            c += 0.01;
        }
    }

    #[test]
    fn nan_routes_nowhere() {
        assert_eq!(Topic::for_confidence(f32::NAN), None);
    }

    #[test]
    fn at_most_one_band_matches() {
        for step in 0..=1000 {
            let c = step as f32 / 1000.0;
            let matches = [
                c < 0.4,
                0.4 < c && c < 0.5,
                0.6 < c && c < 0.8,
                c > 0.8,
            ]
            .iter()
            .filter(|m| **m)
            .count();
            assert!(matches <= 1);
            assert_eq!(Topic::for_confidence(c).is_some(), matches == 1);
        }
    }

    #[test]
    fn topic_strings_are_exact() {
        assert_eq!(
            Topic::UnknownClassification.as_str(),
            "images/captured/unknown_classification"
        );
        assert_eq!(Topic::MaybeKnown.as_str(), "images/captured/partially/maybe_known");
        assert_eq!(Topic::AlmostSure.as_str(), "images/captures/almost_sure");
        assert_eq!(Topic::Recognized.as_str(), "images/captured/recognized");
        assert!(Topic::ALL.iter().filter(|t| t.echo_to_stdout()).count() == 1);
    }
}
