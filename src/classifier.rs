use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("failed to decode image: {0}")]
    ImageDecode(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Binary verdict of the weld inspection model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    Ng,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Ok => "OK",
            Verdict::Ng => "NG",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Prediction {
    pub verdict: Verdict,
    /// Certainty in the chosen verdict, in percent.
    pub confidence: f32,
}

impl Prediction {
    /// Interprets the model's raw sigmoid score. Strictly above 0.5 is OK;
    /// the confidence always reports certainty in the chosen verdict.
    pub fn from_score(score: f32) -> Self {
        if score > 0.5 {
            Self {
                verdict: Verdict::Ok,
                confidence: score * 100.0,
            }
        } else {
            Self {
                verdict: Verdict::Ng,
                confidence: (1.0 - score) * 100.0,
            }
        }
    }
}

pub trait Classifier: Send + Sync {
    fn classify(&self, image_data: &[u8]) -> Result<Prediction, ClassifierError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_above_threshold_is_ok() {
        let prediction = Prediction::from_score(0.87);

        assert_eq!(prediction.verdict, Verdict::Ok);
        assert!((prediction.confidence - 87.0).abs() < 1e-4);
    }

    #[test]
    fn score_below_threshold_is_ng_with_inverted_confidence() {
        let prediction = Prediction::from_score(0.2);

        assert_eq!(prediction.verdict, Verdict::Ng);
        assert!((prediction.confidence - 80.0).abs() < 1e-4);
    }

    #[test]
    fn exact_threshold_is_ng() {
        let prediction = Prediction::from_score(0.5);

        assert_eq!(prediction.verdict, Verdict::Ng);
        assert!((prediction.confidence - 50.0).abs() < 1e-4);
    }

    #[test]
    fn just_above_threshold_is_ok() {
        let prediction = Prediction::from_score(0.5000001);

        assert_eq!(prediction.verdict, Verdict::Ok);
    }
}
