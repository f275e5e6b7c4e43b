use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Number of entries in every feature vector.
pub const FEATURE_WIDTH: usize = 20;

/// Number of classes in every label.
pub const LABEL_WIDTH: usize = 3;

/// Fixed-width model input. Entries are finite and within [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_WIDTH]);

impl FeatureVector {
    /// Build from raw values, mapping NaN/∞ to 0 and clamping to [-1, 1].
    pub fn sanitized(values: [f64; FEATURE_WIDTH]) -> Self {
        Self(values.map(|v| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 }))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn values(&self) -> &[f64; FEATURE_WIDTH] {
        &self.0
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = ValidationError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        let actual = values.len();
        let array: [f64; FEATURE_WIDTH] =
            values
                .try_into()
                .map_err(|_| ValidationError::ShapeMismatch {
                    what: "feature width",
                    expected: FEATURE_WIDTH,
                    actual,
                })?;
        Ok(Self::sanitized(array))
    }
}

/// Trade direction classes, in one-hot column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalClass {
    Buy,
    Sell,
    Hold,
}

impl SignalClass {
    /// Return threshold separating buy/sell from hold (0.1%).
    pub const THRESHOLD: f64 = 0.001;

    /// Classify a next-step return. Hold wins when |change| <= threshold.
    pub fn from_return(change: f64) -> Self {
        if change > Self::THRESHOLD {
            SignalClass::Buy
        } else if change < -Self::THRESHOLD {
            SignalClass::Sell
        } else {
            SignalClass::Hold
        }
    }

    pub fn index(&self) -> usize {
        match self {
            SignalClass::Buy => 0,
            SignalClass::Sell => 1,
            SignalClass::Hold => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(SignalClass::Buy),
            1 => Some(SignalClass::Sell),
            2 => Some(SignalClass::Hold),
            _ => None,
        }
    }
}

/// One-hot training label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Label([f64; LABEL_WIDTH]);

impl Label {
    pub fn new(class: SignalClass) -> Self {
        let mut one_hot = [0.0; LABEL_WIDTH];
        one_hot[class.index()] = 1.0;
        Self(one_hot)
    }

    pub fn class(&self) -> SignalClass {
        let index = self.0.iter().position(|&v| v == 1.0).unwrap_or(2);
        SignalClass::from_index(index).unwrap_or(SignalClass::Hold)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl TryFrom<Vec<f64>> for Label {
    type Error = ValidationError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        let actual = values.len();
        let array: [f64; LABEL_WIDTH] =
            values
                .try_into()
                .map_err(|_| ValidationError::ShapeMismatch {
                    what: "label width",
                    expected: LABEL_WIDTH,
                    actual,
                })?;
        let ones = array.iter().filter(|&&v| v == 1.0).count();
        let zeros = array.iter().filter(|&&v| v == 0.0).count();
        if ones != 1 || zeros != LABEL_WIDTH - 1 {
            return Err(ValidationError::ShapeMismatch {
                what: "one-hot entries",
                expected: 1,
                actual: ones,
            });
        }
        Ok(Self(array))
    }
}

/// Paired feature and label rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingData {
    features: Vec<FeatureVector>,
    labels: Vec<Label>,
}

impl TrainingData {
    /// Pair features with labels. Row counts must match and be non-zero.
    pub fn new(features: Vec<FeatureVector>, labels: Vec<Label>) -> Result<Self, ValidationError> {
        if features.len() != labels.len() {
            return Err(ValidationError::ShapeMismatch {
                what: "label rows",
                expected: features.len(),
                actual: labels.len(),
            });
        }
        if features.is_empty() {
            return Err(ValidationError::ShapeMismatch {
                what: "feature rows",
                expected: 1,
                actual: 0,
            });
        }
        Ok(Self { features, labels })
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// (rows, feature width, label width)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.features.len(), FEATURE_WIDTH, LABEL_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_rejects_wrong_width() {
        let err = FeatureVector::try_from(vec![0.0; 19]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ShapeMismatch {
                what: "feature width",
                expected: 20,
                actual: 19
            }
        );
    }

    #[test]
    fn test_feature_vector_sanitizes() {
        let mut raw = vec![0.25; FEATURE_WIDTH];
        raw[0] = f64::NAN;
        raw[1] = f64::INFINITY;
        raw[2] = 3.0;
        raw[3] = -7.5;
        let fv = FeatureVector::try_from(raw).unwrap();
        assert_eq!(fv.values()[0], 0.0);
        assert_eq!(fv.values()[1], 0.0);
        assert_eq!(fv.values()[2], 1.0);
        assert_eq!(fv.values()[3], -1.0);
        assert_eq!(fv.values()[4], 0.25);
    }

    #[test]
    fn test_label_threshold_boundaries() {
        assert_eq!(SignalClass::from_return(0.0011), SignalClass::Buy);
        assert_eq!(SignalClass::from_return(-0.0011), SignalClass::Sell);
        assert_eq!(SignalClass::from_return(0.001), SignalClass::Hold);
        assert_eq!(SignalClass::from_return(-0.001), SignalClass::Hold);
    }

    #[test]
    fn test_label_one_hot() {
        let label = Label::new(SignalClass::Sell);
        assert_eq!(label.as_slice(), &[0.0, 1.0, 0.0]);
        assert_eq!(label.class(), SignalClass::Sell);
        assert!(Label::try_from(vec![1.0, 1.0, 0.0]).is_err());
        assert!(Label::try_from(vec![1.0, 0.0]).is_err());
    }

    #[test]
    fn test_training_data_rejects_row_mismatch() {
        let features = vec![FeatureVector::sanitized([0.5; FEATURE_WIDTH]); 3];
        let labels = vec![Label::new(SignalClass::Hold); 2];
        assert!(matches!(
            TrainingData::new(features, labels),
            Err(ValidationError::ShapeMismatch { what: "label rows", .. })
        ));
    }
}
