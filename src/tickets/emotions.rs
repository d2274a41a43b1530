//! Emotion distributions returned by the analysis service
//!
//! Weights are relative proportions with no fixed unit. They are kept
//! non-negative and finite; anything else is rejected on the way in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct EmotionDistribution {
    weights: BTreeMap<String, f64>,
}

impl EmotionDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a distribution, skipping weights that are negative or not finite
    pub fn from_weights<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut distribution = Self::new();
        for (label, weight) in weights {
            distribution.insert(label, weight);
        }
        distribution
    }

    /// Insert a weight. Returns false if the weight was rejected.
    pub fn insert(&mut self, label: impl Into<String>, weight: f64) -> bool {
        if !is_valid_weight(weight) {
            return false;
        }
        self.weights.insert(label.into(), weight);
        true
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.weights.get(label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(label, weight)| (label.as_str(), *weight))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Label with the greatest weight; ties go to the first label in order
    pub fn dominant(&self) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for (label, weight) in self.iter() {
            match best {
                Some((_, best_weight)) if weight <= best_weight => {}
                _ => best = Some((label, weight)),
            }
        }
        best.map(|(label, _)| label)
    }

    /// Weights scaled to sum to 100. A zero total maps every label to 0.
    pub fn percentages(&self) -> BTreeMap<String, f64> {
        let total = self.total();
        self.weights
            .iter()
            .map(|(label, weight)| {
                let pct = if total > 0.0 { weight / total * 100.0 } else { 0.0 };
                (label.clone(), pct)
            })
            .collect()
    }
}

fn is_valid_weight(weight: f64) -> bool {
    weight.is_finite() && weight >= 0.0
}

impl TryFrom<BTreeMap<String, f64>> for EmotionDistribution {
    type Error = String;

    fn try_from(weights: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        if let Some((label, weight)) = weights.iter().find(|(_, w)| !is_valid_weight(**w)) {
            return Err(format!("invalid weight {} for emotion {}", weight, label));
        }
        Ok(Self { weights })
    }
}

impl From<EmotionDistribution> for BTreeMap<String, f64> {
    fn from(distribution: EmotionDistribution) -> Self {
        distribution.weights
    }
}
