use steth_core::error::PipelineError;
use steth_core::frame::{Category, ClassificationResult, RiskTier};

/// Numerically stable softmax: the row maximum is subtracted before exponentiating.
///
/// # Example
/// ```
/// use steth_classify::postprocess::softmax;
/// let p = softmax(&[1000.0, 1000.0]);
/// assert!((p[0] - 0.5).abs() < 1e-6);
/// assert!(softmax(&[]).is_empty());
/// ```
#[must_use]
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; the first one wins ties. `None` when empty.
#[must_use]
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Raw scores → softmax → argmax → labeled result with confidence and risk tier.
///
/// # Errors
/// `PipelineError::Model` if the score vector length differs from the category's
/// label count or contains non-finite values.
///
/// # Example
/// ```
/// use steth_classify::postprocess::classify_scores;
/// use steth_core::frame::{Category, RiskTier};
/// let result = classify_scores(&[0.1, 4.0, 0.2], Category::Infectious).unwrap();
/// assert_eq!(result.label, "Pneumonia");
/// assert_eq!(result.risk_tier, RiskTier::High);
/// ```
pub fn classify_scores(
    scores: &[f32],
    category: Category,
) -> Result<ClassificationResult, PipelineError> {
    let labels = category.labels();
    if scores.len() != labels.len() {
        return Err(PipelineError::Model(format!(
            "{} scores reçus, {} attendus",
            scores.len(),
            labels.len()
        )));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(PipelineError::Model("scores non finis".into()));
    }

    let probs = softmax(scores);
    let Some(best) = argmax(&probs) else {
        return Err(PipelineError::Model("vecteur de scores vide".into()));
    };
    let confidence = probs[best];
    let label = labels[best];

    Ok(ClassificationResult {
        label: label.to_string(),
        category,
        probabilities: labels
            .iter()
            .zip(&probs)
            .map(|(l, &p)| ((*l).to_string(), p))
            .collect(),
        confidence,
        risk_tier: RiskTier::from_prediction(label == category.normal_label(), confidence),
        synthetic: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        for scores in [
            vec![0.0f32, 0.0, 0.0],
            vec![1.0, 2.0, 3.0],
            vec![-50.0, 0.5, 80.0],
            vec![1e4, -1e4, 3.0],
        ] {
            let p = softmax(&scores);
            let sum: f32 = p.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6, "{scores:?} -> {sum}");
            assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn confidence_is_the_max_probability() -> Result<(), PipelineError> {
        let result = classify_scores(&[0.3, -1.0, 2.2], Category::Obstructive)?;
        let max = result
            .probabilities
            .iter()
            .map(|(_, p)| *p)
            .fold(f32::NEG_INFINITY, f32::max);
        assert!((result.confidence - max).abs() < f32::EPSILON);
        assert_eq!(result.label, "Asthma");
        Ok(())
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn normal_label_tier() -> Result<(), PipelineError> {
        let confident = classify_scores(&[5.0, 0.0, 0.0], Category::Infectious)?;
        assert_eq!(confident.label, "Normal");
        assert_eq!(confident.risk_tier, RiskTier::Low);

        let hesitant = classify_scores(&[0.5, 0.0, 0.0], Category::Infectious)?;
        assert_eq!(hesitant.label, "Normal");
        assert_eq!(hesitant.risk_tier, RiskTier::Medium);
        Ok(())
    }

    #[test]
    fn wrong_class_count_is_a_model_error() {
        assert!(matches!(
            classify_scores(&[1.0, 2.0], Category::Infectious),
            Err(PipelineError::Model(_))
        ));
    }

    #[test]
    fn nan_scores_are_rejected() {
        assert!(classify_scores(&[f32::NAN, 0.0, 0.0], Category::Infectious).is_err());
    }
}
