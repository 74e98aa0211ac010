/// Bounds of the reported confidence.
pub const CONFIDENCE_MIN: f32 = 0.30;
pub const CONFIDENCE_MAX: f32 = 0.95;

/// Heuristic trust in a rule-based diagnosis, in [0.30, 0.95].
///
/// Starts at 0.5 and moves with how usable the reading looks: a measured
/// frequency inside the auscultation band, a signal above the noise floor,
/// and a risk far from the ambiguous middle all raise it. Implausible
/// readings (f > 1 kHz or RMS > 0.5) lower it.
///
/// # Example
/// ```
/// use steth_risk::estimate_confidence;
/// let c = estimate_confidence(80, 0.05, 250.0);
/// assert!((c - 0.95).abs() < 1e-6);
/// assert!((estimate_confidence(40, 0.0, 0.0) - 0.55).abs() < 1e-6);
/// ```
#[must_use]
pub fn estimate_confidence(risk_percentage: u8, rms: f32, frequency: f32) -> f32 {
    let mut confidence = 0.5f32;

    if frequency > 0.0 {
        confidence += 0.15;
    }
    if (50.0..=500.0).contains(&frequency) {
        confidence += 0.1;
    }

    if rms > 0.005 {
        confidence += 0.1;
    }
    if rms > 0.01 {
        confidence += 0.1;
    }
    if (0.03..=0.15).contains(&rms) {
        confidence += 0.1;
    }

    if risk_percentage <= 10 || risk_percentage >= 80 {
        confidence += 0.1;
    }
    if (20..=70).contains(&risk_percentage) {
        confidence += 0.05;
    }

    if frequency > 1000.0 || rms > 0.5 {
        confidence -= 0.2;
    }

    if confidence.is_nan() {
        return CONFIDENCE_MIN;
    }
    confidence.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}
