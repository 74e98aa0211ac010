use steth_core::frame::{DiagnosisResult, SensorReading, SignalType, Status};

use crate::confidence::estimate_confidence;
use crate::recommendation::recommendation;

/// Lowest and highest risk the engine reports.
pub const RISK_MIN: u8 = 1;
pub const RISK_MAX: u8 = 98;

/// Regime output before clamping.
struct Assessment {
    label: &'static str,
    risk: f32,
}

/// Score a reading: pick the channel, the frequency regime, then apply RMS.
///
/// Pure and total: any input, however extreme or non-finite, yields a result with
/// risk in [1, 98]. Implausible readings lower the confidence instead of failing.
///
/// # Example
/// ```
/// use steth_core::frame::{SensorReading, Status};
/// use steth_risk::evaluate;
/// let reading = SensorReading { frequency: 250.0, lung_rms: 0.025, lung_detected: true, ..Default::default() };
/// let result = evaluate(&reading);
/// assert_eq!(result.diagnosis, "Pneumonia");
/// assert_eq!(result.status, Status::HighRisk);
/// ```
#[must_use]
pub fn evaluate(reading: &SensorReading) -> DiagnosisResult {
    let frequency = sanitize(reading.frequency);
    let rms = sanitize(reading.channel_rms());
    let channel = reading.channel();

    let assessment = match channel {
        SignalType::Lung => assess_lung(frequency, rms),
        SignalType::Heart => assess_heart(frequency, rms),
    };

    let risk = clamp_risk(assessment.risk);
    log::debug!(
        "{} channel f={frequency:.1} rms={rms:.4} -> {} ({risk}%)",
        channel.as_str(),
        assessment.label
    );

    DiagnosisResult {
        diagnosis: assessment.label.to_string(),
        risk_percentage: risk,
        signal_type: channel,
        frequency_used: frequency,
        status: Status::from_risk(risk),
        confidence: estimate_confidence(risk, rms, frequency),
        recommendation: recommendation(risk).to_string(),
    }
}

/// Average streamed samples, then [`evaluate`]. Empty series count as 0.
///
/// # Example
/// ```
/// use steth_risk::evaluate_series;
/// let result = evaluate_series(&[70.0, 80.0], &[0.01, 0.02], &[], true, false);
/// assert_eq!(result.diagnosis, "Normal");
/// assert!((result.frequency_used - 75.0).abs() < f32::EPSILON);
/// ```
#[must_use]
pub fn evaluate_series(
    frequencies: &[f32],
    heart_rms: &[f32],
    lung_rms: &[f32],
    heart_detected: bool,
    lung_detected: bool,
) -> DiagnosisResult {
    evaluate(&SensorReading {
        frequency: mean(frequencies),
        heart_rms: mean(heart_rms),
        lung_rms: mean(lung_rms),
        heart_detected,
        lung_detected,
    })
}

fn mean(values: &[f32]) -> f32 {
    let finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    finite.iter().sum::<f32>() / finite.len() as f32
}

/// Negative and non-finite readings count as "unavailable" (0).
fn sanitize(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// `clamp(round(risk), 1, 98)`.
fn clamp_risk(risk: f32) -> u8 {
    if risk.is_nan() {
        return RISK_MIN;
    }
    risk.round().clamp(f32::from(RISK_MIN), f32::from(RISK_MAX)) as u8
}

fn assess_lung(f: f32, r: f32) -> Assessment {
    let base = if f == 0.0 {
        if r < 0.01 {
            Assessment { label: "Normal", risk: 3.0 + 200.0 * r }
        } else if r > 0.05 {
            Assessment { label: "COPD", risk: 70.0 + 300.0 * r }
        } else {
            Assessment { label: "Asthma", risk: 35.0 + 200.0 * r }
        }
    } else if f < 150.0 {
        if r < 0.01 {
            Assessment { label: "Normal", risk: 2.0 + f / 50.0 + 100.0 * r }
        } else {
            Assessment {
                label: "Mild Respiratory Abnormality",
                risk: 25.0 + f / 10.0 + 300.0 * r,
            }
        }
    } else if f < 200.0 {
        Assessment {
            label: if r > 0.03 { "Respiratory Concern" } else { "Borderline Normal" },
            risk: 8.0 + (f - 150.0) / 10.0 + 400.0 * r,
        }
    } else if f <= 400.0 {
        Assessment {
            label: if f >= 300.0 && r > 0.04 { "Severe Pneumonia" } else { "Pneumonia" },
            risk: 60.0 + ((f - 200.0) / 200.0) * 30.0 + 500.0 * r,
        }
    } else {
        let severity = ((f - 400.0) / 100.0).min(2.0);
        Assessment {
            label: if severity > 1.0 { "Advanced Tuberculosis" } else { "Tuberculosis" },
            risk: 80.0 + severity * 10.0 + 600.0 * r,
        }
    };

    // Loud wheeze-band energy overrides the frequency regime.
    if r > 0.06 {
        return Assessment {
            label: if r > 0.08 { "Severe COPD" } else { "COPD" },
            risk: 75.0 + 400.0 * r,
        };
    }
    base
}

fn assess_heart(f: f32, r: f32) -> Assessment {
    let base = if f == 0.0 {
        if r < 0.03 {
            Assessment { label: "Normal", risk: 2.0 + 200.0 * r }
        } else if r < 0.08 {
            Assessment { label: "Heart Irregularity", risk: 15.0 + 400.0 * r }
        } else {
            Assessment { label: "Heart Abnormality", risk: 70.0 + 350.0 * r }
        }
    } else if !(20.0..=250.0).contains(&f) {
        Assessment { label: "Critical Heart Condition", risk: 80.0 + 500.0 * r }
    } else if f < 60.0 {
        Assessment {
            label: if f <= 45.0 { "Severe Bradycardia" } else { "Bradycardia" },
            risk: 15.0 + (60.0 - f) / 2.0 + 500.0 * r,
        }
    } else if f <= 100.0 {
        if r < 0.03 {
            Assessment { label: "Normal", risk: 1.0 + (100.0 - f) / 20.0 + 150.0 * r }
        } else if r < 0.06 {
            Assessment { label: "Mild Heart Concern", risk: 12.0 + 300.0 * r }
        } else {
            Assessment { label: "Heart Rhythm Abnormality", risk: 35.0 + 400.0 * r }
        }
    } else if f <= 150.0 {
        Assessment {
            label: if f > 130.0 { "Tachycardia" } else { "Elevated Heart Rate" },
            risk: 10.0 + (f - 100.0) / 5.0 + 400.0 * r,
        }
    } else {
        Assessment {
            label: if f > 200.0 { "Critical Heart Abnormality" } else { "Severe Tachycardia" },
            risk: 45.0 + (f - 150.0) / 10.0 + 600.0 * r,
        }
    };

    if r > 0.10 {
        return Assessment {
            label: "Severe Heart Abnormality",
            risk: base.risk.max(70.0 + 400.0 * r),
        };
    }
    base
}
