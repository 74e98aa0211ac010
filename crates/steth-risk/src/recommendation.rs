/// Clinical guidance stepped on the clamped risk percentage.
///
/// | risk     | advice                                 |
/// |----------|----------------------------------------|
/// | ≥ 85     | emergency care                         |
/// | 70..85   | urgent consultation (24 h)             |
/// | 50..70   | schedule an appointment within a week  |
/// | 30..50   | monitor and re-test                    |
/// | 15..30   | routine follow-up                      |
/// | < 15     | annual checkup                         |
///
/// # Example
/// ```
/// use steth_risk::recommendation;
/// assert!(recommendation(90).starts_with("URGENT"));
/// assert!(recommendation(3).contains("annual"));
/// ```
#[must_use]
pub fn recommendation(risk_percentage: u8) -> &'static str {
    match risk_percentage {
        85.. => "URGENT: Seek emergency medical care immediately.",
        70..=84 => "High risk detected. Consult a doctor within 24 hours.",
        50..=69 => "Elevated risk. Schedule a medical appointment within a week.",
        30..=49 => "Moderate findings. Monitor symptoms and repeat the test in a few days.",
        15..=29 => "Minor irregularities. Mention them at your next routine visit.",
        _ => "No significant findings. Continue regular annual checkups.",
    }
}
