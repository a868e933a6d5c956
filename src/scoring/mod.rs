//! Composite risk scoring.
//!
//! Combines the scanner's CVSS base score, the EPSS exploitation
//! probability, and KEV membership into one 0-100 score. CVSS measures how
//! bad exploitation would be, EPSS how likely it is, KEV whether it is
//! already happening; the weighting favors the two threat signals over raw
//! severity.

use serde::Serialize;
use std::fmt;

/// Relative weights of the three signals. Must sum to 1.0 for the score to
/// span 0-100.
#[derive(Debug, Clone, Copy)]
pub struct RiskWeights {
    pub cvss: f64,
    pub epss: f64,
    pub kev: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            cvss: 0.4,
            epss: 0.4,
            kev: 0.2,
        }
    }
}

/// Risk bands, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
    Minimal,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Minimal => "MINIMAL",
        };
        f.write_str(name)
    }
}

/// Compute the composite risk score.
///
/// Missing signals contribute zero rather than disqualifying the CVE: a
/// finding without an EPSS score still ranks on severity and KEV status,
/// and coverage gaps are reported separately.
#[must_use]
pub fn risk_score(
    cvss: Option<f64>,
    epss: Option<f64>,
    kev_listed: bool,
    weights: RiskWeights,
) -> f64 {
    let cvss_component = cvss.map_or(0.0, |v| (v / 10.0).clamp(0.0, 1.0));
    let epss_component = epss.map_or(0.0, |v| v.clamp(0.0, 1.0));
    let kev_component = if kev_listed { 1.0 } else { 0.0 };

    let score = weights.cvss * cvss_component
        + weights.epss * epss_component
        + weights.kev * kev_component;
    (score * 100.0).clamp(0.0, 100.0)
}

/// Map a composite score to its risk band.
#[must_use]
pub fn risk_level(score: f64) -> RiskLevel {
    if score >= 75.0 {
        RiskLevel::Critical
    } else if score >= 50.0 {
        RiskLevel::High
    } else if score >= 25.0 {
        RiskLevel::Medium
    } else if score >= 10.0 {
        RiskLevel::Low
    } else {
        RiskLevel::Minimal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_signals_hit_ceiling() {
        let score = risk_score(Some(10.0), Some(1.0), true, RiskWeights::default());
        assert!((score - 100.0).abs() < 1e-9);
        assert_eq!(risk_level(score), RiskLevel::Critical);
    }

    #[test]
    fn test_kev_listing_outranks_unexploited_critical() {
        // A medium-severity CVE that is actively exploited should land in a
        // higher band than a critical-severity CVE nobody exploits.
        let exploited = risk_score(Some(6.5), Some(0.9), true, RiskWeights::default());
        let dormant = risk_score(Some(9.8), Some(0.01), false, RiskWeights::default());
        assert!(exploited > dormant);
    }

    #[test]
    fn test_missing_signals_contribute_zero() {
        let score = risk_score(None, None, false, RiskWeights::default());
        assert_eq!(score, 0.0);
        assert_eq!(risk_level(score), RiskLevel::Minimal);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let score = risk_score(Some(42.0), Some(3.0), true, RiskWeights::default());
        assert!(score <= 100.0);
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(risk_level(75.0), RiskLevel::Critical);
        assert_eq!(risk_level(74.999), RiskLevel::High);
        assert_eq!(risk_level(50.0), RiskLevel::High);
        assert_eq!(risk_level(25.0), RiskLevel::Medium);
        assert_eq!(risk_level(10.0), RiskLevel::Low);
        assert_eq!(risk_level(9.999), RiskLevel::Minimal);
    }
}
