use crate::models::round2;
use std::fmt;

/// Slopes within this band either side of zero count as stable.
pub const TREND_THRESHOLD: f64 = 0.1;

/// Least-squares slope of cutoffs against their position in the series.
///
/// Positions are `0..n`, so a gap year still counts as one step.
pub fn trend_slope(cutoffs: &[f64]) -> f64 {
    let n = cutoffs.len();
    if n < 2 || cutoffs.iter().any(|v| !v.is_finite()) {
        return 0.0;
    }

    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = cutoffs.iter().sum::<f64>() / n as f64;

    let (covariance, variance) = cutoffs.iter().enumerate().fold((0.0, 0.0), |(cov, var), (i, y)| {
        let dx = i as f64 - mean_x;
        (cov + dx * (y - mean_y), var + dx * dx)
    });

    if variance == 0.0 {
        0.0
    } else {
        covariance / variance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Declining,
    Stable,
    Rising,
}

impl TrendDirection {
    pub fn from_slope(slope: f64) -> Self {
        if slope < -TREND_THRESHOLD {
            TrendDirection::Declining
        } else if slope > TREND_THRESHOLD {
            TrendDirection::Rising
        } else {
            TrendDirection::Stable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrendDirection::Declining => "Declining",
            TrendDirection::Stable => "Stable",
            TrendDirection::Rising => "Rising",
        }
    }
}

/// Change of the latest cutoff against the year before; `None` for entities new this year.
pub fn year_on_year(last: f64, previous: Option<f64>) -> Option<f64> {
    previous.map(|previous| round2(last - previous))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSummary {
    pub slope: f64,
    pub direction: TrendDirection,
    pub year_on_year: Option<f64>,
}

impl TrendSummary {
    pub fn new(cutoffs: &[f64], last: f64, previous: Option<f64>) -> Self {
        let slope = trend_slope(cutoffs);
        Self {
            slope,
            direction: TrendDirection::from_slope(slope),
            year_on_year: year_on_year(last, previous),
        }
    }

    pub fn is_declining(&self) -> bool {
        self.direction == TrendDirection::Declining
    }
}

impl fmt::Display for TrendSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year_on_year {
            Some(change) => write!(f, "{} ({:+.2})", self.direction.label(), change),
            None => write!(f, "{} (new)", self.direction.label()),
        }
    }
}
