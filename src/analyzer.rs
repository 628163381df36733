use crate::models::{round2, CutoffRecord};
use crate::normalizer::{entities, history, years};
use crate::scoring::StudentScores;
use crate::trend::{TrendSummary, TREND_THRESHOLD};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SafetyTier {
    HighSafety = 1,
    Safe = 2,
    AtRisk = 3,
    HighRisk = 4,
}

impl SafetyTier {
    /// Tiers that are listed in recommendations; high risk is only counted.
    pub const LISTED: [SafetyTier; 3] = [SafetyTier::HighSafety, SafetyTier::Safe, SafetyTier::AtRisk];

    pub fn classify(score: f64, last_cutoff: f64, slope: f64) -> Self {
        let is_higher = score >= last_cutoff;
        let is_declining = slope < -TREND_THRESHOLD;

        match (is_higher, is_declining) {
            (true, true) => SafetyTier::HighSafety,
            (true, false) => SafetyTier::Safe,
            (false, true) => SafetyTier::AtRisk,
            (false, false) => SafetyTier::HighRisk,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn title(&self) -> &'static str {
        match self {
            SafetyTier::HighSafety => "High safety",
            SafetyTier::Safe => "Safe",
            SafetyTier::AtRisk => "At risk",
            SafetyTier::HighRisk => "High risk",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SafetyTier::HighSafety => "High safety (your score is higher, cutoffs are declining)",
            SafetyTier::Safe => "Safe (your score is higher, cutoffs are rising or stable)",
            SafetyTier::AtRisk => "At risk (your score is lower, but cutoffs are declining)",
            SafetyTier::HighRisk => "High risk (your score is lower, cutoffs are rising or stable)",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AdviceError {
    #[error("no cutoff data available")]
    NoData,
    #[error("no schools match specialty subject '{0}'")]
    NoSpecialtyMatch(String),
    #[error("unable to compute recommendations")]
    NoRecommendations,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub entity: String,
    pub last_cutoff: f64,
    pub student_score: f64,
    pub difference: f64,
    pub trend: TrendSummary,
    pub tier: SafetyTier,
}

impl Recommendation {
    pub fn difference_label(&self) -> String {
        format!("{:+.2}", self.difference)
    }
}

#[derive(Debug, Clone)]
pub struct Recommendations {
    pub latest_year: String,
    pub high_safety: Vec<Recommendation>,
    pub safe: Vec<Recommendation>,
    pub at_risk: Vec<Recommendation>,
    pub high_risk_count: usize,
}

impl Recommendations {
    pub fn tier(&self, tier: SafetyTier) -> &[Recommendation] {
        match tier {
            SafetyTier::HighSafety => &self.high_safety,
            SafetyTier::Safe => &self.safe,
            SafetyTier::AtRisk => &self.at_risk,
            SafetyTier::HighRisk => &[],
        }
    }

    pub fn entities(&self, tier: SafetyTier) -> Vec<String> {
        self.tier(tier).iter().map(|r| r.entity.clone()).collect()
    }

    pub fn listed(&self) -> impl Iterator<Item = &Recommendation> {
        SafetyTier::LISTED.into_iter().flat_map(move |tier| self.tier(tier).iter())
    }
}

pub struct AdmissionAnalyzer<'a> {
    records: &'a [CutoffRecord],
    top_n: usize,
}

impl<'a> AdmissionAnalyzer<'a> {
    pub fn new(records: &'a [CutoffRecord], top_n: usize) -> Self {
        Self { records, top_n }
    }

    /// Classify every entity with a cutoff in the latest year and keep the
    /// top entries of each listed tier.
    pub fn recommend(&self, scores: &StudentScores) -> Result<Recommendations, AdviceError> {
        let all_years = years(self.records);
        let latest_year = all_years.last().cloned().ok_or(AdviceError::NoData)?;

        let evaluated = self.evaluate(scores)?;
        if evaluated.is_empty() {
            return Err(match &scores.specialty {
                Some(exam) => AdviceError::NoSpecialtyMatch(exam.subject.clone()),
                None => AdviceError::NoRecommendations,
            });
        }

        Ok(self.rank(latest_year, evaluated))
    }

    /// Every comparable entity with its tier, in dataset order.
    pub fn evaluate(&self, scores: &StudentScores) -> Result<Vec<Recommendation>, AdviceError> {
        let all_years = years(self.records);
        let latest_year = all_years.last().ok_or(AdviceError::NoData)?;
        let previous_year = all_years.len().checked_sub(2).map(|i| &all_years[i]);

        let mut results = Vec::new();
        for entity in entities(self.records) {
            let series = history(self.records, &entity);

            let latest = match series.iter().find(|r| &r.year == latest_year) {
                Some(record) => *record,
                None => continue,
            };

            let student_score = match scores.score_for(latest.specialty_subject()) {
                Some(score) => score,
                None => continue,
            };

            let previous = previous_year
                .and_then(|year| series.iter().find(|r| &r.year == year))
                .map(|r| r.cutoff);
            let cutoffs: Vec<f64> = series.iter().map(|r| r.cutoff).collect();
            let trend = TrendSummary::new(&cutoffs, latest.cutoff, previous);
            let tier = SafetyTier::classify(student_score, latest.cutoff, trend.slope);

            results.push(Recommendation {
                entity,
                last_cutoff: latest.cutoff,
                student_score,
                difference: round2(student_score - latest.cutoff),
                trend,
                tier,
            });
        }

        Ok(results)
    }

    fn rank(&self, latest_year: String, evaluated: Vec<Recommendation>) -> Recommendations {
        let top = |tier: SafetyTier| {
            let mut group: Vec<Recommendation> = evaluated.iter().filter(|r| r.tier == tier).cloned().collect();
            // Most competitive first
            group.sort_by(|a, b| b.last_cutoff.partial_cmp(&a.last_cutoff).unwrap_or(Ordering::Equal));
            group.truncate(self.top_n);
            group
        };

        Recommendations {
            high_safety: top(SafetyTier::HighSafety),
            safe: top(SafetyTier::Safe),
            at_risk: top(SafetyTier::AtRisk),
            high_risk_count: evaluated.iter().filter(|r| r.tier == SafetyTier::HighRisk).count(),
            latest_year,
        }
    }
}
