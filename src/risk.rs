//! Risk categorization and the categorized impact × likelihood matrix.
//!
//! The bucket functions are total: any integer lands in exactly one bucket.
//! Thresholds are evaluated top-down, so a score of 10 is Medium even though
//! the High band is described as starting at 10.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    /// Ranking order, most severe first.
    pub const ALL: [RiskLevel; 4] = [RiskLevel::VeryHigh, RiskLevel::High, RiskLevel::Medium, RiskLevel::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::VeryHigh => "Very High",
        }
    }

    /// Ranking-table wording for the band.
    pub fn band(&self) -> &'static str {
        match self {
            RiskLevel::VeryHigh => "Greater than 17",
            RiskLevel::High => "Greater than 10, but less than or equal to 17",
            RiskLevel::Medium => "Greater than 5, but less than 10",
            RiskLevel::Low => "Less than 5",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ImpactCategory {
    Insignificant,
    Moderate,
    Critical,
}

impl ImpactCategory {
    /// Matrix row order, most severe first.
    pub const ROWS: [ImpactCategory; 3] = [
        ImpactCategory::Critical,
        ImpactCategory::Moderate,
        ImpactCategory::Insignificant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactCategory::Insignificant => "Insignificant",
            ImpactCategory::Moderate => "Moderate",
            ImpactCategory::Critical => "Critical",
        }
    }
}

impl fmt::Display for ImpactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LikelihoodCategory {
    Unlikely,
    Potential,
    Likely,
}

impl LikelihoodCategory {
    pub const COLUMNS: [LikelihoodCategory; 3] = [
        LikelihoodCategory::Unlikely,
        LikelihoodCategory::Potential,
        LikelihoodCategory::Likely,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LikelihoodCategory::Unlikely => "Unlikely",
            LikelihoodCategory::Potential => "Potential",
            LikelihoodCategory::Likely => "Likely",
        }
    }
}

impl fmt::Display for LikelihoodCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn categorize_risk(score: i64) -> RiskLevel {
    if score > 17 {
        RiskLevel::VeryHigh
    } else if score > 10 && score <= 17 {
        RiskLevel::High
    } else if (5..=10).contains(&score) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn categorize_impact(value: i64) -> ImpactCategory {
    if value <= 2 {
        ImpactCategory::Insignificant
    } else if (3..=4).contains(&value) {
        ImpactCategory::Moderate
    } else {
        ImpactCategory::Critical
    }
}

pub fn categorize_likelihood(value: i64) -> LikelihoodCategory {
    if value <= 2 {
        LikelihoodCategory::Unlikely
    } else if (3..=4).contains(&value) {
        LikelihoodCategory::Potential
    } else {
        LikelihoodCategory::Likely
    }
}

/// One scored row as read back from a table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    pub impact: i64,
    pub likelihood: i64,
    pub risk_score: f64,
}

impl ScoredRow {
    pub fn from_factors(impact: i64, likelihood: i64) -> Self {
        Self {
            impact,
            likelihood,
            risk_score: (impact * likelihood) as f64,
        }
    }

    /// Read `impact`, `likelihood` and `risk_score` from a fetched row.
    /// Numbers and numeric strings are accepted; factors must be integral.
    pub fn from_row(row: &Map<String, Value>) -> Option<Self> {
        Some(Self {
            impact: integral(row.get("impact")?)?,
            likelihood: integral(row.get("likelihood")?)?,
            risk_score: numeric(row.get("risk_score")?)?,
        })
    }
}

fn numeric(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn integral(v: &Value) -> Option<i64> {
    if let Some(i) = v.as_i64() {
        return Some(i);
    }
    let f = numeric(v)?;
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Mean risk score per (impact category, likelihood category) cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMatrix {
    pub rows: Vec<ImpactCategory>,
    pub columns: Vec<LikelihoodCategory>,
    /// `cells[r][c]`, 0.0 where no row fell into the cell.
    pub cells: Vec<Vec<f64>>,
    pub counts: Vec<Vec<usize>>,
}

impl RiskMatrix {
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a ScoredRow>,
    {
        let mut sums = [[0.0f64; 3]; 3];
        let mut counts = [[0usize; 3]; 3];
        for row in rows {
            let r = Self::row_index(categorize_impact(row.impact));
            let c = Self::column_index(categorize_likelihood(row.likelihood));
            sums[r][c] += row.risk_score;
            counts[r][c] += 1;
        }
        let cells = (0..3)
            .map(|r| {
                (0..3)
                    .map(|c| {
                        if counts[r][c] == 0 {
                            0.0
                        } else {
                            sums[r][c] / counts[r][c] as f64
                        }
                    })
                    .collect()
            })
            .collect();
        Self {
            rows: ImpactCategory::ROWS.to_vec(),
            columns: LikelihoodCategory::COLUMNS.to_vec(),
            cells,
            counts: counts.iter().map(|r| r.to_vec()).collect(),
        }
    }

    fn row_index(cat: ImpactCategory) -> usize {
        ImpactCategory::ROWS.iter().position(|c| *c == cat).unwrap_or(0)
    }

    fn column_index(cat: LikelihoodCategory) -> usize {
        LikelihoodCategory::COLUMNS.iter().position(|c| *c == cat).unwrap_or(0)
    }

    pub fn cell(&self, impact: ImpactCategory, likelihood: LikelihoodCategory) -> f64 {
        self.cells[Self::row_index(impact)][Self::column_index(likelihood)]
    }

    pub fn max(&self) -> f64 {
        self.cells.iter().flatten().copied().fold(0.0, f64::max)
    }
}

/// Summed risk score per raw (impact, likelihood) pair. Axes hold only the
/// values present in the rows, ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskGrid {
    pub impacts: Vec<i64>,
    pub likelihoods: Vec<i64>,
    /// `cells[i][l]` indexed by `impacts[i]`, `likelihoods[l]`; 0.0 where no row fell.
    pub cells: Vec<Vec<f64>>,
}

impl RiskGrid {
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a ScoredRow>,
    {
        let mut sums: BTreeMap<(i64, i64), f64> = BTreeMap::new();
        for row in rows {
            *sums.entry((row.impact, row.likelihood)).or_insert(0.0) += row.risk_score;
        }
        let impacts: Vec<i64> = sums.keys().map(|(i, _)| *i).collect::<BTreeSet<_>>().into_iter().collect();
        let likelihoods: Vec<i64> = sums.keys().map(|(_, l)| *l).collect::<BTreeSet<_>>().into_iter().collect();
        let cells = impacts
            .iter()
            .map(|i| {
                likelihoods
                    .iter()
                    .map(|l| sums.get(&(*i, *l)).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();
        Self {
            impacts,
            likelihoods,
            cells,
        }
    }

    /// Summed score at a raw pair, `None` when the pair is off both axes.
    pub fn cell(&self, impact: i64, likelihood: i64) -> Option<f64> {
        let i = self.impacts.binary_search(&impact).ok()?;
        let l = self.likelihoods.binary_search(&likelihood).ok()?;
        Some(self.cells[i][l])
    }

    pub fn is_empty(&self) -> bool {
        self.impacts.is_empty()
    }
}

/// One line of the risk ranking table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub level: &'static str,
    pub band: &'static str,
    pub rows: usize,
}

/// Rows per risk level, most severe first. Stored scores are rounded to the
/// nearest integer before bucketing.
pub fn risk_ranking(rows: &[ScoredRow]) -> Vec<RankingEntry> {
    RiskLevel::ALL
        .iter()
        .map(|level| RankingEntry {
            level: level.as_str(),
            band: level.band(),
            rows: rows
                .iter()
                .filter(|r| categorize_risk(r.risk_score.round() as i64) == *level)
                .count(),
        })
        .collect()
}
