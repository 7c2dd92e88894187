use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{PipelineError, Result};

/// Precision, recall, F1 and support for one class or one average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    /// Every class seen in the truth or the predictions.
    #[serde(flatten)]
    pub classes: BTreeMap<usize, ClassMetrics>,
    pub accuracy: f64,
    #[serde(rename = "macro avg")]
    pub macro_avg: ClassMetrics,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: ClassMetrics,
}

fn check_lengths(y_true: usize, y_other: usize) -> Result<()> {
    if y_true == 0 {
        return Err(PipelineError::ShapeMismatch("no labels to score".to_string()));
    }
    if y_true != y_other {
        return Err(PipelineError::ShapeMismatch(format!(
            "{y_true} labels but {y_other} predictions"
        )));
    }
    Ok(())
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(ratio(correct, y_true.len()))
}

/// Per-class and averaged metrics. Undefined precision or recall (no
/// predicted or no true rows of a class) counts as 0.
pub fn classification_report(y_true: &[usize], y_pred: &[usize]) -> Result<ClassificationReport> {
    check_lengths(y_true.len(), y_pred.len())?;

    let mut labels: Vec<usize> = y_true.iter().chain(y_pred).copied().collect();
    labels.sort_unstable();
    labels.dedup();

    let classes: BTreeMap<usize, ClassMetrics> = labels
        .iter()
        .map(|&class| {
            let tp = y_true
                .iter()
                .zip(y_pred)
                .filter(|&(&t, &p)| t == class && p == class)
                .count();
            let predicted = y_pred.iter().filter(|&&p| p == class).count();
            let support = y_true.iter().filter(|&&t| t == class).count();
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            (
                class,
                ClassMetrics {
                    precision,
                    recall,
                    f1,
                    support,
                },
            )
        })
        .collect();

    let total = y_true.len();
    let n = classes.len() as f64;
    let mean = |f: fn(&ClassMetrics) -> f64| classes.values().map(f).sum::<f64>() / n;
    let weighted = |f: fn(&ClassMetrics) -> f64| {
        classes
            .values()
            .map(|m| f(m) * m.support as f64)
            .sum::<f64>()
            / total as f64
    };

    Ok(ClassificationReport {
        accuracy: accuracy(y_true, y_pred)?,
        macro_avg: ClassMetrics {
            precision: mean(|m| m.precision),
            recall: mean(|m| m.recall),
            f1: mean(|m| m.f1),
            support: total,
        },
        weighted_avg: ClassMetrics {
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1: weighted(|m| m.f1),
            support: total,
        },
        classes,
    })
}

/// Area under the ROC curve via the rank-sum statistic. Tied scores share
/// their average rank, so hard 0/1 predictions are scored correctly too.
pub fn roc_auc(y_true: &[usize], scores: &[f64]) -> Result<f64> {
    check_lengths(y_true.len(), scores.len())?;
    let positives = y_true.iter().filter(|&&t| t == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(PipelineError::UndefinedMetric {
            metric: "AUC-ROC",
            reason: "only one class present in y_true".to_string(),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // ranks start..end (0-based) share their mean, 1-based
        let rank = (start + end + 1) as f64 / 2.0;
        positive_rank_sum += rank * order[start..end].iter().filter(|&&i| y_true[i] == 1).count() as f64;
        start = end;
    }

    let (p, n) = (positives as f64, negatives as f64);
    Ok((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for (class, m) in &self.classes {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                class, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}
