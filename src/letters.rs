use crate::model::{finite, GradeCutoff};
use serde::Serialize;
use std::cmp::Ordering;

pub const UNDETERMINED_LETTER: &str = "-";
pub const FALLBACK_LETTER: &str = "F";

/// Labels used when no cutoff applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LetterPolicy<'a> {
    pub undetermined: &'a str,
    pub fallback: &'a str,
}

impl Default for LetterPolicy<'static> {
    fn default() -> Self {
        Self {
            undetermined: UNDETERMINED_LETTER,
            fallback: FALLBACK_LETTER,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortedCutoff<'a> {
    pub grade: &'a str,
    pub min_percentage: f64,
}

/// Usable cutoffs, highest minimum first. Equal minimums keep input order.
pub fn sorted_cutoffs(cutoffs: &[GradeCutoff]) -> Vec<SortedCutoff<'_>> {
    let mut usable: Vec<SortedCutoff<'_>> = cutoffs
        .iter()
        .filter_map(|c| {
            let grade = c.grade.as_deref()?;
            let min_percentage = finite(c.min_percentage)?;
            Some(SortedCutoff {
                grade,
                min_percentage,
            })
        })
        .collect();
    // sort_by is stable.
    usable.sort_by(|a, b| {
        b.min_percentage
            .partial_cmp(&a.min_percentage)
            .unwrap_or(Ordering::Equal)
    });
    usable
}

/// `letter_grade_with` under the default `"-"` / `"F"` labels.
#[cfg(test)]
pub fn letter_grade(percentage: Option<f64>, cutoffs: &[GradeCutoff]) -> String {
    letter_grade_with(percentage, cutoffs, &LetterPolicy::default())
}

/// Letter for `percentage`: highest cutoff at or below it, else a cutoff at
/// or below zero, else `policy.fallback`. `None` maps to `policy.undetermined`.
pub fn letter_grade_with(
    percentage: Option<f64>,
    cutoffs: &[GradeCutoff],
    policy: &LetterPolicy<'_>,
) -> String {
    let Some(percentage) = percentage.filter(|p| !p.is_nan()) else {
        return policy.undetermined.to_string();
    };

    let sorted = sorted_cutoffs(cutoffs);
    if let Some(hit) = sorted.iter().find(|c| percentage >= c.min_percentage) {
        return hit.grade.to_string();
    }
    sorted
        .iter()
        .find(|c| c.min_percentage <= 0.0)
        .map(|c| c.grade.to_string())
        .unwrap_or_else(|| policy.fallback.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "camelCase")]
pub enum CutoffIssue {
    #[serde(rename_all = "camelCase")]
    MissingGrade { index: usize },
    #[serde(rename_all = "camelCase")]
    InvalidMinimum { index: usize },
    /// Shadowed by an earlier cutoff with the same minimum; never selected.
    #[serde(rename_all = "camelCase")]
    DuplicateMinimum {
        index: usize,
        first_index: usize,
        min_percentage: f64,
    },
}

/// Reports cutoffs that `letter_grade_with` ignores or can never pick.
pub fn validate_cutoffs(cutoffs: &[GradeCutoff]) -> Vec<CutoffIssue> {
    let mut issues = Vec::new();
    let mut seen: Vec<(f64, usize)> = Vec::new();
    for (index, c) in cutoffs.iter().enumerate() {
        if c.grade.is_none() {
            issues.push(CutoffIssue::MissingGrade { index });
            continue;
        }
        let Some(min) = finite(c.min_percentage) else {
            issues.push(CutoffIssue::InvalidMinimum { index });
            continue;
        };
        match seen.iter().find(|(m, _)| *m == min) {
            Some((_, first_index)) => issues.push(CutoffIssue::DuplicateMinimum {
                index,
                first_index: *first_index,
                min_percentage: min,
            }),
            None => seen.push((min, index)),
        }
    }
    issues
}
