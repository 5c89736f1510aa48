use crate::config::EngineConfig;
use crate::letters::{letter_grade_with, validate_cutoffs, CutoffIssue};
use crate::model::{finite, Assignment, AssignmentGroup, GradeCutoff};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

const WEIGHT_TOTAL_TOLERANCE: f64 = 1e-6;

/// Half-up rounding to `decimals` places, `Int(10^d * x + 0.5) / 10^d`.
pub fn round_half_up(x: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    ((factor * x) + 0.5).floor() / factor
}

fn positive(v: Option<f64>) -> Option<f64> {
    finite(v).filter(|x| *x > 0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupPolicy {
    /// Group weight split evenly over non-dropped members.
    Equal,
    /// Group weight split in proportion to `relativeWeightInGroup`.
    Manual,
}

pub fn find_group<'a>(groups: &'a [AssignmentGroup], id: &str) -> Option<&'a AssignmentGroup> {
    groups.iter().find(|g| g.id == id)
}

fn is_active_member(a: &Assignment, group_id: &str) -> bool {
    !a.is_dropped && a.group_id.as_deref() == Some(group_id)
}

/// Manual as soon as any non-dropped member carries a positive relative weight.
pub fn group_policy(group_id: &str, assignments: &[Assignment]) -> GroupPolicy {
    let manual = assignments.iter().any(|a| {
        is_active_member(a, group_id) && positive(a.relative_weight_in_group).is_some()
    });
    if manual {
        GroupPolicy::Manual
    } else {
        GroupPolicy::Equal
    }
}

#[derive(Debug, Clone, Copy)]
struct GroupShare {
    weight: f64,
    members: usize,
    relative_total: f64,
}

impl GroupShare {
    fn policy(&self) -> GroupPolicy {
        if self.relative_total > 0.0 {
            GroupPolicy::Manual
        } else {
            GroupPolicy::Equal
        }
    }

    fn weight_for(&self, a: &Assignment) -> f64 {
        if self.members == 0 {
            return 0.0;
        }
        match self.policy() {
            GroupPolicy::Manual => {
                // Only the total is restricted to positive shares; a negative
                // own share comes back negative and the aggregator ignores it.
                let own = finite(a.relative_weight_in_group).unwrap_or(0.0);
                self.weight * own / self.relative_total
            }
            GroupPolicy::Equal => self.weight / (self.members as f64),
        }
    }
}

/// Group shares resolved from the current member set. Built per call and
/// thrown away; nothing here outlives the inputs it was built from.
struct WeightTable<'a> {
    shares: HashMap<&'a str, GroupShare>,
}

impl<'a> WeightTable<'a> {
    fn build(assignments: &[Assignment], groups: &'a [AssignmentGroup]) -> Self {
        let mut shares: HashMap<&'a str, GroupShare> = HashMap::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for g in groups {
            // Lookups resolve to the first group with a given id.
            if !seen.insert(g.id.as_str()) {
                continue;
            }
            if let Some(weight) = positive(g.weight) {
                shares.insert(
                    g.id.as_str(),
                    GroupShare {
                        weight,
                        members: 0,
                        relative_total: 0.0,
                    },
                );
            }
        }

        for a in assignments {
            if a.is_dropped {
                continue;
            }
            let Some(share) = a.group_id.as_deref().and_then(|id| shares.get_mut(id)) else {
                continue;
            };
            share.members += 1;
            if let Some(rel) = positive(a.relative_weight_in_group) {
                share.relative_total += rel;
            }
        }

        Self { shares }
    }

    fn weight_of(&self, a: &Assignment) -> Option<f64> {
        if a.is_dropped {
            return Some(0.0);
        }
        let Some(group_id) = a.group_id.as_deref() else {
            return finite(a.weight);
        };
        Some(
            self.shares
                .get(group_id)
                .map(|share| share.weight_for(a))
                .unwrap_or(0.0),
        )
    }
}

/// Share of the course grade `assignment` carries given the current state of
/// its group. `None` only for an ungrouped assignment without a usable weight.
pub fn effective_weight(
    assignment: &Assignment,
    assignments: &[Assignment],
    groups: &[AssignmentGroup],
) -> Option<f64> {
    WeightTable::build(assignments, groups).weight_of(assignment)
}

/// `score / totalScore`, or `None` while ungraded.
pub fn assignment_fraction(a: &Assignment) -> Option<f64> {
    let score = finite(a.score)?;
    let total = finite(a.total_score)?;
    if total == 0.0 {
        return None;
    }
    Some(score / total)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AssignmentStatus {
    Dropped,
    Ungraded,
    Unweighted,
    Counted,
    ExtraCredit,
}

#[derive(Debug, Clone, Copy)]
struct Contribution {
    status: AssignmentStatus,
    points: f64,
    counted_weight: f64,
}

fn contribute(a: &Assignment, weight: Option<f64>) -> Contribution {
    let (status, points, counted_weight) = if a.is_dropped {
        (AssignmentStatus::Dropped, 0.0, 0.0)
    } else {
        match (assignment_fraction(a), positive(weight)) {
            (None, _) => (AssignmentStatus::Ungraded, 0.0, 0.0),
            (Some(_), None) => (AssignmentStatus::Unweighted, 0.0, 0.0),
            (Some(f), Some(w)) if a.is_extra_credit => (AssignmentStatus::ExtraCredit, f * w, 0.0),
            (Some(f), Some(w)) => (AssignmentStatus::Counted, f * w, w),
        }
    };
    Contribution {
        status,
        points,
        counted_weight,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Tally {
    points: f64,
    weight: f64,
}

impl Tally {
    fn add(&mut self, c: &Contribution) {
        self.points += c.points;
        self.weight += c.counted_weight;
    }

    fn percentage(&self) -> Option<f64> {
        if self.weight <= 0.0 {
            return None;
        }
        Some((100.0 * self.points / self.weight).max(0.0))
    }
}

/// Weighted course percentage. `None` means nothing gradeable carries weight
/// yet, which is different from 0%. Extra credit may push the result past 100.
pub fn overall_percentage(assignments: &[Assignment], groups: &[AssignmentGroup]) -> Option<f64> {
    let table = WeightTable::build(assignments, groups);
    let mut tally = Tally::default();
    for a in assignments {
        tally.add(&contribute(a, table.weight_of(a)));
    }
    tally.percentage()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentBreakdown {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub group_id: Option<String>,
    pub fraction: Option<f64>,
    pub effective_weight: Option<f64>,
    pub counted_weight: f64,
    pub points: f64,
    pub status: AssignmentStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBreakdown {
    pub id: String,
    pub name: Option<String>,
    pub weight: Option<f64>,
    pub policy: GroupPolicy,
    pub active_members: usize,
    /// Weighted percentage over the group's graded members.
    pub percentage: Option<f64>,
    pub effective_weight_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SummaryWarning {
    #[serde(rename_all = "camelCase")]
    MissingGroup { group_id: String },
    /// Positive group weights plus ungrouped weights do not add up to 100.
    #[serde(rename_all = "camelCase")]
    WeightTotal { configured: f64 },
    Cutoff { detail: CutoffIssue },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub percentage: Option<f64>,
    pub rounded_percentage: Option<f64>,
    pub letter: String,
    pub total_points: f64,
    pub total_weight: f64,
    pub per_assignment: Vec<AssignmentBreakdown>,
    pub per_group: Vec<GroupBreakdown>,
    pub warnings: Vec<SummaryWarning>,
}

pub fn course_summary(
    assignments: &[Assignment],
    groups: &[AssignmentGroup],
    cutoffs: &[GradeCutoff],
    config: &EngineConfig,
) -> CourseSummary {
    let table = WeightTable::build(assignments, groups);

    let mut tally = Tally::default();
    let mut per_assignment: Vec<AssignmentBreakdown> = Vec::with_capacity(assignments.len());
    for (index, a) in assignments.iter().enumerate() {
        let effective_weight = table.weight_of(a);
        let c = contribute(a, effective_weight);
        tally.add(&c);
        per_assignment.push(AssignmentBreakdown {
            index,
            id: a.id.clone(),
            name: a.name.clone(),
            group_id: a.group_id.clone(),
            fraction: assignment_fraction(a),
            effective_weight,
            counted_weight: c.counted_weight,
            points: c.points,
            status: c.status,
        });
    }

    let mut per_group: Vec<GroupBreakdown> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for g in groups {
        if !seen.insert(g.id.as_str()) {
            continue;
        }
        let mut group_tally = Tally::default();
        let mut active_members = 0_usize;
        let mut effective_weight_total = 0.0_f64;
        for (a, row) in assignments.iter().zip(&per_assignment) {
            if !is_active_member(a, &g.id) {
                continue;
            }
            active_members += 1;
            effective_weight_total += positive(row.effective_weight).unwrap_or(0.0);
            group_tally.points += row.points;
            group_tally.weight += row.counted_weight;
        }
        per_group.push(GroupBreakdown {
            id: g.id.clone(),
            name: g.name.clone(),
            weight: finite(g.weight),
            policy: group_policy(&g.id, assignments),
            active_members,
            percentage: group_tally.percentage(),
            effective_weight_total,
        });
    }

    let mut warnings = configuration_warnings(assignments, groups);
    warnings.extend(
        validate_cutoffs(cutoffs)
            .into_iter()
            .map(|detail| SummaryWarning::Cutoff { detail }),
    );

    let percentage = tally.percentage();
    CourseSummary {
        percentage,
        rounded_percentage: percentage.map(|p| round_half_up(p, config.display_decimals())),
        letter: letter_grade_with(percentage, cutoffs, &config.letter_policy()),
        total_points: tally.points,
        total_weight: tally.weight,
        per_assignment,
        per_group,
        warnings,
    }
}

fn configuration_warnings(
    assignments: &[Assignment],
    groups: &[AssignmentGroup],
) -> Vec<SummaryWarning> {
    let mut warnings = Vec::new();

    let mut reported: HashSet<&str> = HashSet::new();
    for a in assignments {
        if a.is_dropped {
            continue;
        }
        let Some(group_id) = a.group_id.as_deref() else {
            continue;
        };
        if find_group(groups, group_id).is_none() && reported.insert(group_id) {
            warnings.push(SummaryWarning::MissingGroup {
                group_id: group_id.to_string(),
            });
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut configured = 0.0_f64;
    for g in groups {
        if seen.insert(g.id.as_str()) {
            configured += positive(g.weight).unwrap_or(0.0);
        }
    }
    for a in assignments {
        if a.is_dropped || a.is_extra_credit || a.group_id.is_some() {
            continue;
        }
        configured += positive(a.weight).unwrap_or(0.0);
    }
    if configured > 0.0 && (configured - 100.0).abs() > WEIGHT_TOTAL_TOLERANCE {
        warnings.push(SummaryWarning::WeightTotal { configured });
    }

    warnings
}

/// Copies `assignments` with scores replaced by id. `None` clears a score.
pub fn apply_overrides(
    assignments: &[Assignment],
    overrides: &BTreeMap<String, Option<f64>>,
) -> Vec<Assignment> {
    assignments
        .iter()
        .map(|a| {
            let mut next = a.clone();
            if let Some(score) = a.id.as_ref().and_then(|id| overrides.get(id)) {
                next.score = *score;
            }
            next
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIf {
    pub baseline: Option<f64>,
    pub baseline_letter: String,
    pub percentage: Option<f64>,
    pub letter: String,
    pub unmatched_ids: Vec<String>,
}

pub fn what_if(
    assignments: &[Assignment],
    groups: &[AssignmentGroup],
    cutoffs: &[GradeCutoff],
    overrides: &BTreeMap<String, Option<f64>>,
    config: &EngineConfig,
) -> WhatIf {
    let policy = config.letter_policy();
    let baseline = overall_percentage(assignments, groups);
    let hypothetical = apply_overrides(assignments, overrides);
    let percentage = overall_percentage(&hypothetical, groups);
    let unmatched_ids = overrides
        .keys()
        .filter(|id| !assignments.iter().any(|a| a.id.as_ref() == Some(*id)))
        .cloned()
        .collect();
    WhatIf {
        baseline,
        baseline_letter: letter_grade_with(baseline, cutoffs, &policy),
        percentage,
        letter: letter_grade_with(percentage, cutoffs, &policy),
        unmatched_ids,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RequiredScore {
    /// May be negative or above `totalScore`; callers decide what is attainable.
    Score { score: f64 },
    NotFound,
    NotWeighted,
    Unreachable,
}

/// Score the assignment with id `target_id` needs for the course to land on
/// `target_percentage`. Group weights do not depend on scores, so the
/// aggregate is linear in the target's score and solves directly.
pub fn required_score(
    assignments: &[Assignment],
    groups: &[AssignmentGroup],
    target_id: &str,
    target_percentage: f64,
) -> RequiredScore {
    let Some(target_index) = assignments
        .iter()
        .position(|a| a.id.as_deref() == Some(target_id))
    else {
        return RequiredScore::NotFound;
    };
    let target = &assignments[target_index];

    let table = WeightTable::build(assignments, groups);
    let Some(weight) = positive(table.weight_of(target)) else {
        return RequiredScore::NotWeighted;
    };
    let Some(total) = finite(target.total_score).filter(|t| *t != 0.0) else {
        return RequiredScore::NotWeighted;
    };
    if !target_percentage.is_finite() {
        return RequiredScore::Unreachable;
    }

    let mut rest = Tally::default();
    for (i, a) in assignments.iter().enumerate() {
        if i != target_index {
            rest.add(&contribute(a, table.weight_of(a)));
        }
    }
    let denominator = rest.weight + if target.is_extra_credit { 0.0 } else { weight };
    if denominator <= 0.0 {
        return RequiredScore::Unreachable;
    }

    let needed_fraction = (target_percentage / 100.0 * denominator - rest.points) / weight;
    RequiredScore::Score {
        score: needed_fraction * total,
    }
}
