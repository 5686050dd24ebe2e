//! Input validation for construction scheduling problems.
//!
//! Checks structural integrity of tasks, resources, and constraints
//! before any search begins. Detects:
//! - Duplicate IDs
//! - Missing resource references and unfillable demands
//! - Missing predecessor references
//! - Negative durations, quantities, capacities, and rates
//! - Time values or worst-case schedule lengths beyond [`MAX_TIME`]
//! - Circular precedence (via topological sort)
//!
//! All problems are collected and reported together.
//!
//! # Reference
//! Kahn (1962), "Topological sorting of large networks";
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use thiserror::Error;

use crate::models::{Constraint, Resource, Task};

/// Latest time point a schedule may reach.
///
/// Time values and the worst-case serial schedule length (slowest
/// resources, every lag, latest offset) must stay within it, which keeps
/// start and finish arithmetic clear of `i64` overflow.
pub const MAX_TIME: i64 = 1 << 40;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind:?}: {message}")]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// No tasks were supplied.
    EmptyProblem,
    /// Two entities share the same ID.
    DuplicateId,
    /// A demand references a resource that doesn't exist or can't fill it.
    InvalidResourceReference,
    /// A task references a predecessor that doesn't exist.
    InvalidPredecessor,
    /// A constraint references a task that doesn't exist.
    UnknownTask,
    /// A duration, quantity, capacity, rate, or lag is out of range.
    NegativeValue,
    /// Capacity windows are empty or overlap.
    InvalidCapacityProfile,
    /// A time value or the worst-case schedule length exceeds [`MAX_TIME`].
    HorizonExceeded,
    /// Precedence graph contains a cycle.
    CyclicPrecedence,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates the input data for a construction scheduling problem.
///
/// Checks:
/// 1. At least one task
/// 2. No duplicate task or resource IDs
/// 3. Resource capacities, rates, and efficiencies are in range
/// 4. Capacity windows are non-empty and non-overlapping
/// 5. Durations, quantities, and pinned starts are non-negative
/// 6. Every demand can be filled by a declared resource of its kind
/// 7. All predecessor and constraint references point to existing tasks
/// 8. No circular precedence dependencies
/// 9. Every time value and the worst-case schedule length fit [`MAX_TIME`]
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(
    tasks: &[Task],
    resources: &[Resource],
    constraints: &[Constraint],
) -> ValidationResult {
    let mut errors = Vec::new();

    if tasks.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyProblem,
            "No tasks provided",
        ));
    }

    let mut resource_by_id: HashMap<&str, &Resource> = HashMap::new();
    for r in resources {
        if resource_by_id.insert(r.id.as_str(), r).is_some() {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate resource ID: {}", r.id),
            ));
        }
        check_resource(r, &mut errors);
    }

    let mut task_ids = HashSet::new();
    for task in tasks {
        if !task_ids.insert(task.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate task ID: {}", task.id),
            ));
        }
        check_task_values(task, &mut errors);
    }

    // Demand references
    for task in tasks {
        for demand in &task.demands {
            if demand.candidates.is_empty() {
                if !resources.iter().any(|r| r.kind == demand.kind) {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::InvalidResourceReference,
                        format!(
                            "Task '{}' needs {:?} but no such resource is declared",
                            task.id, demand.kind
                        ),
                    ));
                }
                continue;
            }
            for cand in &demand.candidates {
                match resource_by_id.get(cand.as_str()) {
                    None => errors.push(ValidationError::new(
                        ValidationErrorKind::InvalidResourceReference,
                        format!("Task '{}' references unknown resource '{}'", task.id, cand),
                    )),
                    Some(r) if r.kind != demand.kind => errors.push(ValidationError::new(
                        ValidationErrorKind::InvalidResourceReference,
                        format!(
                            "Task '{}' needs {:?} but resource '{}' is {:?}",
                            task.id, demand.kind, cand, r.kind
                        ),
                    )),
                    Some(_) => {}
                }
            }
        }
    }

    // Predecessor references
    for task in tasks {
        for pred in &task.predecessors {
            if !task_ids.contains(pred.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidPredecessor,
                    format!("Task '{}' references unknown predecessor '{}'", task.id, pred),
                ));
            }
        }
    }

    for constraint in constraints {
        check_constraint(constraint, &task_ids, &mut errors);
    }

    check_horizon(tasks, resources, &resource_by_id, constraints, &mut errors);

    if let Some(cycle_err) = detect_cycles(tasks, constraints) {
        errors.push(cycle_err);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_resource(r: &Resource, errors: &mut Vec<ValidationError>) {
    if r.capacity < 0 {
        errors.push(ValidationError::new(
            ValidationErrorKind::NegativeValue,
            format!("Resource '{}' has negative capacity {}", r.id, r.capacity),
        ));
    }
    if !(r.unit_cost.is_finite() && r.unit_cost >= 0.0) {
        errors.push(ValidationError::new(
            ValidationErrorKind::NegativeValue,
            format!("Resource '{}' has invalid unit cost {}", r.id, r.unit_cost),
        ));
    }
    if !(r.emission_factor.is_finite() && r.emission_factor >= 0.0) {
        errors.push(ValidationError::new(
            ValidationErrorKind::NegativeValue,
            format!(
                "Resource '{}' has invalid emission factor {}",
                r.id, r.emission_factor
            ),
        ));
    }
    if !(r.efficiency.is_finite() && r.efficiency > 0.0) {
        errors.push(ValidationError::new(
            ValidationErrorKind::NegativeValue,
            format!("Resource '{}' has non-positive efficiency {}", r.id, r.efficiency),
        ));
    }
    for w in &r.profile.windows {
        if w.capacity < 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::NegativeValue,
                format!(
                    "Resource '{}' has negative capacity {} in [{}, {})",
                    r.id, w.capacity, w.window.start, w.window.end
                ),
            ));
        }
        if w.window.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidCapacityProfile,
                format!(
                    "Resource '{}' has empty capacity window [{}, {})",
                    r.id, w.window.start, w.window.end
                ),
            ));
        }
    }
    if let Some((a, b)) = r.profile.find_overlap() {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidCapacityProfile,
            format!(
                "Resource '{}' has overlapping capacity windows [{}, {}) and [{}, {})",
                r.id, a.start, a.end, b.start, b.end
            ),
        ));
    }
}

fn check_task_values(task: &Task, errors: &mut Vec<ValidationError>) {
    if task.duration.min_units() < 0 {
        errors.push(ValidationError::new(
            ValidationErrorKind::NegativeValue,
            format!("Task '{}' has a negative duration estimate", task.id),
        ));
    }
    for demand in &task.demands {
        if demand.quantity < 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::NegativeValue,
                format!(
                    "Task '{}' demands negative quantity {} of {:?}",
                    task.id, demand.quantity, demand.kind
                ),
            ));
        }
    }
    if let Some(start) = task.fixed_start.filter(|s| *s < 0) {
        errors.push(ValidationError::new(
            ValidationErrorKind::NegativeValue,
            format!("Task '{}' is pinned to negative start {}", task.id, start),
        ));
    }
}

fn check_constraint(
    constraint: &Constraint,
    task_ids: &HashSet<&str>,
    errors: &mut Vec<ValidationError>,
) {
    for id in constraint.task_refs() {
        if !task_ids.contains(id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownTask,
                format!("Constraint references unknown task '{id}'"),
            ));
        }
    }
    match constraint {
        Constraint::Precedence { before, after, lag } if *lag < 0 => {
            errors.push(ValidationError::new(
                ValidationErrorKind::NegativeValue,
                format!("Precedence '{before}' → '{after}' has negative lag {lag}"),
            ));
        }
        Constraint::CostCeiling { max_cost } if !(max_cost.is_finite() && *max_cost > 0.0) => {
            errors.push(ValidationError::new(
                ValidationErrorKind::NegativeValue,
                format!("Cost ceiling must be positive, got {max_cost}"),
            ));
        }
        _ => {}
    }
}

fn check_horizon(
    tasks: &[Task],
    resources: &[Resource],
    resource_by_id: &HashMap<&str, &Resource>,
    constraints: &[Constraint],
    errors: &mut Vec<ValidationError>,
) {
    let mut times: Vec<(String, i64)> = Vec::new();
    for task in tasks {
        if let Some(t) = task.fixed_start {
            times.push((format!("Task '{}' fixed start", task.id), t));
        }
        if let Some(t) = task.deadline {
            times.push((format!("Task '{}' deadline", task.id), t));
        }
    }
    for r in resources {
        for w in &r.profile.windows {
            times.push((format!("Resource '{}' capacity window start", r.id), w.window.start));
            times.push((format!("Resource '{}' capacity window end", r.id), w.window.end));
        }
    }
    let mut lags = 0.0;
    for c in constraints {
        match c {
            Constraint::Precedence { before, after, lag } => {
                times.push((format!("Precedence '{before}' → '{after}' lag"), *lag));
                lags += (*lag).max(0) as f64;
            }
            Constraint::Release { task_id, earliest_start } => {
                times.push((format!("Task '{task_id}' release"), *earliest_start));
            }
            Constraint::Deadline { task_id, latest_finish } => {
                times.push((format!("Task '{task_id}' deadline"), *latest_finish));
            }
            Constraint::CostCeiling { .. } => {}
        }
    }

    let mut offset = 0;
    for (what, t) in &times {
        if t.unsigned_abs() > MAX_TIME as u64 {
            errors.push(ValidationError::new(
                ValidationErrorKind::HorizonExceeded,
                format!("{what} {t} is outside ±{MAX_TIME}"),
            ));
        } else {
            offset = offset.max(*t);
        }
    }

    let work: f64 = tasks
        .iter()
        .map(|task| worst_duration(task, resources, resource_by_id))
        .sum();
    let length = offset as f64 + lags + work;
    if length > MAX_TIME as f64 {
        errors.push(ValidationError::new(
            ValidationErrorKind::HorizonExceeded,
            format!("Worst-case schedule length {length:.3e} exceeds {MAX_TIME} time units"),
        ));
    }
}

/// Duration of a task on its slowest eligible labor or equipment.
fn worst_duration(
    task: &Task,
    resources: &[Resource],
    resource_by_id: &HashMap<&str, &Resource>,
) -> f64 {
    let base = task.base_duration().max(0) as f64;
    let slowest = task
        .demands
        .iter()
        .filter(|d| d.kind.drives_duration() && d.quantity > 0)
        .flat_map(|d| -> Vec<f64> {
            if d.candidates.is_empty() {
                resources
                    .iter()
                    .filter(|r| r.kind == d.kind)
                    .map(|r| r.efficiency)
                    .collect()
            } else {
                d.candidates
                    .iter()
                    .filter_map(|c| resource_by_id.get(c.as_str()))
                    .map(|r| r.efficiency)
                    .collect()
            }
        })
        .filter(|e| e.is_finite() && *e > 0.0)
        .fold(f64::INFINITY, f64::min);
    if slowest.is_finite() {
        (base / slowest).ceil()
    } else {
        base
    }
}

/// Detects cycles in the precedence graph via topological sort.
///
/// Edges come from task predecessor lists and `Constraint::Precedence`.
/// Unknown references are ignored here (reported separately).
fn detect_cycles(tasks: &[Task], constraints: &[Constraint]) -> Option<ValidationError> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    for task in tasks {
        let next = index.len();
        index.entry(task.id.as_str()).or_insert(next);
    }

    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); index.len()];
    for task in tasks {
        let Some(&to) = index.get(task.id.as_str()) else {
            continue;
        };
        for pred in &task.predecessors {
            if let Some(&from) = index.get(pred.as_str()) {
                preds[to].push(from);
            }
        }
    }
    for c in constraints {
        if let Constraint::Precedence { before, after, .. } = c {
            if let (Some(&from), Some(&to)) = (index.get(before.as_str()), index.get(after.as_str()))
            {
                preds[to].push(from);
            }
        }
    }

    match topological_order(&preds) {
        Ok(_) => None,
        Err(stuck) => {
            let mut names: Vec<&str> = index
                .iter()
                .filter(|(_, i)| stuck.contains(i))
                .map(|(id, _)| *id)
                .collect();
            names.sort_unstable();
            Some(ValidationError::new(
                ValidationErrorKind::CyclicPrecedence,
                format!("Circular precedence among tasks: {}", names.join(", ")),
            ))
        }
    }
}

/// Topological order of a DAG given as predecessor lists.
///
/// Kahn's algorithm; among ready nodes the lowest index goes first, so
/// the order is deterministic. Returns the nodes that could not be
/// ordered (those on or behind a cycle) as the error.
pub fn topological_order(preds: &[Vec<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let n = preds.len();
    let mut in_degree = vec![0usize; n];
    let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (node, ps) in preds.iter().enumerate() {
        for &p in ps {
            in_degree[node] += 1;
            succs[p].push(node);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);

    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &s in &succs[node] {
            in_degree[s] -= 1;
            if in_degree[s] == 0 {
                ready.push(Reverse(s));
            }
        }
    }

    if order.len() == n {
        Ok(order)
    } else {
        Err((0..n).filter(|&i| in_degree[i] > 0).collect())
    }
}
