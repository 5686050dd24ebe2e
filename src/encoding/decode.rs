//! Genome → schedule decoding.
//!
//! Serial schedule generation: tasks are placed one at a time in genome
//! order. Each task starts at the earliest time that
//!
//! 1. is no earlier than its release date,
//! 2. is no earlier than every placed predecessor's finish plus lag, and
//! 3. keeps every assigned resource within capacity over the whole
//!    occupied interval.
//!
//! When no such time exists (the demand exceeds what the resource can
//! ever supply), the task is placed at its precedence-ready time and a
//! `CapacityExceeded` violation is recorded. Pinned tasks are never
//! shifted for resources. The resulting [`Schedule`] always contains one
//! assignment per task in the genome.
//!
//! # Reference
//! Kolisch & Hartmann (1999), "Heuristic algorithms for the
//! resource-constrained project scheduling problem", serial SGS

use std::collections::{BTreeMap, BTreeSet};

use super::ScheduleGenome;
use crate::models::{Assignment, ProblemModel, Resource, Schedule, Violation};

/// Piecewise-constant usage of one resource.
///
/// `steps[t]` is the usage level from `t` until the next key.
#[derive(Debug, Clone, Default)]
struct UsageProfile {
    steps: BTreeMap<i64, i64>,
}

impl UsageProfile {
    fn level_at(&self, t: i64) -> i64 {
        self.steps.range(..=t).next_back().map_or(0, |(_, &v)| v)
    }

    fn add(&mut self, start: i64, end: i64, qty: i64) {
        if end <= start || qty == 0 {
            return;
        }
        let at_start = self.level_at(start);
        let at_end = self.level_at(end);
        self.steps.entry(start).or_insert(at_start);
        self.steps.entry(end).or_insert(at_end);
        for (_, level) in self.steps.range_mut(start..end) {
            *level += qty;
        }
    }

    fn breakpoints_after(&self, t: i64) -> impl Iterator<Item = i64> + '_ {
        self.steps.range(t + 1..).map(|(&k, _)| k)
    }

    /// First time in `[start, end)` where adding `qty` breaks capacity.
    fn first_conflict(&self, resource: &Resource, start: i64, end: i64, qty: i64) -> Option<i64> {
        if end <= start || qty == 0 {
            return None;
        }
        let mut points: BTreeSet<i64> = BTreeSet::new();
        points.insert(start);
        points.extend(self.steps.range(start + 1..end).map(|(&k, _)| k));
        points.extend(resource.profile.boundaries().filter(|&b| b > start && b < end));
        points
            .into_iter()
            .find(|&p| self.level_at(p) + qty > resource.capacity_at(p))
    }
}

/// Decodes a genome into a schedule.
///
/// Assumes a structurally valid genome (see
/// [`ScheduleGenome::is_valid`]). A non-topological order is tolerated:
/// tasks placed before a predecessor are flagged with a
/// `PrecedenceViolation`.
pub fn decode(genome: &ScheduleGenome, problem: &ProblemModel) -> Schedule {
    let resources = problem.resources();
    let mut usage = vec![UsageProfile::default(); resources.len()];
    let mut finish: Vec<Option<i64>> = vec![None; problem.task_count()];
    let mut starts: Vec<Option<i64>> = vec![None; problem.task_count()];
    let mut schedule = Schedule::new();

    for &t in &genome.order {
        let task = &problem.tasks()[t];
        let choice = genome.assignment.get(t).map_or(&[][..], Vec::as_slice);
        let duration = problem.effective_duration(t, choice);

        let ready = problem
            .predecessors(t)
            .iter()
            .filter_map(|l| finish[l.task].map(|f| f + l.lag))
            .fold(problem.release(t), i64::max);

        let uses = resource_uses(problem, t, choice);

        let start = match problem.fixed_start(t) {
            Some(pin) => {
                if ready > pin {
                    schedule.add_violation(Violation::fixed_start_missed(
                        &task.id,
                        format!("pinned at {pin}, predecessors allow {ready}"),
                    ));
                }
                ready
            }
            None => earliest_fit(&usage, resources, &uses, ready, duration),
        };
        let end = start + duration;

        let mut assignment = Assignment::new(&task.id, t, start, end);
        for &(r, qty) in &uses {
            if let Some(at) = usage[r].first_conflict(&resources[r], start, end, qty) {
                schedule.add_violation(Violation::capacity_exceeded(
                    &resources[r].id,
                    format!(
                        "{} needs {} units at t={}, {} of {} available",
                        task.id,
                        qty,
                        at,
                        (resources[r].capacity_at(at) - usage[r].level_at(at)).max(0),
                        resources[r].capacity_at(at)
                    ),
                ));
            }
            usage[r].add(start, end, qty);
            assignment = assignment.with_resource(&resources[r].id, r, qty);
        }

        if let Some(deadline) = problem.deadline(t) {
            if end > deadline {
                schedule.add_violation(Violation::deadline_miss(
                    &task.id,
                    format!("finishes at {end}, deadline {deadline}"),
                ));
            }
        }

        finish[t] = Some(end);
        starts[t] = Some(start);
        schedule.add_assignment(assignment);
    }

    for &t in &genome.order {
        let Some(start) = starts[t] else { continue };
        for link in problem.predecessors(t) {
            if let Some(f) = finish[link.task] {
                if start < f + link.lag {
                    schedule.add_violation(Violation::precedence_violation(
                        &problem.tasks()[t].id,
                        format!(
                            "starts at {start} before {} finishes at {f} (lag {})",
                            problem.tasks()[link.task].id,
                            link.lag
                        ),
                    ));
                }
            }
        }
    }

    schedule
}

/// Resource indices and quantities drawn by a task under a choice.
///
/// Demands landing on the same resource are merged.
fn resource_uses(problem: &ProblemModel, task: usize, choice: &[usize]) -> Vec<(usize, i64)> {
    let mut uses: Vec<(usize, i64)> = Vec::new();
    for (slot, &c) in problem.demands(task).iter().zip(choice) {
        if slot.quantity == 0 {
            continue;
        }
        let Some(&r) = slot.candidates.get(c) else {
            continue;
        };
        match uses.iter_mut().find(|(res, _)| *res == r) {
            Some((_, q)) => *q += slot.quantity,
            None => uses.push((r, slot.quantity)),
        }
    }
    uses
}

/// Earliest start ≥ `ready` where every use fits for `duration`.
///
/// Feasibility only changes at usage or capacity breakpoints, so those
/// are the only candidate starts. Falls back to `ready` when none fits,
/// without searching when a demand exceeds every capacity still ahead.
fn earliest_fit(
    usage: &[UsageProfile],
    resources: &[Resource],
    uses: &[(usize, i64)],
    ready: i64,
    duration: i64,
) -> i64 {
    if duration == 0 || uses.is_empty() {
        return ready;
    }
    let never_fits = uses.iter().any(|&(r, qty)| {
        qty > resources[r].profile.max_capacity_from(resources[r].capacity, ready)
    });
    if never_fits {
        return ready;
    }
    let mut candidates: BTreeSet<i64> = BTreeSet::new();
    candidates.insert(ready);
    for &(r, _) in uses {
        candidates.extend(usage[r].breakpoints_after(ready));
        candidates.extend(resources[r].profile.boundaries().filter(|&b| b > ready));
    }
    candidates
        .into_iter()
        .find(|&s| {
            uses.iter().all(|&(r, qty)| {
                usage[r]
                    .first_conflict(&resources[r], s, s + duration, qty)
                    .is_none()
            })
        })
        .unwrap_or(ready)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Constraint, ResourceDemand, ResourceKind, Task, ViolationType};

    fn genome(order: Vec<usize>, assignment: Vec<Vec<usize>>) -> ScheduleGenome {
        ScheduleGenome {
            order,
            assignment,
            fitness: f64::INFINITY,
        }
    }

    /// Durations [2, 3, 1], T2 after T1, one crew of capacity 1.
    fn serial_problem() -> ProblemModel {
        let tasks = vec![
            Task::new("T1", 2).requires("CREW", ResourceKind::Labor, 1),
            Task::new("T2", 3)
                .with_predecessor("T1")
                .requires("CREW", ResourceKind::Labor, 1),
            Task::new("T3", 1).requires("CREW", ResourceKind::Labor, 1),
        ];
        let resources = vec![Resource::labor("CREW").with_capacity(1)];
        ProblemModel::load(tasks, resources, vec![]).expect("valid")
    }

    #[test]
    fn test_usage_profile_steps() {
        let mut u = UsageProfile::default();
        u.add(2, 5, 3);
        u.add(4, 8, 1);
        assert_eq!(u.level_at(0), 0);
        assert_eq!(u.level_at(2), 3);
        assert_eq!(u.level_at(4), 4);
        assert_eq!(u.level_at(5), 1);
        assert_eq!(u.level_at(8), 0);
    }

    #[test]
    fn test_serial_single_crew() {
        let p = serial_problem();
        let s = decode(&genome(vec![0, 1, 2], vec![vec![0], vec![0], vec![0]]), &p);
        assert_eq!(s.start_of("T1"), Some(0));
        assert_eq!(s.start_of("T2"), Some(2));
        assert_eq!(s.start_of("T3"), Some(5));
        assert_eq!(s.makespan(), 6);
        assert!(s.is_valid());
    }

    #[test]
    fn test_fills_gap_before_existing_use() {
        let p = serial_problem();
        // T3 first at 0, T1 waits until 1, T2 follows at 3.
        let s = decode(&genome(vec![2, 0, 1], vec![vec![0], vec![0], vec![0]]), &p);
        assert_eq!(s.start_of("T3"), Some(0));
        assert_eq!(s.start_of("T1"), Some(1));
        assert_eq!(s.start_of("T2"), Some(3));
        assert_eq!(s.makespan(), 6);
    }

    #[test]
    fn test_parallel_when_capacity_allows() {
        let tasks = vec![
            Task::new("A", 4).requires("CREW", ResourceKind::Labor, 1),
            Task::new("B", 4).requires("CREW", ResourceKind::Labor, 1),
        ];
        let resources = vec![Resource::labor("CREW").with_capacity(2)];
        let p = ProblemModel::load(tasks, resources, vec![]).expect("valid");
        let s = decode(&genome(vec![0, 1], vec![vec![0], vec![0]]), &p);
        assert_eq!(s.start_of("B"), Some(0));
        assert_eq!(s.makespan(), 4);
    }

    #[test]
    fn test_capacity_window_delays_start() {
        let tasks = vec![Task::new("A", 2).requires("CRANE", ResourceKind::Equipment, 1)];
        // Crane is away for [0, 3).
        let resources = vec![Resource::equipment("CRANE").with_capacity_window(0, 3, 0)];
        let p = ProblemModel::load(tasks, resources, vec![]).expect("valid");
        let s = decode(&genome(vec![0], vec![vec![0]]), &p);
        assert_eq!(s.start_of("A"), Some(3));
        assert!(s.is_valid());
    }

    #[test]
    fn test_unsatisfiable_demand_reports_overflow() {
        let tasks = vec![Task::new("A", 2).requires("CREW", ResourceKind::Labor, 5)];
        let resources = vec![Resource::labor("CREW").with_capacity(3)];
        let p = ProblemModel::load(tasks, resources, vec![]).expect("valid");
        let s = decode(&genome(vec![0], vec![vec![0]]), &p);
        assert_eq!(s.start_of("A"), Some(0));
        assert_eq!(s.violation_count(ViolationType::CapacityExceeded), 1);
    }

    #[test]
    fn test_surge_window_only_helps_before_it_closes() {
        // Extra crew on site during [0, 4); base capacity 1 afterwards.
        let resources = || vec![Resource::labor("CREW").with_capacity_window(0, 4, 3)];

        let early = vec![Task::new("A", 2).requires("CREW", ResourceKind::Labor, 2)];
        let p = ProblemModel::load(early, resources(), vec![Constraint::release("A", 1)])
            .expect("valid");
        let s = decode(&genome(vec![0], vec![vec![0]]), &p);
        assert_eq!(s.start_of("A"), Some(1));
        assert!(s.is_valid());

        let late = vec![Task::new("A", 2).requires("CREW", ResourceKind::Labor, 2)];
        let p = ProblemModel::load(late, resources(), vec![Constraint::release("A", 4)])
            .expect("valid");
        let s = decode(&genome(vec![0], vec![vec![0]]), &p);
        assert_eq!(s.start_of("A"), Some(4));
        assert_eq!(s.violation_count(ViolationType::CapacityExceeded), 1);
    }

    #[test]
    fn test_lag_and_release() {
        let tasks = vec![Task::new("A", 2), Task::new("B", 1)];
        let constraints = vec![
            Constraint::precedence_with_lag("A", "B", 3),
            Constraint::release("A", 4),
        ];
        let p = ProblemModel::load(tasks, vec![], constraints).expect("valid");
        let s = decode(&genome(vec![0, 1], vec![vec![], vec![]]), &p);
        assert_eq!(s.start_of("A"), Some(4));
        assert_eq!(s.start_of("B"), Some(9));
    }

    #[test]
    fn test_fixed_start_not_shifted_for_resources() {
        let tasks = vec![
            Task::new("A", 3).requires("CREW", ResourceKind::Labor, 1),
            Task::new("B", 1)
                .with_fixed_start(1)
                .requires("CREW", ResourceKind::Labor, 1),
        ];
        let resources = vec![Resource::labor("CREW").with_capacity(1)];
        let p = ProblemModel::load(tasks, resources, vec![]).expect("valid");
        let s = decode(&genome(vec![0, 1], vec![vec![0], vec![0]]), &p);
        assert_eq!(s.start_of("B"), Some(1));
        assert_eq!(s.violation_count(ViolationType::CapacityExceeded), 1);
    }

    #[test]
    fn test_fixed_start_missed() {
        let tasks = vec![
            Task::new("A", 3),
            Task::new("B", 1).with_predecessor("A").with_fixed_start(1),
        ];
        let p = ProblemModel::load(tasks, vec![], vec![]).expect("valid");
        let s = decode(&genome(vec![0, 1], vec![vec![], vec![]]), &p);
        assert_eq!(s.start_of("B"), Some(3));
        assert_eq!(s.violation_count(ViolationType::FixedStartMissed), 1);
    }

    #[test]
    fn test_deadline_miss_recorded() {
        let tasks = vec![Task::new("A", 5).with_deadline(3)];
        let p = ProblemModel::load(tasks, vec![], vec![]).expect("valid");
        let s = decode(&genome(vec![0], vec![vec![]]), &p);
        assert_eq!(s.violation_count(ViolationType::DeadlineMiss), 1);
    }

    #[test]
    fn test_non_topological_order_flagged() {
        let p = serial_problem();
        let s = decode(&genome(vec![1, 0, 2], vec![vec![0], vec![0], vec![0]]), &p);
        assert_eq!(s.assignment_count(), 3);
        assert_eq!(s.violation_count(ViolationType::PrecedenceViolation), 1);
    }

    #[test]
    fn test_efficiency_shortens_task() {
        let tasks = vec![Task::new("A", 6).with_demand(ResourceDemand::new(ResourceKind::Labor, 1))];
        let resources = vec![
            Resource::labor("SLOW").with_efficiency(0.5),
            Resource::labor("FAST").with_efficiency(2.0),
        ];
        let p = ProblemModel::load(tasks, resources, vec![]).expect("valid");
        assert_eq!(decode(&genome(vec![0], vec![vec![0]]), &p).makespan(), 12);
        assert_eq!(decode(&genome(vec![0], vec![vec![1]]), &p).makespan(), 3);
    }

    #[test]
    fn test_random_genomes_respect_precedence() {
        let p = serial_problem();
        for seed in 0..30 {
            let g = ScheduleGenome::random_init(&p, seed);
            let s = decode(&g, &p);
            assert_eq!(s.violation_count(ViolationType::PrecedenceViolation), 0);
            let t1 = s.finish_of("T1").unwrap();
            assert!(s.start_of("T2").unwrap() >= t1);
        }
    }
}
