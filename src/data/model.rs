use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::payload::Payload;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// EntityId – identity of a job, task or fraction
// ---------------------------------------------------------------------------

/// Identity of an entity at one of the three granularities.
///
/// Used as the key of every comparison result, so it is `Ord` and serializes
/// as its display form (`"7"`, `"7-0"`, `"7-0-3"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityId {
    Job(u64),
    Task(u64, u32),
    Fraction(u64, u32, u32),
}

impl EntityId {
    pub fn job_id(&self) -> u64 {
        match *self {
            EntityId::Job(j) | EntityId::Task(j, _) | EntityId::Fraction(j, _, _) => j,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Job(j) => write!(f, "{j}"),
            EntityId::Task(j, t) => write!(f, "{j}-{t}"),
            EntityId::Fraction(j, t, i) => write!(f, "{j}-{t}-{i}"),
        }
    }
}

/// Parses the display form back: `"7"`, `"7-0"` or `"7-0-3"`.
impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::invalid("entity id", format!("'{s}' is not job[-task[-fraction]]"));
        let parts: Vec<&str> = s.trim().split('-').collect();
        let job = parts[0].parse::<u64>().map_err(|_| bad())?;
        let idx = |i: usize| parts[i].parse::<u32>().map_err(|_| bad());
        match parts.len() {
            1 => Ok(EntityId::Job(job)),
            2 => Ok(EntityId::Task(job, idx(1)?)),
            3 => Ok(EntityId::Fraction(job, idx(1)?, idx(2)?)),
            _ => Err(bad()),
        }
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Fraction – a contiguous slice of a task's series
// ---------------------------------------------------------------------------

/// Smallest unit of the hierarchy. Equality is identity only.
#[derive(Debug, Clone)]
pub struct Fraction {
    job_id: u64,
    task_idx: u32,
    idx: u32,
    data: Payload,
}

impl Fraction {
    pub fn new(job_id: u64, task_idx: u32, idx: u32, data: Payload) -> Self {
        Fraction {
            job_id,
            task_idx,
            idx,
            data,
        }
    }

    pub fn id(&self) -> EntityId {
        EntityId::Fraction(self.job_id, self.task_idx, self.idx)
    }

    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    pub fn task_idx(&self) -> u32 {
        self.task_idx
    }

    pub fn idx(&self) -> u32 {
        self.idx
    }

    pub fn data(&self) -> &Payload {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Payload {
        &mut self.data
    }

    /// Move the payload out, leaving an empty vector behind.
    pub fn take_data(&mut self) -> Payload {
        std::mem::take(&mut self.data)
    }

    pub fn replace_data(&mut self, data: Payload) -> Payload {
        std::mem::replace(&mut self.data, data)
    }
}

impl PartialEq for Fraction {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Fraction {}

// ---------------------------------------------------------------------------
// Task – one schedulable unit, holding one or more fractions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Task {
    job_id: u64,
    idx: u32,
    fractions: BTreeMap<u32, Fraction>,
}

impl Task {
    pub fn new(job_id: u64, idx: u32) -> Self {
        Task {
            job_id,
            idx,
            fractions: BTreeMap::new(),
        }
    }

    /// A task holding its whole series as fraction 0.
    pub fn unsliced(job_id: u64, idx: u32, data: Payload) -> Self {
        let mut task = Task::new(job_id, idx);
        task.insert_fraction(0, data);
        task
    }

    pub fn id(&self) -> EntityId {
        EntityId::Task(self.job_id, self.idx)
    }

    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    pub fn idx(&self) -> u32 {
        self.idx
    }

    /// Insert (or overwrite) fraction `idx`, stamping it with this task's identity.
    pub fn insert_fraction(&mut self, idx: u32, data: Payload) {
        self.fractions
            .insert(idx, Fraction::new(self.job_id, self.idx, idx, data));
    }

    pub fn fraction(&self, idx: u32) -> Result<&Fraction> {
        self.fractions
            .get(&idx)
            .ok_or(Error::NotFound(EntityId::Fraction(self.job_id, self.idx, idx)))
    }

    pub fn fraction_mut(&mut self, idx: u32) -> Result<&mut Fraction> {
        let id = EntityId::Fraction(self.job_id, self.idx, idx);
        self.fractions.get_mut(&idx).ok_or(Error::NotFound(id))
    }

    pub fn fractions(&self) -> impl Iterator<Item = &Fraction> {
        self.fractions.values()
    }

    pub fn fractions_mut(&mut self) -> impl Iterator<Item = &mut Fraction> {
        self.fractions.values_mut()
    }

    pub fn fraction_idxs(&self) -> Vec<u32> {
        self.fractions.keys().copied().collect()
    }

    pub fn fraction_count(&self) -> usize {
        self.fractions.len()
    }

    /// Whether the task still holds a single contiguous series.
    pub fn is_unsliced(&self) -> bool {
        self.fractions.len() == 1 && self.fractions.contains_key(&0)
    }

    /// Payload of the single fraction of an unsliced task.
    pub fn series(&self) -> Option<&Payload> {
        if self.is_unsliced() {
            self.fractions.get(&0).map(Fraction::data)
        } else {
            None
        }
    }

    pub fn series_mut(&mut self) -> Option<&mut Payload> {
        if self.is_unsliced() {
            self.fractions.get_mut(&0).map(Fraction::data_mut)
        } else {
            None
        }
    }

    /// Replace the whole fraction mapping with `parts`, indexed from 0.
    pub fn replace_fractions(&mut self, parts: Vec<Payload>) {
        let fractions = parts
            .into_iter()
            .enumerate()
            .map(|(i, data)| {
                let idx = i as u32;
                (idx, Fraction::new(self.job_id, self.idx, idx, data))
            })
            .collect();
        self.fractions = fractions;
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Task {}

// ---------------------------------------------------------------------------
// Job – a workload submission
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Job {
    id: u64,
    tasks: BTreeMap<u32, Task>,
}

impl Job {
    pub fn new(id: u64) -> Self {
        Job {
            id,
            tasks: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn entity_id(&self) -> EntityId {
        EntityId::Job(self.id)
    }

    /// Insert a task. Its job id is taken from the task itself and must match.
    pub fn insert_task(&mut self, task: Task) -> Result<()> {
        if task.job_id != self.id {
            return Err(Error::invalid(
                "task",
                format!("task {} does not belong to job {}", task.id(), self.id),
            ));
        }
        self.tasks.insert(task.idx, task);
        Ok(())
    }

    /// Get or create task `idx`.
    pub fn task_entry(&mut self, idx: u32) -> &mut Task {
        let job_id = self.id;
        self.tasks
            .entry(idx)
            .or_insert_with(|| Task::new(job_id, idx))
    }

    pub fn task(&self, idx: u32) -> Result<&Task> {
        self.tasks
            .get(&idx)
            .ok_or(Error::NotFound(EntityId::Task(self.id, idx)))
    }

    pub fn task_mut(&mut self, idx: u32) -> Result<&mut Task> {
        let id = EntityId::Task(self.id, idx);
        self.tasks.get_mut(&idx).ok_or(Error::NotFound(id))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.values_mut()
    }

    pub fn task_idxs(&self) -> Vec<u32> {
        self.tasks.keys().copied().collect()
    }

    pub fn fraction(&self, task_idx: u32, fraction_idx: u32) -> Result<&Fraction> {
        self.task(task_idx)?.fraction(fraction_idx)
    }

    pub fn fractions(&self) -> impl Iterator<Item = &Fraction> {
        self.tasks.values().flat_map(Task::fractions)
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

// ---------------------------------------------------------------------------
// Input – the complete trace tree
// ---------------------------------------------------------------------------

/// Root of the hierarchy. Owns every job, task and fraction beneath it.
#[derive(Debug, Clone, Default)]
pub struct Input {
    jobs: BTreeMap<u64, Job>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_job(&mut self, job: Job) {
        self.jobs.insert(job.id, job);
    }

    /// Get or create job `id`.
    pub fn job_entry(&mut self, id: u64) -> &mut Job {
        self.jobs.entry(id).or_insert_with(|| Job::new(id))
    }

    pub fn job(&self, id: u64) -> Result<&Job> {
        self.jobs.get(&id).ok_or(Error::NotFound(EntityId::Job(id)))
    }

    pub fn job_mut(&mut self, id: u64) -> Result<&mut Job> {
        self.jobs
            .get_mut(&id)
            .ok_or(Error::NotFound(EntityId::Job(id)))
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn jobs_mut(&mut self) -> impl Iterator<Item = &mut Job> {
        self.jobs.values_mut()
    }

    pub fn job_ids(&self) -> Vec<u64> {
        self.jobs.keys().copied().collect()
    }

    pub fn task(&self, job_id: u64, task_idx: u32) -> Result<&Task> {
        self.job(job_id)?.task(task_idx)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.jobs.values().flat_map(Job::tasks)
    }

    pub fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.jobs.values_mut().flat_map(Job::tasks_mut)
    }

    pub fn task_ids(&self) -> Vec<EntityId> {
        self.tasks().map(Task::id).collect()
    }

    pub fn fraction(&self, job_id: u64, task_idx: u32, fraction_idx: u32) -> Result<&Fraction> {
        self.job(job_id)?.fraction(task_idx, fraction_idx)
    }

    pub fn fractions(&self) -> impl Iterator<Item = &Fraction> {
        self.tasks().flat_map(Task::fractions)
    }

    pub fn fractions_mut(&mut self) -> impl Iterator<Item = &mut Fraction> {
        self.tasks_mut().flat_map(Task::fractions_mut)
    }

    pub fn fraction_ids(&self) -> Vec<EntityId> {
        self.fractions().map(Fraction::id).collect()
    }

    /// Payload of any entity; jobs have none.
    pub fn payload(&self, id: EntityId) -> Result<Option<&Payload>> {
        match id {
            EntityId::Job(j) => self.job(j).map(|_| None),
            EntityId::Task(j, t) => Ok(self.task(j, t)?.series()),
            EntityId::Fraction(j, t, i) => Ok(Some(self.fraction(j, t, i)?.data())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> Input {
        let mut input = Input::new();
        for job_id in [3u64, 1] {
            let job = input.job_entry(job_id);
            for t in 0..2 {
                job.task_entry(t)
                    .insert_fraction(0, Payload::Vector(vec![t as f64]));
            }
        }
        input
    }

    #[test]
    fn lookup_fails_for_absent_ids() {
        let input = input();
        assert!(input.job(1).is_ok());
        assert!(matches!(input.job(2), Err(Error::NotFound(EntityId::Job(2)))));
        assert!(matches!(
            input.fraction(1, 0, 4),
            Err(Error::NotFound(EntityId::Fraction(1, 0, 4)))
        ));
    }

    #[test]
    fn iteration_is_restartable_and_complete() {
        let input = input();
        assert_eq!(input.tasks().count(), 4);
        assert_eq!(input.tasks().count(), 4);
        assert_eq!(
            input.fraction_ids(),
            vec![
                EntityId::Fraction(1, 0, 0),
                EntityId::Fraction(1, 1, 0),
                EntityId::Fraction(3, 0, 0),
                EntityId::Fraction(3, 1, 0),
            ]
        );
    }

    #[test]
    fn equality_ignores_payload() {
        let a = Fraction::new(1, 0, 0, Payload::Vector(vec![1.0]));
        let b = Fraction::new(1, 0, 0, Payload::Vector(vec![2.0]));
        let c = Fraction::new(1, 0, 1, Payload::Vector(vec![1.0]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn replace_fractions_reindexes_from_zero() {
        let mut task = Task::unsliced(5, 2, Payload::Vector(vec![1.0, 2.0, 3.0]));
        assert!(task.is_unsliced());
        task.replace_fractions(vec![
            Payload::Vector(vec![1.0, 2.0]),
            Payload::Vector(vec![3.0]),
        ]);
        assert_eq!(task.fraction_idxs(), vec![0, 1]);
        assert!(!task.is_unsliced());
        assert!(task.series().is_none());
        assert_eq!(task.fraction(1).unwrap().id(), EntityId::Fraction(5, 2, 1));
    }

    #[test]
    fn entity_id_display_and_serialize() {
        assert_eq!(EntityId::Task(7, 0).to_string(), "7-0");
        let json = serde_json::to_string(&EntityId::Fraction(7, 0, 3)).unwrap();
        assert_eq!(json, "\"7-0-3\"");
    }

    #[test]
    fn insert_task_rejects_foreign_task() {
        let mut job = Job::new(1);
        assert!(job.insert_task(Task::new(2, 0)).is_err());
        assert!(job.insert_task(Task::new(1, 0)).is_ok());
    }

    #[test]
    fn entity_id_parses_display_form() {
        for id in [EntityId::Job(7), EntityId::Task(7, 0), EntityId::Fraction(7, 0, 3)] {
            assert_eq!(id.to_string().parse::<EntityId>().unwrap(), id);
        }
        assert!("7-x".parse::<EntityId>().is_err());
        assert!("1-2-3-4".parse::<EntityId>().is_err());
    }
}
