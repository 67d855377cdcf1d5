//! Scripted in-memory provider for tests and demos.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{Cast, MetadataProvider, ProviderError, ProviderResult, Work};
use crate::graph::{PersonId, WorkId};

/// Per-operation call counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub resolve_person_id: usize,
    pub list_works_for_person: usize,
    pub resolve_work_id: usize,
    pub list_cast_for_work: usize,
    pub resolve_person_name: usize,
    /// `list_works_for_person` calls keyed by person
    pub works_by_person: HashMap<PersonId, usize>,
}

impl CallCounts {
    /// Total number of provider calls of any kind.
    pub fn total(&self) -> usize {
        self.resolve_person_id
            + self.list_works_for_person
            + self.resolve_work_id
            + self.list_cast_for_work
            + self.resolve_person_name
    }
}

#[derive(Debug, Clone)]
struct ScriptedWork {
    title: String,
    cast: Vec<PersonId>,
}

/// Provider backed by a fixed catalog of people and works.
///
/// Counts every call and can be told to fail: everything, the cast lookup of
/// specific works, or the work listing of specific people.
///
/// # Examples
///
/// ```
/// use sixdegrees::provider::InMemoryProvider;
///
/// let provider = InMemoryProvider::new()
///     .with_person(1, "A")
///     .with_person(2, "B")
///     .with_work(10, "W1", &[1, 2]);
/// assert_eq!(provider.calls().total(), 0);
/// ```
#[derive(Default)]
pub struct InMemoryProvider {
    people: BTreeMap<PersonId, String>,
    works: BTreeMap<WorkId, ScriptedWork>,
    latency: Option<Duration>,
    fail_all: bool,
    failing_casts: HashSet<WorkId>,
    failing_listings: Mutex<HashSet<PersonId>>,
    calls: Mutex<CallCounts>,
}

impl InMemoryProvider {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a person.
    pub fn with_person(mut self, id: u64, name: impl Into<String>) -> Self {
        self.people.insert(PersonId(id), name.into());
        self
    }

    /// Adds a work crediting `cast`.
    pub fn with_work(mut self, id: u64, title: impl Into<String>, cast: &[u64]) -> Self {
        self.works.insert(
            WorkId(id),
            ScriptedWork {
                title: title.into(),
                cast: cast.iter().copied().map(PersonId).collect(),
            },
        );
        self
    }

    /// Delays every call, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every call fail with a network error.
    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Makes the cast lookup of one work fail.
    pub fn with_failing_cast(mut self, work: u64) -> Self {
        self.failing_casts.insert(WorkId(work));
        self
    }

    /// Makes the work listing of one person fail until [`Self::heal_listing`].
    pub fn with_failing_listing(self, person: u64) -> Self {
        self.failing_listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(PersonId(person));
        self
    }

    /// Lets a previously failing work listing succeed.
    pub fn heal_listing(&self, person: u64) {
        self.failing_listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&PersonId(person));
    }

    /// Snapshot of the call counters.
    pub fn calls(&self) -> CallCounts {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn enter(&self, record: impl FnOnce(&mut CallCounts)) -> ProviderResult<()> {
        record(&mut self.calls.lock().unwrap_or_else(PoisonError::into_inner));
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_all {
            return Err(ProviderError::Network("provider offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataProvider for InMemoryProvider {
    async fn resolve_person_id(&self, name: &str) -> ProviderResult<Option<PersonId>> {
        self.enter(|c| c.resolve_person_id += 1).await?;
        let wanted = name.trim();
        Ok(self
            .people
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(wanted))
            .map(|(id, _)| *id))
    }

    async fn list_works_for_person(&self, person: PersonId) -> ProviderResult<Vec<Work>> {
        self.enter(|c| {
            c.list_works_for_person += 1;
            *c.works_by_person.entry(person).or_default() += 1;
        })
        .await?;
        let failing = self
            .failing_listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&person);
        if failing {
            return Err(ProviderError::Status {
                status: 503,
                body: format!("credits for {} unavailable", person),
            });
        }
        Ok(self
            .works
            .iter()
            .filter(|(_, w)| w.cast.contains(&person))
            .map(|(id, w)| Work {
                id: *id,
                title: w.title.clone(),
            })
            .collect())
    }

    async fn resolve_work_id(&self, title: &str) -> ProviderResult<Option<WorkId>> {
        self.enter(|c| c.resolve_work_id += 1).await?;
        Ok(self
            .works
            .iter()
            .find(|(_, w)| w.title == title)
            .map(|(id, _)| *id))
    }

    async fn list_cast_for_work(&self, work: WorkId) -> ProviderResult<Cast> {
        self.enter(|c| c.list_cast_for_work += 1).await?;
        if self.failing_casts.contains(&work) {
            return Err(ProviderError::Malformed(format!("no cast array for {}", work)));
        }
        let Some(scripted) = self.works.get(&work) else {
            return Ok(Cast::new());
        };
        Ok(scripted
            .cast
            .iter()
            .map(|id| {
                let name = self.people.get(id).cloned().unwrap_or_default();
                (*id, name)
            })
            .collect())
    }

    async fn resolve_person_name(&self, person: PersonId) -> ProviderResult<Option<String>> {
        self.enter(|c| c.resolve_person_name += 1).await?;
        Ok(self.people.get(&person).cloned())
    }
}
