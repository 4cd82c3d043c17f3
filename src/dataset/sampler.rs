// Sampling engine - distinct random draws from the dataset index
use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{DatasetEntry, DatasetIndex};

/// Draws up to `k` distinct entries, uniformly and without replacement.
///
/// Requests larger than the index return every entry; an empty index always
/// yields an empty sample.
pub fn sample_with<R: Rng + ?Sized>(entries: &[DatasetEntry], k: usize, rng: &mut R) -> Vec<DatasetEntry> {
    let n = entries.len();
    let wanted = k.min(n);
    if wanted == 0 {
        return Vec::new();
    }

    let mut used: HashSet<usize> = HashSet::with_capacity(wanted);
    let mut selected = Vec::with_capacity(wanted);

    // Rejection sampling; after `n` straight repeats give up and fill from what is left
    let mut misses = 0usize;
    while selected.len() < wanted && misses < n {
        let candidate = rng.gen_range(0..n);
        if used.insert(candidate) {
            selected.push(entries[candidate].clone());
            misses = 0;
        } else {
            misses += 1;
        }
    }

    if selected.len() < wanted {
        log::debug!(
            "Sampler hit its retry cap with {}/{} entries, filling from unused indices",
            selected.len(),
            wanted
        );
        let mut remaining: Vec<usize> = (0..n).filter(|i| !used.contains(i)).collect();
        remaining.shuffle(rng);
        selected.extend(
            remaining
                .into_iter()
                .take(wanted - selected.len())
                .map(|i| entries[i].clone()),
        );
    }

    selected
}

/// Sampler bound to one index snapshot
#[derive(Debug, Clone)]
pub struct Sampler {
    entries: Arc<[DatasetEntry]>,
}

impl Sampler {
    pub fn new(index: DatasetIndex) -> Self {
        Self {
            entries: index.snapshot(),
        }
    }

    pub fn population(&self) -> usize {
        self.entries.len()
    }

    /// Fresh, unseeded draw; successive calls are independent
    pub fn sample(&self, k: usize) -> Vec<DatasetEntry> {
        let mut rng = StdRng::from_entropy();
        sample_with(&self.entries, k, &mut rng)
    }

    /// Reproducible draw for a given seed
    pub fn sample_seeded(&self, k: usize, seed: u64) -> Vec<DatasetEntry> {
        let mut rng = StdRng::seed_from_u64(seed);
        sample_with(&self.entries, k, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use std::collections::HashSet;

    fn index_of(n: usize) -> DatasetIndex {
        DatasetIndex::from_entries(
            (0..n)
                .map(|i| DatasetEntry::new(format!("clip_{}.mp3", i), format!("sentence {}", i)))
                .collect(),
        )
    }

    fn ids(entries: &[DatasetEntry]) -> HashSet<String> {
        entries.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_sample_returns_distinct_members() {
        let index = index_of(50);
        let all = ids(index.entries());
        let sampler = Sampler::new(index);

        for seed in 0..20 {
            for k in [0, 1, 5, 49, 50] {
                let sample = sampler.sample_seeded(k, seed);
                assert_eq!(sample.len(), k);
                let distinct = ids(&sample);
                assert_eq!(distinct.len(), k);
                assert!(distinct.is_subset(&all));
            }
        }
    }

    #[test]
    fn test_request_larger_than_population_returns_everything() {
        let index = DatasetIndex::from_entries(vec![
            DatasetEntry::new("a", "hello"),
            DatasetEntry::new("b", "world"),
        ]);
        let sample = Sampler::new(index).sample(5);

        assert_eq!(sample.len(), 2);
        assert_eq!(ids(&sample), HashSet::from(["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_empty_index_yields_empty_sample() {
        let sampler = Sampler::new(DatasetIndex::empty());
        assert!(sampler.sample(0).is_empty());
        assert!(sampler.sample(5).is_empty());
    }

    #[test]
    fn test_degenerate_rng_still_terminates_with_full_count() {
        // Always yields the same value, so every draw after the first is a repeat
        let mut rng = StepRng::new(0, 0);
        let index = index_of(10);

        let sample = sample_with(index.entries(), 4, &mut rng);

        assert_eq!(sample.len(), 4);
        assert_eq!(ids(&sample).len(), 4);
    }

    #[test]
    fn test_seeded_samples_are_reproducible() {
        let sampler = Sampler::new(index_of(100));
        assert_eq!(sampler.sample_seeded(5, 42), sampler.sample_seeded(5, 42));
    }

    #[test]
    fn test_every_entry_gets_drawn_eventually() {
        let index = index_of(8);
        let sampler = Sampler::new(index.clone());
        let mut seen = HashSet::new();
        for seed in 0..200 {
            seen.extend(ids(&sampler.sample_seeded(2, seed)));
        }
        assert_eq!(seen, ids(index.entries()));
    }
}
