//! Run reconciliation: classify the latest mining run and fold it into the
//! cumulative success set.
//!
//! Classification is structural on [`DeadlineOutcome`]: a result is a failure
//! iff its outcome is `NoPage`, `NoDates`, or `FetchFailed`; everything that
//! decoded as `Found` is a success, including low-confidence text. Upserts
//! are last-run-wins; there is no mechanism to keep a historically better
//! answer over a newer worse one.
//!
//! After the upsert, the retry list is always recomputed as the set
//! difference `universe − keys(store)`, so for every entity exactly one of
//! "in the success set" / "on the retry list" holds.

use crate::models::{normalize, DeadlineResult, NormalizedKey};
use itertools::Itertools;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Cumulative success set, keyed by normalized entity identity.
///
/// Grows monotonically across runs via upsert; written out sorted by
/// university display name.
pub type SuccessStore = BTreeMap<NormalizedKey, DeadlineResult>;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub store: SuccessStore,
    /// Display names still unresolved, sorted and deduplicated.
    pub retry: Vec<String>,
}

/// Fold the latest run into the success store and recompute the retry list.
///
/// `universe` is the full set of known entity names; `latest` is the run
/// being reconciled; `store` is any previously persisted success set.
#[instrument(level = "info", skip_all, fields(universe = universe.len(), latest = latest.len()))]
pub fn reconcile(
    universe: &[String],
    latest: &[DeadlineResult],
    mut store: SuccessStore,
) -> Reconciliation {
    let prior = store.len();
    let mut merged = 0usize;

    for result in latest {
        if !result.outcome.is_success() {
            debug!(university = %result.university, "Failure in latest run; left for retry");
            continue;
        }
        // Insert-or-replace: a fresh success supersedes any prior record
        // under the same normalized key.
        store.insert(normalize(&result.university), result.clone());
        merged += 1;
    }

    let retry: Vec<String> = universe
        .iter()
        .filter(|name| !store.contains_key(&normalize(name)))
        .cloned()
        .sorted()
        .dedup()
        .collect();

    info!(
        prior_successes = prior,
        merged_successes = merged,
        total_successes = store.len(),
        to_retry = retry.len(),
        "Reconciled run"
    );

    Reconciliation { store, retry }
}
