use watch_logging::{watch_debug, watch_error, watch_info};

use crate::{ChangeEvent, GradeRecord, GradeStore, PersistedGradeEntry, PersistenceError};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation {
    /// Change events in input order.
    pub events: Vec<ChangeEvent>,
    /// The store was empty when the pass started; inserts were not announced.
    pub first_run: bool,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Records skipped because a store operation failed.
    pub failed: usize,
}

/// Applies freshly parsed records to the store and reports what changed.
///
/// Only the initial `count` is fatal. A failing lookup, insert or update skips
/// that record and the pass continues with the next one.
pub fn reconcile(
    records: &[GradeRecord],
    store: &mut dyn GradeStore,
    now: &str,
) -> Result<Reconciliation, PersistenceError> {
    let first_run = store.count()? == 0;
    let mut outcome = Reconciliation {
        first_run,
        ..Reconciliation::default()
    };

    if first_run {
        watch_info!("Store is empty; performing initial silent sync");
    }

    for record in records {
        let existing = match store.find(&record.module, record.occurrence_index) {
            Ok(existing) => existing,
            Err(err) => {
                watch_error!(
                    "Lookup failed for {} (#{}): {}",
                    record.module,
                    record.occurrence_index,
                    err
                );
                outcome.failed += 1;
                continue;
            }
        };

        match existing {
            None => {
                let entry = PersistedGradeEntry::from_record(record, now);
                if let Err(err) = store.insert(&entry) {
                    watch_error!(
                        "Insert failed for {} (#{}): {}",
                        record.module,
                        record.occurrence_index,
                        err
                    );
                    outcome.failed += 1;
                    continue;
                }
                outcome.inserted += 1;
                if first_run {
                    watch_debug!(
                        "Silently adding initial grade: {} - {}",
                        record.module,
                        record.grade
                    );
                } else {
                    outcome.events.push(ChangeEvent::Created {
                        module: record.module.clone(),
                        occurrence_index: record.occurrence_index,
                        grade: record.grade.clone(),
                    });
                }
            }
            Some(entry) if entry.grade != record.grade => {
                if let Err(err) =
                    store.update(&record.module, record.occurrence_index, &record.grade, now)
                {
                    watch_error!(
                        "Update failed for {} (#{}): {}",
                        record.module,
                        record.occurrence_index,
                        err
                    );
                    outcome.failed += 1;
                    continue;
                }
                outcome.updated += 1;
                outcome.events.push(ChangeEvent::Updated {
                    module: record.module.clone(),
                    occurrence_index: record.occurrence_index,
                    previous_grade: entry.grade,
                    grade: record.grade.clone(),
                });
            }
            Some(_) => outcome.unchanged += 1,
        }
    }

    if first_run {
        watch_info!(
            "Initial silent sync complete ({} grades); notifications enabled from now on",
            outcome.inserted
        );
    }

    Ok(outcome)
}
