//! Schema versioning for the LMDB environment.
//!
//! The meta database records which layout the environment was written with.
//! Opening an older environment applies each upgrade step in order; opening a
//! newer one fails, since this build cannot read it.

use crate::{LmdbError, LmdbStore};

/// Layout written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// One upgrade from `version - 1` to `version`.
struct Step {
    version: u32,
    name: &'static str,
    apply: fn(&LmdbStore) -> Result<(), LmdbError>,
}

const STEPS: &[Step] = &[Step {
    version: 1,
    name: "cursor, subscriptions and length-prefixed ledger keys",
    apply: |_| Ok(()),
}];

/// Bring `store` up to [`CURRENT_SCHEMA_VERSION`]. Returns the number of
/// steps applied; zero for an environment that is already current.
pub fn migrate(store: &LmdbStore) -> Result<usize, LmdbError> {
    let found = store.schema_version()?;
    if found > CURRENT_SCHEMA_VERSION {
        return Err(LmdbError::Schema(format!(
            "environment has schema v{found}, this build reads up to v{CURRENT_SCHEMA_VERSION}"
        )));
    }

    let pending = pending_steps(found)?;
    for step in pending {
        tracing::info!(to = step.version, step = step.name, "applying schema step");
        (step.apply)(store)?;
        store.set_schema_version(step.version)?;
    }
    if pending.is_empty() {
        tracing::debug!(version = found, "schema current");
    }
    Ok(pending.len())
}

/// Steps needed to go from `found` to the current version, checked to be
/// contiguous.
fn pending_steps(found: u32) -> Result<&'static [Step], LmdbError> {
    let start = STEPS
        .iter()
        .position(|s| s.version > found)
        .unwrap_or(STEPS.len());
    let pending = &STEPS[start..];

    let mut expected = found + 1;
    for step in pending {
        if step.version != expected {
            return Err(LmdbError::Schema(format!(
                "no upgrade path from v{} to v{}",
                expected - 1,
                step.version
            )));
        }
        expected += 1;
    }
    Ok(pending)
}
