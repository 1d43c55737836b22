//! Reconciliation of on-disk inventory against the metadata store.

use crate::error::SweepError;
use crate::storage::StorageFs;
use crate::store::{CopyFilter, MetadataStore, RunQuery};
use std::path::Path;
use tracing::{debug, info, warn};

/// Shortest run id written to disk; larger numbers grow past it.
const MIN_RUN_ID_LEN: usize = 6;

/// Run id prefix of an on-disk entry name, e.g. `000777` for
/// `000777-raw_records-rfzvpzj4mf` and `1234567` for `1234567-peaklets`.
///
/// The whole leading digit run is the id, so a seven-digit run is never
/// mistaken for the six-digit run sharing its first digits.
pub fn derive_run_id(name: &str) -> Option<&str> {
    let len = name.bytes().take_while(u8::is_ascii_digit).count();
    (len >= MIN_RUN_ID_LEN).then(|| &name[..len])
}

/// Distinct run ids found directly under `root`, sorted.
pub async fn list_run_ids(fs: &dyn StorageFs, root: &Path) -> Result<Vec<String>, SweepError> {
    let mut ids: Vec<String> = fs
        .list_dir(root)
        .await?
        .iter()
        .filter_map(|path| path.file_name())
        .filter_map(|name| {
            let name = name.to_string_lossy();
            let id = derive_run_id(&name).map(str::to_owned);
            if id.is_none() {
                debug!(entry = %name, "ignoring entry without run id prefix");
            }
            id
        })
        .collect();
    ids.dedup();
    Ok(ids)
}

/// Run ids under `root` with no active copy registered on `designation`.
pub async fn scan_unregistered(
    fs: &dyn StorageFs,
    store: &dyn MetadataStore,
    root: &Path,
    designation: &str,
) -> Result<Vec<String>, SweepError> {
    let mut unregistered = Vec::new();
    for run_id in list_run_ids(fs, root).await? {
        let Ok(number) = run_id.parse::<u32>() else {
            continue;
        };
        let query = RunQuery::for_run(number).with_active_copy(CopyFilter::on_host(designation));
        if store.find_run(&query).await?.is_none() {
            info!(run = %run_id, root = %root.display(), "found unregistered data");
            unregistered.push(run_id);
        }
    }
    Ok(unregistered)
}

/// Removes every entry under `root` whose derived run id is `run_id`.
///
/// Does not check registration: callers must have established through
/// [`scan_unregistered`] that nothing in the store points here.
pub async fn purge_unregistered(
    fs: &dyn StorageFs,
    root: &Path,
    run_id: &str,
) -> Result<usize, SweepError> {
    let matching: Vec<_> = fs
        .list_dir(root)
        .await?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| derive_run_id(&name.to_string_lossy()) == Some(run_id))
        })
        .collect();

    if matching.is_empty() {
        warn!(run = %run_id, root = %root.display(), "nothing to delete for unregistered run");
        return Err(SweepError::NothingToDelete {
            root: root.to_path_buf(),
            run_id: run_id.to_string(),
        });
    }

    for path in &matching {
        fs.remove_all(path).await?;
        info!(run = %run_id, location = %path.display(), "purged unregistered data");
    }
    Ok(matching.len())
}
