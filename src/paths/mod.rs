use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::catalog::ResourceEntry;
use crate::download::DownloadTask;
use crate::error::Error;

/// CDN host fronting the bundle files.
pub const CDN_HOST: &str = "ba.dn.nexoncdn.co.kr";

/// Path segment dropped when mapping a resource to local storage.
const STRIP_SEGMENT: &str = "GameData/iOS/";

/// Absolute URL a bundle is served from.
pub fn remote_url(base_path: &str, resource_path: &str) -> String {
    format!("https://{CDN_HOST}{base_path}/{resource_path}")
}

/// Local destination for a resource: the output directory joined with the
/// resource path minus every `GameData/iOS/` segment. A stripped path no
/// longer contains the segment, so re-applying the rule is a no-op.
pub fn local_path(out_dir: &Path, resource_path: &str) -> PathBuf {
    out_dir.join(resource_path.replace(STRIP_SEGMENT, ""))
}

/// Build one download task per selected entry.
///
/// Refuses destination collisions: two distinct resource paths mapping to
/// the same file would silently clobber each other, which can only mean the
/// manifest is malformed.
pub fn build_tasks(
    base_path: &str,
    out_dir: &Path,
    entries: &[ResourceEntry],
) -> Result<Vec<DownloadTask>, Error> {
    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(entries.len());
    for entry in entries {
        let dest = local_path(out_dir, &entry.resource_path);
        if !seen.insert(dest.clone()) {
            return Err(Error::Protocol(format!(
                "distinct resources map to the same local file {}",
                dest.display()
            )));
        }
        tasks.push(DownloadTask {
            remote_url: remote_url(base_path, &entry.resource_path),
            local_path: dest,
        });
    }
    Ok(tasks)
}
