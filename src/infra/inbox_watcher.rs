use crate::app::ports::{DocumentSourcePort, LocatedDocument};
use crate::constants::ACCEPTED_EXTENSIONS;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Inbox folder scanner. A scanned document is moved to the processed folder
/// before it is handed out so a second scan cannot pick it up again.
pub struct InboxWatcher {
    incoming_dir: PathBuf,
    processed_dir: PathBuf,
}

impl InboxWatcher {
    pub fn new(incoming_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            incoming_dir: incoming_dir.into(),
            processed_dir: processed_dir.into(),
        }
    }

    fn ensure_dirs(&self) -> Result<(), String> {
        for dir in [&self.incoming_dir, &self.processed_dir] {
            fs::create_dir_all(dir).map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
        }
        Ok(())
    }

    fn resolve_requested(&self, name: &str) -> Result<Option<LocatedDocument>, String> {
        // Only bare file names; a request must not escape the inbox
        let file_name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format!("invalid document name '{}'", name))?;
        let path = self.incoming_dir.join(file_name);
        if !path.is_file() {
            return Err(format!("Document not found: {}", path.display()));
        }
        Ok(Some(LocatedDocument {
            path,
            name: file_name.to_string(),
        }))
    }

    fn scan(&self) -> Result<Option<LocatedDocument>, String> {
        let mut candidates: Vec<PathBuf> = fs::read_dir(&self.incoming_dir)
            .map_err(|e| format!("cannot read {}: {}", self.incoming_dir.display(), e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_accepted_extension(p))
            .collect();
        candidates.sort();

        let Some(source) = candidates.into_iter().next() else {
            return Ok(None);
        };
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| format!("unreadable file name: {}", source.display()))?;

        let mut dest = self.processed_dir.join(&name);
        if dest.exists() {
            let short = Uuid::new_v4().simple().to_string();
            dest = self.processed_dir.join(format!("{}_{}", &short[..8], name));
        }
        fs::rename(&source, &dest)
            .map_err(|e| format!("cannot move {} to {}: {}", source.display(), dest.display(), e))?;
        tracing::info!("Claimed {} -> {}", source.display(), dest.display());

        Ok(Some(LocatedDocument { path: dest, name }))
    }
}

impl DocumentSourcePort for InboxWatcher {
    fn locate(&self, requested: Option<&str>) -> Result<Option<LocatedDocument>, String> {
        self.ensure_dirs()?;
        match requested {
            Some(name) => self.resolve_requested(name),
            None => self.scan(),
        }
    }
}

fn has_accepted_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ACCEPTED_EXTENSIONS.iter().any(|ok| e.eq_ignore_ascii_case(ok)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn watcher(root: &Path) -> InboxWatcher {
        InboxWatcher::new(root.join("incoming"), root.join("processed"))
    }

    #[test]
    fn empty_inbox_finds_nothing() {
        let dir = tempdir().unwrap();
        assert_eq!(watcher(dir.path()).locate(None).unwrap(), None);
    }

    #[test]
    fn scan_claims_first_document_and_skips_other_files() {
        let dir = tempdir().unwrap();
        let w = watcher(dir.path());
        w.ensure_dirs().unwrap();
        let incoming = dir.path().join("incoming");
        fs::write(incoming.join("notes.txt"), "x").unwrap();
        fs::write(incoming.join("b.PDF"), "b").unwrap();
        fs::write(incoming.join("a.png"), "a").unwrap();

        let found = w.locate(None).unwrap().unwrap();
        assert_eq!(found.name, "a.png");
        assert_eq!(found.path, dir.path().join("processed").join("a.png"));
        assert!(found.path.exists());
        assert!(!incoming.join("a.png").exists());

        let next = w.locate(None).unwrap().unwrap();
        assert_eq!(next.name, "b.PDF");
        assert_eq!(w.locate(None).unwrap(), None);
    }

    #[test]
    fn name_collision_in_processed_gets_prefix() {
        let dir = tempdir().unwrap();
        let w = watcher(dir.path());
        w.ensure_dirs().unwrap();
        fs::write(dir.path().join("processed").join("inv.pdf"), "old").unwrap();
        fs::write(dir.path().join("incoming").join("inv.pdf"), "new").unwrap();

        let found = w.locate(None).unwrap().unwrap();
        assert_eq!(found.name, "inv.pdf");
        let stored = found.path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(stored.ends_with("_inv.pdf"));
        assert_eq!(fs::read_to_string(&found.path).unwrap(), "new");
    }

    #[test]
    fn requested_document_is_resolved_in_place() {
        let dir = tempdir().unwrap();
        let w = watcher(dir.path());
        w.ensure_dirs().unwrap();
        fs::write(dir.path().join("incoming").join("inv.pdf"), "x").unwrap();

        let found = w.locate(Some("inv.pdf")).unwrap().unwrap();
        assert_eq!(found.path, dir.path().join("incoming").join("inv.pdf"));
        assert!(w.locate(Some("missing.pdf")).unwrap_err().contains("Document not found"));
    }
}
