//! Loading scorer input: a run directory or a JSONL file.

use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use orchestrator::io::event_log::read_jsonl;
use orchestrator::io::run_dir::resolve_events_path;

/// Every parseable JSON line of the events file, plus warnings for skipped lines.
pub fn load_event_values(path: &Path) -> Result<(Vec<Value>, Vec<String>)> {
    read_jsonl(&resolve_events_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_run_directory_and_skips_bad_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("events.jsonl"),
            "{\"command\": \"ls\"}\n{broken\n\n[1, 2]\n",
        )
        .expect("write");

        let (values, warnings) = load_event_values(temp.path()).expect("load");
        assert_eq!(values.len(), 2);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn reads_direct_file_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("other.jsonl");
        fs::write(&path, "{\"post\": \"x\"}\n").expect("write");

        let (values, _) = load_event_values(&path).expect("load");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load_event_values(temp.path()).is_err());
    }
}
