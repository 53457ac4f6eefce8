//! Rolling run transcript (`context.txt`), read by proposal sources.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEntry {
    Pre {
        step: u32,
        plan: String,
        command: String,
        exit_code: i32,
        /// Already truncated to the context limit.
        stdout: String,
    },
    Post {
        step: u32,
        post: String,
    },
}

impl ContextEntry {
    pub fn render(&self) -> String {
        match self {
            ContextEntry::Pre {
                step,
                plan,
                command,
                exit_code,
                stdout,
            } => format!(
                "## Step {step} (pre)\n{}\n\n$ {command}\nexit_code: {exit_code}\nstdout:\n{}\n\n",
                plan.trim_end(),
                stdout.trim_end()
            ),
            ContextEntry::Post { step, post } => {
                format!("## Step {step} (post)\n{}\n\n", post.trim_end())
            }
        }
    }
}

/// Append-only transcript owned by the loop.
///
/// Entries are kept in memory for the proposal source and mirrored to an
/// optional file. The file is a side channel: a failed write is reported to
/// the caller but the in-memory entry is kept.
#[derive(Debug, Clone)]
pub struct RunContext {
    entries: Vec<ContextEntry>,
    path: Option<PathBuf>,
    stdout_limit: usize,
}

impl RunContext {
    pub fn new(path: Option<PathBuf>, stdout_limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            path,
            stdout_limit,
        }
    }

    /// In-memory only context, used before a run directory exists.
    pub fn detached(stdout_limit: usize) -> Self {
        Self::new(None, stdout_limit)
    }

    pub fn record_pre(
        &mut self,
        step: u32,
        plan: &str,
        command: &str,
        exit_code: i32,
        stdout: &str,
    ) -> Result<()> {
        self.push(ContextEntry::Pre {
            step,
            plan: plan.to_string(),
            command: command.to_string(),
            exit_code,
            stdout: truncate_chars(stdout, self.stdout_limit),
        })
    }

    pub fn record_post(&mut self, step: u32, post: &str) -> Result<()> {
        self.push(ContextEntry::Post {
            step,
            post: post.to_string(),
        })
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    /// Full transcript in recording order.
    pub fn transcript(&self) -> String {
        self.entries.iter().map(ContextEntry::render).collect()
    }

    fn push(&mut self, entry: ContextEntry) -> Result<()> {
        let rendered = entry.render();
        self.entries.push(entry);
        match &self.path {
            Some(path) => append_text(path, &rendered),
            None => Ok(()),
        }
    }
}

fn append_text(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open context {}", path.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("append to context {}", path.display()))
}

/// Keep the first `limit` characters, marking how many were dropped.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    let total = text.chars().count();
    if total <= limit {
        return text.to_string();
    }
    let mut kept: String = text.chars().take(limit).collect();
    kept.push_str(&format!("...[truncated {} chars]", total - limit));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn truncation_marks_dropped_characters() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdefgh", 3), "abc...[truncated 5 chars]");
        assert_eq!(truncate_chars("ééééé", 2), "éé...[truncated 3 chars]");
    }

    #[test]
    fn entries_are_mirrored_to_file_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("context.txt");
        let mut context = RunContext::new(Some(path.clone()), 100);

        context
            .record_pre(1, "<Command>\nls", "ls", 0, "a\nb\n")
            .expect("pre");
        context.record_post(1, "<Observation>\ntwo files").expect("post");

        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents, context.transcript());
        let pre_at = contents.find("## Step 1 (pre)").expect("pre header");
        let post_at = contents.find("## Step 1 (post)").expect("post header");
        assert!(pre_at < post_at);
        assert!(contents.contains("$ ls\nexit_code: 0\nstdout:\na\nb\n"));
    }

    #[test]
    fn failed_file_write_keeps_memory_entry() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("missing-dir").join("context.txt");
        let mut context = RunContext::new(Some(path), 100);

        let err = context.record_post(2, "noted").unwrap_err();
        assert!(err.to_string().contains("context"));
        assert_eq!(context.entries().len(), 1);
        assert!(context.transcript().contains("noted"));
    }

    #[test]
    fn stdout_is_truncated_in_pre_entries() {
        let mut context = RunContext::detached(4);
        context
            .record_pre(1, "plan", "cat big", 0, "0123456789")
            .expect("pre");
        assert!(
            context
                .transcript()
                .contains("0123...[truncated 6 chars]")
        );
    }
}
