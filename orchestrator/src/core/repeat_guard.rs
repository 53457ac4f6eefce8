//! Consecutive-repeat detection for extracted commands.

/// Decision for one extracted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    /// The command may run.
    Proceed,
    /// The command has now been seen `occurrences` times in a row and must not run.
    Tripped { occurrences: u32 },
}

/// Tracks the previous command and how many times it repeated back to back.
///
/// State spans the whole run. Only successfully extracted commands are
/// observed, so a parse failure between two identical commands does not
/// break the streak.
#[derive(Debug, Clone)]
pub struct RepeatGuard {
    max_repeat: u32,
    last_command: Option<String>,
    consecutive_repeats: u32,
}

impl RepeatGuard {
    /// `max_repeat` is the number of identical consecutive commands that stops the run.
    pub fn new(max_repeat: u32) -> Self {
        Self {
            max_repeat,
            last_command: None,
            consecutive_repeats: 0,
        }
    }

    /// Record `command` and decide whether it may execute.
    pub fn observe(&mut self, command: &str) -> GuardVerdict {
        if self.last_command.as_deref() == Some(command) {
            self.consecutive_repeats += 1;
        } else {
            self.consecutive_repeats = 0;
            self.last_command = Some(command.to_string());
        }

        if self.consecutive_repeats + 1 >= self.max_repeat {
            GuardVerdict::Tripped {
                occurrences: self.consecutive_repeats + 1,
            }
        } else {
            GuardVerdict::Proceed
        }
    }

    pub fn last_command(&self) -> Option<&str> {
        self.last_command.as_deref()
    }

    pub fn consecutive_repeats(&self) -> u32 {
        self.consecutive_repeats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_on_third_identical_command_with_threshold_three() {
        let mut guard = RepeatGuard::new(3);
        assert_eq!(guard.observe("ls"), GuardVerdict::Proceed);
        assert_eq!(guard.observe("ls"), GuardVerdict::Proceed);
        assert_eq!(
            guard.observe("ls"),
            GuardVerdict::Tripped { occurrences: 3 }
        );
        assert_eq!(guard.consecutive_repeats(), 2);
    }

    #[test]
    fn different_command_resets_counter() {
        let mut guard = RepeatGuard::new(3);
        guard.observe("ls");
        guard.observe("ls");
        assert_eq!(guard.observe("pwd"), GuardVerdict::Proceed);
        assert_eq!(guard.consecutive_repeats(), 0);
        assert_eq!(guard.last_command(), Some("pwd"));
        assert_eq!(guard.observe("ls"), GuardVerdict::Proceed);
        assert_eq!(guard.observe("ls"), GuardVerdict::Proceed);
    }

    #[test]
    fn threshold_two_trips_on_first_repeat() {
        let mut guard = RepeatGuard::new(2);
        assert_eq!(guard.observe("id"), GuardVerdict::Proceed);
        assert_eq!(
            guard.observe("id"),
            GuardVerdict::Tripped { occurrences: 2 }
        );
    }

    #[test]
    fn comparison_is_exact() {
        let mut guard = RepeatGuard::new(2);
        guard.observe("ls -la");
        assert_eq!(guard.observe("ls  -la"), GuardVerdict::Proceed);
    }
}
