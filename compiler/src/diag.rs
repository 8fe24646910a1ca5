// diag.rs — Two-tier diagnostics model
//
// Every check in the binding layer yields a `Diagnostic` tagged with its
// origin (pipeline-author mistake vs. internal invariant violation) and its
// severity. Errors travel as `Err(Diagnostic)`; warnings are logged and
// queued for the driver. Whether an error terminates the process is decided
// by the caller (see `OrAbort`), never here.
//
// Preconditions: none.
// Postconditions: none (types and helpers only).
// Failure modes: none.
// Side effects: `warn` logs through `tracing` and appends to a thread-local
//   queue.

use std::cell::RefCell;
use std::fmt;
use std::panic::Location;

use crate::config;

// ── Origin and severity ─────────────────────────────────────────────────────

/// Who caused the condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Bad pipeline-author input.
    User,
    /// A broken invariant inside this crate.
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Check site ──────────────────────────────────────────────────────────────

/// Where inside the library a check tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSite {
    pub file: &'static str,
    pub line: u32,
}

impl fmt::Display for CheckSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

// ── Diagnostic ──────────────────────────────────────────────────────────────

/// A user or internal condition raised by the binding layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub origin: Origin,
    pub level: DiagLevel,
    pub message: String,
    pub check_site: CheckSite,
    /// Pipeline-author location that triggered the check, when attributable.
    pub source_location: Option<String>,
}

impl Diagnostic {
    /// Build a diagnostic, attributing it to the first caller outside a
    /// `#[track_caller]` chain.
    ///
    /// When that caller is the checking file itself, no author location is
    /// recorded.
    #[track_caller]
    pub fn new(
        origin: Origin,
        level: DiagLevel,
        message: impl Into<String>,
        file: &'static str,
        line: u32,
    ) -> Self {
        let caller = Location::caller();
        let source_location =
            (caller.file() != file).then(|| format!("{}:{}", caller.file(), caller.line()));
        let diag = Diagnostic {
            origin,
            level,
            message: message.into(),
            check_site: CheckSite { file, line },
            source_location,
        };
        if origin == Origin::User && config::debug_level() >= 1 {
            tracing::debug!(site = %diag.check_site, "user error triggered");
        }
        diag
    }

    /// Replace the author location (e.g. with a `line:col` in an interface
    /// file).
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.source_location = Some(location.into());
        self
    }

    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            Origin::User => {
                let label = match self.level {
                    DiagLevel::Error => "Error",
                    DiagLevel::Warning => "Warning",
                };
                match &self.source_location {
                    Some(loc) => write!(f, "{} at {}:\n{}", label, loc, self.message),
                    None => write!(f, "{}:\n{}", label, self.message),
                }
            }
            Origin::Internal => {
                let label = match self.level {
                    DiagLevel::Error => "error",
                    DiagLevel::Warning => "warning",
                };
                write!(f, "Internal {} at {}", label, self.check_site)?;
                match &self.source_location {
                    Some(loc) => write!(f, " triggered by user code at {}:\n{}", loc, self.message),
                    None => write!(f, "\n{}", self.message),
                }
            }
        }
    }
}

impl std::error::Error for Diagnostic {}

// ── Check macros ────────────────────────────────────────────────────────────

/// A user error diagnostic (bad pipeline-author input).
#[macro_export]
macro_rules! user_error {
    ($($arg:tt)*) => {
        $crate::diag::Diagnostic::new(
            $crate::diag::Origin::User,
            $crate::diag::DiagLevel::Error,
            format!($($arg)*),
            file!(),
            line!(),
        )
    };
}

/// A user warning diagnostic. Pass it to `diag::warn`.
#[macro_export]
macro_rules! user_warning {
    ($($arg:tt)*) => {
        $crate::diag::Diagnostic::new(
            $crate::diag::Origin::User,
            $crate::diag::DiagLevel::Warning,
            format!($($arg)*),
            file!(),
            line!(),
        )
    };
}

/// An internal error diagnostic (broken invariant in this crate).
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::diag::Diagnostic::new(
            $crate::diag::Origin::Internal,
            $crate::diag::DiagLevel::Error,
            format!($($arg)*),
            file!(),
            line!(),
        )
    };
}

/// Return a user error from the enclosing function unless `cond` holds.
#[macro_export]
macro_rules! user_assert {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::user_error!($($arg)*));
        }
    };
}

/// Return an internal error from the enclosing function unless `cond` holds.
#[macro_export]
macro_rules! internal_assert {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::internal_error!($($arg)*));
        }
    };
}

// ── Warning queue ───────────────────────────────────────────────────────────

thread_local! {
    static WARNINGS: RefCell<Vec<Diagnostic>> = const { RefCell::new(Vec::new()) };
}

/// Report a non-fatal condition. Logged immediately; queued for the driver.
pub fn warn(diag: Diagnostic) {
    tracing::warn!(origin = ?diag.origin, "{}", diag.message);
    WARNINGS.with(|w| w.borrow_mut().push(diag));
}

/// Drain warnings reported on this thread so far.
pub fn take_warnings() -> Vec<Diagnostic> {
    WARNINGS.with(|w| std::mem::take(&mut *w.borrow_mut()))
}

// ── Process termination ─────────────────────────────────────────────────────

/// Classic fail-fast handling: print the diagnostic and abort.
pub trait OrAbort<T> {
    fn or_abort(self) -> T;
}

impl<T> OrAbort<T> for Result<T, Diagnostic> {
    fn or_abort(self) -> T {
        match self {
            Ok(v) => v,
            Err(diag) => {
                eprintln!("{}", diag);
                std::process::abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(ok: bool) -> Result<u32, Diagnostic> {
        user_assert!(ok, "value {} rejected", 7);
        Ok(1)
    }

    fn internal_checked(ok: bool) -> Result<(), Diagnostic> {
        internal_assert!(ok, "table corrupted");
        Ok(())
    }

    #[test]
    fn user_assert_passes_through() {
        assert_eq!(checked(true), Ok(1));
    }

    #[test]
    fn user_assert_reports_message_and_origin() {
        let err = checked(false).unwrap_err();
        assert_eq!(err.origin, Origin::User);
        assert_eq!(err.level, DiagLevel::Error);
        assert_eq!(err.message, "value 7 rejected");
        assert!(err.check_site.file.ends_with("diag.rs"));
        // Raised and checked in the same file: no author location.
        assert_eq!(err.source_location, None);
    }

    #[test]
    fn display_user_error_without_location() {
        let err = checked(false).unwrap_err();
        assert_eq!(format!("{err}"), "Error:\nvalue 7 rejected");
    }

    #[test]
    fn display_user_warning_with_location() {
        let d = user_warning!("empty range").with_location("input.pif:3:1");
        assert_eq!(format!("{d}"), "Warning at input.pif:3:1:\nempty range");
    }

    #[test]
    fn display_internal_error_names_check_site() {
        let err = internal_checked(false).unwrap_err();
        let text = format!("{err}");
        assert!(text.starts_with("Internal error at "), "{text}");
        assert!(text.ends_with("\ntable corrupted"), "{text}");
        assert!(!err.is_user());
    }

    #[test]
    fn display_internal_error_with_author_location() {
        let d = internal_error!("bad dim").with_location("main.rs:10");
        let text = format!("{d}");
        assert!(text.contains(" triggered by user code at main.rs:10:\nbad dim"), "{text}");
    }

    #[test]
    fn warnings_are_queued_per_thread() {
        let _ = take_warnings();
        warn(user_warning!("first"));
        warn(user_warning!("second"));
        let drained = take_warnings();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].message, "second");
        assert!(take_warnings().is_empty());
    }

    #[test]
    fn or_abort_unwraps_success() {
        assert_eq!(checked(true).or_abort(), 1);
    }
}
