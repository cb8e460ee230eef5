use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Convenient result alias for statetree_core.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Log/handling importance. Maps onto `tracing` levels in [`CoreError::log`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Where an error came from (helps triage and routing).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Domain {
    /// State definitions handed to the builder.
    Definition,
    /// Engine phase changes (start/stop/reset).
    Engine,
    /// Runtime transitions inside a started tree.
    Transition,
    /// Faults reported by states (re-entry, unhandled points...).
    Fault,
    Config,
    Other,
}

/// Stable error "kind" for matching/branching.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidState,
    InvalidTransition,
    UnknownState,
    ProtocolViolation,
    Other,
}

/// Optional structured payload for rich context without forcing allocation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Payload {
    None,

    /// Engine phase context: which command was refused in which phase.
    PhaseCommand { from_phase: u8, via_command: u8 },

    /// Fault context: reason id plus the offending state (debug-formatted).
    Fault { reason: u8, state: Cow<'static, str> },
}

/// The one error type that crosses module boundaries in statetree_core.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("{severity:?}: {message}")]
pub struct CoreError {
    pub domain: Domain,
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: Cow<'static, str>,
    pub payload: Payload,
}

impl CoreError {
    /// Fully-specified constructor (rarely needed at call sites).
    pub fn new(
        domain: Domain,
        kind: ErrorKind,
        severity: Severity,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            domain,
            kind,
            severity,
            message: message.into(),
            payload: Payload::None,
        }
    }

    // ---------------- Fluent entry points ----------------

    #[inline]
    pub fn trace() -> ErrB {
        ErrB::new(Severity::Trace)
    }
    #[inline]
    pub fn debug() -> ErrB {
        ErrB::new(Severity::Debug)
    }
    #[inline]
    pub fn info() -> ErrB {
        ErrB::new(Severity::Info)
    }
    #[inline]
    pub fn warn() -> ErrB {
        ErrB::new(Severity::Warn)
    }
    #[inline]
    pub fn error() -> ErrB {
        ErrB::new(Severity::Error)
    }
    #[inline]
    pub fn fatal() -> ErrB {
        ErrB::new(Severity::Fatal)
    }

    /// Replace the payload of an already-built error.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Construct an engine InvalidTransition error with structured context.
    pub fn invalid_phase_command(from_phase: u8, via_command: u8) -> Self {
        CoreError::warn()
            .domain(Domain::Engine)
            .kind(ErrorKind::InvalidTransition)
            .msg("command not allowed in the current engine phase")
            .payload(Payload::PhaseCommand {
                from_phase,
                via_command,
            })
            .build()
    }

    /// Construct the error returned when a key has no definition.
    pub fn unknown_state(state: impl fmt::Debug) -> Self {
        CoreError::error()
            .domain(Domain::Transition)
            .kind(ErrorKind::UnknownState)
            .msgf(format_args!("no state defined for key {state:?}"))
            .build()
    }

    /// Construct a definition error (broken state graph).
    pub fn invalid_definition(args: fmt::Arguments<'_>) -> Self {
        CoreError::error()
            .domain(Domain::Definition)
            .kind(ErrorKind::InvalidArgument)
            .msgf(args)
            .build()
    }

    /// Emit this error through `tracing` at the level matching its severity.
    pub fn log(&self) {
        match self.severity {
            Severity::Trace => tracing::trace!(domain = ?self.domain, kind = ?self.kind, "{}", self),
            Severity::Debug => tracing::debug!(domain = ?self.domain, kind = ?self.kind, "{}", self),
            Severity::Info => tracing::info!(domain = ?self.domain, kind = ?self.kind, "{}", self),
            Severity::Warn => tracing::warn!(domain = ?self.domain, kind = ?self.kind, "{}", self),
            Severity::Error | Severity::Fatal => {
                tracing::error!(domain = ?self.domain, kind = ?self.kind, "{}", self)
            }
        }
    }
}

/// Fluent builder that behaves like iterator chains (takes self, returns Self).
/// Defaults:
/// - domain = Other
/// - kind = Other
/// - message = ""
/// - payload = None
#[derive(Debug, Clone)]
pub struct ErrB {
    domain: Domain,
    kind: ErrorKind,
    severity: Severity,
    message: Cow<'static, str>,
    payload: Payload,
}

impl ErrB {
    #[inline]
    fn new(severity: Severity) -> Self {
        Self {
            domain: Domain::Other,
            kind: ErrorKind::Other,
            severity,
            message: Cow::Borrowed(""),
            payload: Payload::None,
        }
    }

    // -------- Guided setters --------

    /// Set/override the domain (defaults to Domain::Other).
    #[inline]
    pub fn domain(mut self, d: Domain) -> Self {
        self.domain = d;
        self
    }

    /// Set/override the kind (defaults to ErrorKind::Other).
    #[inline]
    pub fn kind(mut self, k: ErrorKind) -> Self {
        self.kind = k;
        self
    }

    /// Set/override the message (defaults to "").
    #[inline]
    pub fn msg(mut self, m: impl Into<Cow<'static, str>>) -> Self {
        self.message = m.into();
        self
    }

    /// Formatting-friendly message setter.
    /// Note: still allocates once because we store as Cow<'static, str>.
    #[inline]
    pub fn msgf(mut self, args: fmt::Arguments<'_>) -> Self {
        self.message = Cow::Owned(args.to_string());
        self
    }

    /// Only one payload: this replaces any previous payload (default is None).
    #[inline]
    pub fn payload(mut self, p: Payload) -> Self {
        self.payload = p;
        self
    }

    // -------- Finish --------
    #[inline]
    pub fn build(self) -> CoreError {
        CoreError {
            domain: self.domain,
            kind: self.kind,
            severity: self.severity,
            message: self.message,
            payload: self.payload,
        }
    }
}

// Allow `.into()` from the builder.
impl From<ErrB> for CoreError {
    fn from(b: ErrB) -> Self {
        b.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_other() {
        let e = CoreError::info().msg("hello").build();
        assert_eq!(e.domain, Domain::Other);
        assert_eq!(e.kind, ErrorKind::Other);
        assert_eq!(e.severity, Severity::Info);
        assert_eq!(e.payload, Payload::None);
        assert_eq!(e.to_string(), "Info: hello");
    }

    #[test]
    fn unknown_state_mentions_key() {
        #[derive(Debug)]
        struct Key;

        let e = CoreError::unknown_state(Key);
        assert_eq!(e.kind, ErrorKind::UnknownState);
        assert!(e.message.contains("Key"));
    }

    #[test]
    fn invalid_phase_command_has_payload() {
        let e = CoreError::invalid_phase_command(1, 2);
        assert_eq!(e.domain, Domain::Engine);
        assert_eq!(
            e.payload,
            Payload::PhaseCommand {
                from_phase: 1,
                via_command: 2
            }
        );
    }
}
