use std::fmt;

use crate::error::{CoreError, Domain, ErrorKind, Payload, Severity};

/// Why a state reported a fault.
///
/// Faults are protocol violations, not configuration errors: the engine
/// reports them and carries on with the documented fallback.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FaultReason {
    StateReentered,
    UnhandledEvent,
    UnhandledEntryPoint,
    UnhandledDeepHistory,
    UnhandledShallowHistory,
    UnknownError,
}

impl FaultReason {
    pub const fn id(self) -> u8 {
        match self {
            FaultReason::StateReentered => 1,
            FaultReason::UnhandledEvent => 2,
            FaultReason::UnhandledEntryPoint => 3,
            FaultReason::UnhandledDeepHistory => 4,
            FaultReason::UnhandledShallowHistory => 5,
            FaultReason::UnknownError => 6,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            FaultReason::StateReentered => "state re-entered",
            FaultReason::UnhandledEvent => "unhandled event",
            FaultReason::UnhandledEntryPoint => "unhandled entry point",
            FaultReason::UnhandledDeepHistory => "unhandled deep history",
            FaultReason::UnhandledShallowHistory => "unhandled shallow history",
            FaultReason::UnknownError => "unknown error",
        }
    }

    pub const fn severity(self) -> Severity {
        match self {
            FaultReason::UnknownError => Severity::Error,
            _ => Severity::Warn,
        }
    }
}

/// A fault together with the state it originated from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Fault<K> {
    pub reason: FaultReason,
    pub state: K,
    /// Entry point involved, for `UnhandledEntryPoint`.
    pub entry_point: Option<u32>,
}

impl<K: fmt::Debug> Fault<K> {
    pub fn new(reason: FaultReason, state: K) -> Self {
        Self {
            reason,
            state,
            entry_point: None,
        }
    }

    pub fn with_entry_point(mut self, entry_point: u32) -> Self {
        self.entry_point = Some(entry_point);
        self
    }

    /// Lift into the crate error type, e.g. for hosts that escalate faults.
    pub fn to_core_error(&self) -> CoreError {
        CoreError::new(
            Domain::Fault,
            ErrorKind::ProtocolViolation,
            self.reason.severity(),
            self.to_string(),
        )
        .with_payload(Payload::Fault {
            reason: self.reason.id(),
            state: format!("{:?}", self.state).into(),
        })
    }

    /// Default host hook: log through `tracing`.
    pub fn log(&self) {
        self.to_core_error().log();
    }
}

impl<K: fmt::Debug> fmt::Display for Fault<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in state {:?}", self.reason.label(), self.state)?;
        if let Some(point) = self.entry_point {
            write!(f, " (entry point {point})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_entry_point() {
        let fault = Fault::new(FaultReason::UnhandledEntryPoint, "Menu").with_entry_point(3);
        assert_eq!(
            fault.to_string(),
            "unhandled entry point in state \"Menu\" (entry point 3)"
        );
    }

    #[test]
    fn core_error_carries_reason_and_state() {
        let e = Fault::new(FaultReason::StateReentered, 7u8).to_core_error();
        assert_eq!(e.domain, Domain::Fault);
        assert_eq!(e.kind, ErrorKind::ProtocolViolation);
        assert_eq!(e.severity, Severity::Warn);
        assert_eq!(
            e.payload,
            Payload::Fault {
                reason: FaultReason::StateReentered.id(),
                state: "7".into(),
            }
        );
    }

    #[test]
    fn unknown_error_is_error_severity() {
        assert_eq!(FaultReason::UnknownError.severity(), Severity::Error);
        assert_eq!(FaultReason::UnhandledEvent.severity(), Severity::Warn);
    }
}
