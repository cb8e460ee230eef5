use crate::error::{CoreError, Result};

/// Phase of the engine itself, independent of the application state tree.
///
/// - Uninitialized: built (or reset), nothing instantiated
/// - Started: the application tree is active; transitions are accepted
/// - Stopped: torn down; cache empty, controllable released
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    Uninitialized,
    Started,
    Stopped,
}

impl Phase {
    /// Compact id used in error payloads.
    pub const fn id(self) -> u8 {
        match self {
            Phase::Uninitialized => 0,
            Phase::Started => 1,
            Phase::Stopped => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Phase::Uninitialized => "Uninitialized",
            Phase::Started => "Started",
            Phase::Stopped => "Stopped",
        }
    }
}

/// Canonical list of all engine phases.
pub const ALL_PHASES: [Phase; 3] = [Phase::Uninitialized, Phase::Started, Phase::Stopped];

/// Host-issued engine commands.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Reset,
}

impl Command {
    pub const fn id(self) -> u8 {
        match self {
            Command::Start => 1,
            Command::Stop => 2,
            Command::Reset => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Reset => "reset",
        }
    }
}

/// Validate `via` against the current phase and return the phase it leads to.
pub fn advance(current: Phase, via: Command) -> Result<Phase> {
    use Command::*;
    use Phase::*;

    let next = match (current, via) {
        (Uninitialized | Stopped, Start) => Started,
        (Started, Stop) => Stopped,
        (Uninitialized | Stopped, Reset) => Uninitialized,
        _ => {
            return Err(CoreError::invalid_phase_command(current.id(), via.id()));
        }
    };

    Ok(next)
}

/// Commands accepted in `phase`.
pub fn available_commands(phase: Phase) -> &'static [Command] {
    match phase {
        Phase::Uninitialized | Phase::Stopped => &[Command::Start, Command::Reset],
        Phase::Started => &[Command::Stop],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Domain, ErrorKind, Payload};

    #[test]
    fn start_stop_reset_cycle() {
        let started = advance(Phase::Uninitialized, Command::Start).unwrap();
        assert_eq!(started, Phase::Started);
        let stopped = advance(started, Command::Stop).unwrap();
        assert_eq!(stopped, Phase::Stopped);
        assert_eq!(advance(stopped, Command::Reset).unwrap(), Phase::Uninitialized);
        assert_eq!(advance(stopped, Command::Start).unwrap(), Phase::Started);
    }

    #[test]
    fn reset_while_started_is_refused() {
        let e = advance(Phase::Started, Command::Reset).unwrap_err();
        assert_eq!(e.domain, Domain::Engine);
        assert_eq!(e.kind, ErrorKind::InvalidTransition);
        assert_eq!(
            e.payload,
            Payload::PhaseCommand {
                from_phase: Phase::Started.id(),
                via_command: Command::Reset.id(),
            }
        );
    }

    #[test]
    fn available_commands_agree_with_advance() {
        for phase in ALL_PHASES {
            for command in [Command::Start, Command::Stop, Command::Reset] {
                let listed = available_commands(phase).contains(&command);
                assert_eq!(listed, advance(phase, command).is_ok(), "{phase:?} {command:?}");
            }
        }
    }
}
