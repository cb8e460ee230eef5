use statetree_core::error::{CoreError, Domain, ErrorKind, Result};
use statetree_core::machine::StateTree;

use crate::demo::{Demo, DemoEvent, DemoState};

/// One scripted host action.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Step {
    Start,
    Stop,
    Reset,
    /// `<state>`: plain transition.
    To(DemoState),
    /// `point:<state>:<id>`.
    Point(DemoState, u32),
    /// `history:<state>` (shallow) or `deep:<state>`.
    History(DemoState, bool),
    /// `event:<name>`.
    Event(DemoEvent),
}

impl Step {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let mut parts = raw.split(':');
        let head = parts.next().unwrap_or_default();
        let arg = parts.next();
        let extra = parts.next();

        let step = match (head.to_ascii_lowercase().as_str(), arg, extra) {
            ("start", None, None) => Step::Start,
            ("stop", None, None) => Step::Stop,
            ("reset", None, None) => Step::Reset,
            ("history", Some(state), None) => Step::History(state_arg(raw, state)?, false),
            ("deep", Some(state), None) => Step::History(state_arg(raw, state)?, true),
            ("point", Some(state), Some(id)) => {
                let id = id.parse::<u32>().map_err(|_| bad_step(raw, "entry point must be a number"))?;
                Step::Point(state_arg(raw, state)?, id)
            }
            ("event", Some(name), None) => Step::Event(
                DemoEvent::from_label(name).ok_or_else(|| bad_step(raw, "unknown event"))?,
            ),
            (_, None, None) => Step::To(state_arg(raw, head)?),
            _ => return Err(bad_step(raw, "unrecognised step")),
        };

        Ok(step)
    }

    /// Parse a comma separated list, skipping empty items.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(Step::parse)
            .collect()
    }
}

/// State of the tree after one step.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StepReport {
    pub step: Step,
    pub active_path: Vec<DemoState>,
}

impl StepReport {
    pub fn describe(&self) -> String {
        let path: Vec<_> = self.active_path.iter().map(|state| state.label()).collect();
        if path.is_empty() {
            format!("{:?}: (stopped)", self.step)
        } else {
            format!("{:?}: {}", self.step, path.join(" > "))
        }
    }
}

/// Run `steps` against `tree`, starting it first if it is not started yet.
///
/// Stops at the first engine error; faults are only logged.
pub fn run(tree: &mut StateTree<Demo>, steps: &[Step]) -> Result<Vec<StepReport>> {
    let mut reports = Vec::with_capacity(steps.len());

    for step in steps {
        match *step {
            Step::Start => {
                tree.start()?;
            }
            Step::Stop => {
                if let Some(log) = tree.stop()? {
                    tree.attach(log)?;
                }
            }
            Step::Reset => tree.reset()?,
            Step::To(state) => {
                tree.transition_to(state)?;
            }
            Step::Point(state, id) => {
                tree.transition_to_entry(state, id)?;
            }
            Step::History(state, deep) => {
                tree.transition_to_history(state, deep)?;
            }
            Step::Event(event) => {
                tree.dispatch(&event)?;
            }
        }

        tracing::debug!(?step, leaf = ?tree.current_leaf(), "step done");
        reports.push(StepReport {
            step: *step,
            active_path: tree.active_path(),
        });
    }

    Ok(reports)
}

fn state_arg(raw: &str, label: &str) -> Result<DemoState> {
    DemoState::from_label(label).ok_or_else(|| bad_step(raw, "unknown state"))
}

fn bad_step(raw: &str, why: &'static str) -> CoreError {
    CoreError::warn()
        .domain(Domain::Config)
        .kind(ErrorKind::InvalidArgument)
        .msgf(format_args!("bad step {raw:?}: {why}"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_step_form() {
        let steps = Step::parse_list("start, A2,point:A:2 ,history:a,deep:A,event:next,stop,reset").unwrap();
        assert_eq!(
            steps,
            [
                Step::Start,
                Step::To(DemoState::A2),
                Step::Point(DemoState::A, 2),
                Step::History(DemoState::A, false),
                Step::History(DemoState::A, true),
                Step::Event(DemoEvent::Next),
                Step::Stop,
                Step::Reset,
            ]
        );
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["Z", "point:A", "point:A:x", "event:jump", "history:A:1", "deep"] {
            let err = Step::parse(raw).unwrap_err();
            assert_eq!(err.domain, Domain::Config, "{raw}");
            assert_eq!(err.kind, ErrorKind::InvalidArgument, "{raw}");
        }
    }

    #[test]
    fn empty_items_are_skipped() {
        assert!(Step::parse_list(" , ,").unwrap().is_empty());
    }
}
