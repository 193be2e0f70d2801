use crate::error::{AppError, Result};
use crate::snapshot::{SystemSnapshot, RELAY_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayAction {
    On,
    Off,
    Toggle,
}

impl RelayAction {
    /// Desired relay state given what is currently displayed
    pub fn desired(self, current: bool) -> bool {
        match self {
            RelayAction::On => true,
            RelayAction::Off => false,
            RelayAction::Toggle => !current,
        }
    }
}

/// One line typed on the operator console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// `index` is the zero-based wire index; operators type circuits 1-4
    Relay { index: usize, action: RelayAction },
    Status,
    Quit,
}

impl OperatorCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let verb = words
            .next()
            .ok_or_else(|| AppError::InvalidCommand("empty command".to_string()))?;

        let command = match verb.to_ascii_lowercase().as_str() {
            "status" => OperatorCommand::Status,
            "quit" | "exit" => OperatorCommand::Quit,
            "relay" => {
                let circuit = words
                    .next()
                    .ok_or_else(|| AppError::InvalidCommand("missing circuit number".to_string()))?;
                let circuit: usize = circuit.parse().map_err(|_| {
                    AppError::InvalidCommand(format!("circuit must be a number, got {}", circuit))
                })?;
                if !(1..=RELAY_COUNT).contains(&circuit) {
                    return Err(AppError::InvalidCommand(format!(
                        "circuit must be between 1 and {}",
                        RELAY_COUNT
                    )));
                }

                let action = match words.next().map(|w| w.to_ascii_lowercase()).as_deref() {
                    Some("on") => RelayAction::On,
                    Some("off") => RelayAction::Off,
                    Some("toggle") | None => RelayAction::Toggle,
                    Some(other) => {
                        return Err(AppError::InvalidCommand(format!(
                            "expected on, off or toggle, got {}",
                            other
                        )))
                    }
                };

                OperatorCommand::Relay {
                    index: circuit - 1,
                    action,
                }
            }
            other => {
                return Err(AppError::InvalidCommand(format!("unknown command {}", other)));
            }
        };

        if let Some(extra) = words.next() {
            return Err(AppError::InvalidCommand(format!("unexpected argument {}", extra)));
        }

        Ok(command)
    }
}

/// Resolve a relay command against the displayed snapshot
pub fn relay_target(index: usize, action: RelayAction, snapshot: &SystemSnapshot) -> bool {
    let current = snapshot.house.relays.get(index).copied().unwrap_or(false);
    action.desired(current)
}
