//! Operator console on stdin.
//!
//! One command per line:
//!
//! ```text
//! arm <mode> <pin>     hub: arm in doorbell|perimeter|full|quiet
//! arm                  gateway: arm intrusion monitoring
//! disarm [pin]         pin required on the hub
//! silence <pin>        hub only
//! pin <old> <new>      hub only
//! name <id> <name>     set a node display name
//! status               print status as JSON
//! ```

use crate::{component_info, component_warn};
use boatwatch_link::{clock, Gateway, Hub};
use boatwatch_wire::{AlarmMode, NodeId};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

/// Parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Arm, with mode and PIN on the hub
    Arm {
        /// Requested mode
        mode: Option<AlarmMode>,
        /// Operator PIN
        pin: Option<String>,
    },
    /// Disarm
    Disarm {
        /// Operator PIN
        pin: Option<String>,
    },
    /// Silence a sounding alarm
    Silence {
        /// Operator PIN
        pin: String,
    },
    /// Replace the PIN
    ChangePin {
        /// Current PIN
        old: String,
        /// New PIN
        new: String,
    },
    /// Set a display name
    Name {
        /// Node
        id: NodeId,
        /// Display name
        name: String,
    },
    /// Print status
    Status,
}

impl ConsoleCommand {
    /// Command word, safe to log
    pub fn verb(&self) -> &'static str {
        match self {
            ConsoleCommand::Arm { .. } => "arm",
            ConsoleCommand::Disarm { .. } => "disarm",
            ConsoleCommand::Silence { .. } => "silence",
            ConsoleCommand::ChangePin { .. } => "pin",
            ConsoleCommand::Name { .. } => "name",
            ConsoleCommand::Status => "status",
        }
    }
}

/// Parse one console line.
///
/// Errors name only the command word; the rest of the line may hold a PIN.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or_else(|| "empty command".to_string())?;
    let rest: Vec<&str> = words.collect();

    match (verb.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("arm", []) => Ok(ConsoleCommand::Arm {
            mode: None,
            pin: None,
        }),
        ("arm", [mode, pin]) => Ok(ConsoleCommand::Arm {
            mode: Some(mode.parse().map_err(|_| format!("invalid mode '{}'", mode))?),
            pin: Some(pin.to_string()),
        }),
        ("disarm", []) => Ok(ConsoleCommand::Disarm { pin: None }),
        ("disarm", [pin]) => Ok(ConsoleCommand::Disarm {
            pin: Some(pin.to_string()),
        }),
        ("silence", [pin]) => Ok(ConsoleCommand::Silence {
            pin: pin.to_string(),
        }),
        ("pin", [old, new]) => Ok(ConsoleCommand::ChangePin {
            old: old.to_string(),
            new: new.to_string(),
        }),
        ("name", [id, name @ ..]) if !name.is_empty() => {
            let id = id
                .parse::<u16>()
                .map_err(|_| format!("invalid node id '{}'", id))?;
            Ok(ConsoleCommand::Name {
                id: NodeId(id),
                name: name.join(" "),
            })
        }
        ("status", []) => Ok(ConsoleCommand::Status),
        (verb, _) => Err(format!("unrecognized or malformed command '{}'", verb)),
    }
}

/// Read hub commands from stdin until it closes
pub fn spawn_hub_console(hub: Arc<Hub>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Ok(command) => run_hub_command(&hub, command).await,
                Err(e) => component_warn!("console", "{}", e),
            }
        }
        component_info!("console", "stdin closed, console stopped");
    })
}

async fn run_hub_command(hub: &Hub, command: ConsoleCommand) {
    let now = clock::now_ms();
    let result = match command {
        ConsoleCommand::Arm {
            mode: Some(mode),
            pin: Some(pin),
        } => hub.arm(mode, &pin, now).await.map(|e| format!("{:?}", e)),
        ConsoleCommand::Disarm { pin: Some(pin) } => {
            hub.disarm(&pin, now).await.map(|e| format!("{:?}", e))
        }
        ConsoleCommand::Silence { pin } => hub
            .silence(&pin, now)
            .await
            .map(|e| e.map_or_else(|| "nothing to silence".to_string(), |e| format!("{:?}", e))),
        ConsoleCommand::ChangePin { old, new } => hub
            .alarm()
            .change_pin(&old, &new, now)
            .await
            .map(|()| "PIN changed".to_string())
            .map_err(Into::into),
        ConsoleCommand::Name { id, name } => {
            hub.registry().set_display_name(id, name.clone()).await;
            Ok(format!("{} is now '{}'", id, name))
        }
        ConsoleCommand::Status => {
            print_json(&hub.status(now).await);
            return;
        }
        ConsoleCommand::Arm { .. } | ConsoleCommand::Disarm { pin: None } => {
            component_warn!("console", "the hub needs a mode and PIN: arm <mode> <pin>, disarm <pin>");
            return;
        }
    };

    match result {
        Ok(message) => component_info!("console", "{}", message),
        Err(e) => component_warn!("console", "{}", e),
    }
}

/// Read gateway commands from stdin until it closes
pub fn spawn_gateway_console(gateway: Arc<Gateway>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            let now = clock::now_ms();
            match parse_command(&line) {
                Ok(ConsoleCommand::Arm { .. }) => match gateway.arm().await {
                    Some(_) => component_info!("console", "intrusion monitoring armed"),
                    None => component_info!("console", "already armed"),
                },
                Ok(ConsoleCommand::Disarm { .. }) => match gateway.disarm().await {
                    Some(_) => component_info!("console", "intrusion monitoring disarmed"),
                    None => component_info!("console", "already disarmed"),
                },
                Ok(ConsoleCommand::Name { id, name }) => {
                    gateway.registry().set_display_name(id, name).await;
                }
                Ok(ConsoleCommand::Status) => print_json(&gateway.status(now).await),
                Ok(other) => {
                    component_warn!("console", "'{}' is not available on the gateway", other.verb())
                }
                Err(e) => component_warn!("console", "{}", e),
            }
        }
        component_info!("console", "stdin closed, console stopped");
    })
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => component_warn!("console", "status not serializable: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hub_commands() {
        assert_eq!(
            parse_command("arm perimeter 1234"),
            Ok(ConsoleCommand::Arm {
                mode: Some(AlarmMode::Perimeter),
                pin: Some("1234".to_string()),
            })
        );
        assert_eq!(
            parse_command("  DISARM 1234 "),
            Ok(ConsoleCommand::Disarm {
                pin: Some("1234".to_string())
            })
        );
        assert_eq!(
            parse_command("pin 1234 86420"),
            Ok(ConsoleCommand::ChangePin {
                old: "1234".to_string(),
                new: "86420".to_string(),
            })
        );
        assert_eq!(
            parse_command("name 3 Bow locker"),
            Ok(ConsoleCommand::Name {
                id: NodeId(3),
                name: "Bow locker".to_string(),
            })
        );
        assert_eq!(parse_command("status"), Ok(ConsoleCommand::Status));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("").is_err());
        assert!(parse_command("arm sideways 1234").is_err());
        assert!(parse_command("arm full").is_err());
        assert!(parse_command("name x Bow").is_err());
        assert!(parse_command("name 3").is_err());
        assert!(parse_command("reboot").is_err());
    }

    #[test]
    fn test_errors_do_not_echo_pins() {
        for line in ["arm full 1234 x", "disarm 1234 5678", "silence", "pin 1234"] {
            let err = parse_command(line).unwrap_err();
            assert!(!err.contains("1234"), "{}", err);
            assert!(!err.contains("5678"), "{}", err);
        }
        assert_eq!(
            parse_command("arm full 1234 x").unwrap_err(),
            "unrecognized or malformed command 'arm'"
        );
    }

    #[test]
    fn test_verb_hides_arguments() {
        let command = parse_command("pin 1234 86420").unwrap();
        assert_eq!(command.verb(), "pin");
        assert_eq!(
            parse_command("arm quiet 1234").unwrap().verb(),
            "arm"
        );
    }
}
