//! Interactive minigames played through chat commands.
//!
//! - [`dig`] - the dig site session engine
//!
//! Chat text is turned into a [`DigCommand`] here; the server owns the session registry
//! and applies the command to the caller's session.

pub mod dig;

pub use dig::{DigOutcome, DigRejection, DigRules, DigSession, DigSummary, Direction};

/// Parsed dig-site chat command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigCommand {
    /// `DIG`: start a session, or dig if one is already running
    Start,
    /// `D`: dig at the current tile
    Dig,
    Move(Direction),
    /// `L` / `LOOK`: show status without acting
    Look,
    /// `Q` / `STOP` / `QUIT`
    Stop,
    Help,
    Unknown,
}

impl DigCommand {
    pub fn parse(raw: &str) -> DigCommand {
        let cmd = raw.trim();
        if cmd.is_empty() {
            return DigCommand::Look;
        }
        if let Some(dir) = Direction::parse(cmd) {
            return DigCommand::Move(dir);
        }
        match cmd.to_ascii_uppercase().as_str() {
            "DIG" | "START" => DigCommand::Start,
            "D" | "SHOVEL" => DigCommand::Dig,
            "L" | "LOOK" => DigCommand::Look,
            "Q" | "STOP" | "QUIT" | "EXIT" => DigCommand::Stop,
            "?" | "H" | "HELP" => DigCommand::Help,
            _ => DigCommand::Unknown,
        }
    }
}

pub fn dig_help_text() -> &'static str {
    "Dig Commands:\nN/S/E/W move\nD dig here\nL look\nQ stop\n"
}
