//! Chat commands that steer the session.

use crate::agent::session::SessionState;

const HELP: &str = "Commands:\n\
                    /watch - start monitoring\n\
                    /stop - stop monitoring\n\
                    /status - show counters\n\
                    /reset - forget alerted matches\n\
                    /debug on|off - failure details in chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Watch,
    Stop,
    Status,
    Reset,
    /// `None` toggles.
    Debug(Option<bool>),
}

impl Command {
    /// Parse a message. Anything not starting with `/` is not a command;
    /// unknown commands map to `Help`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        // "/watch@forebet_bot" in group chats
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let arg = parts.next().map(str::to_lowercase);

        let command = match name.as_str() {
            "start" => Command::Start,
            "watch" => Command::Watch,
            "stop" => Command::Stop,
            "status" => Command::Status,
            "reset" => Command::Reset,
            "debug" => Command::Debug(match arg.as_deref() {
                Some("on" | "1" | "true") => Some(true),
                Some("off" | "0" | "false") => Some(false),
                _ => None,
            }),
            _ => Command::Help,
        };
        Some(command)
    }

    /// Apply the command and return the reply text.
    pub fn apply(&self, state: &mut SessionState) -> String {
        match *self {
            Command::Start => format!("Bot ready. Use /watch to start monitoring.\n\n{HELP}"),
            Command::Help => HELP.to_string(),
            Command::Watch => {
                state.watching = true;
                "Monitoring on ⚽".to_string()
            }
            Command::Stop => {
                state.watching = false;
                "Monitoring stopped".to_string()
            }
            Command::Status => status_text(state),
            Command::Reset => {
                let dropped = state.seen.clear();
                format!("Forgot {dropped} alerted matches")
            }
            Command::Debug(setting) => {
                state.verbose = setting.unwrap_or(!state.verbose);
                format!("Debug output {}", if state.verbose { "on" } else { "off" })
            }
        }
    }
}

fn status_text(state: &SessionState) -> String {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    format!(
        "Watching: {}\n\
         Debug: {}\n\
         Alerted matches: {}\n\
         Cycles: {}\n\
         Alerts sent: {}\n\
         Fetch failures: {}\n\
         Send failures: {}",
        yes_no(state.watching),
        yes_no(state.verbose),
        state.seen.len(),
        state.stats.cycles,
        state.stats.alerts_sent,
        state.stats.fetch_failures,
        state.stats.send_failures,
    )
}
