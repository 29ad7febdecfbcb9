use console::{style, StyledObject};

/// Styling helpers for terminal output
pub fn bright_yellow(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn bright_green(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn bright_red(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn cyan(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bold(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bold()
}

pub fn magenta_bold(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// Colours a pipeline, workflow, job, step or test status by outcome.
pub fn status(text: impl std::fmt::Display) -> StyledObject<String> {
    let text = text.to_string();
    match status_tone(&text) {
        Tone::Good => bright_green(text),
        Tone::Bad => bright_red(text),
        Tone::Active => bright_yellow(text),
        Tone::Neutral => dim(text),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Good,
    Bad,
    Active,
    Neutral,
}

pub fn status_tone(status: &str) -> Tone {
    match status {
        "success" | "created" => Tone::Good,
        "failed" | "failure" | "failing" | "error" | "errored" | "infrastructure_fail"
        | "timedout" | "unauthorized" => Tone::Bad,
        "running" | "queued" | "on_hold" | "pending" | "setup-pending" | "setup" => Tone::Active,
        _ => Tone::Neutral,
    }
}
