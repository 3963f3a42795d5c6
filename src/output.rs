//! # Output Styling
//!
//! Status lines printed by the `nsbl` binary. Whether they are colored
//! depends on the `--color` flag and the usual environment conventions:
//!
//! - `--color=always|never` wins over everything else,
//! - `NO_COLOR` (any value) or `CLICOLOR=0` disables colors,
//! - `CLICOLOR_FORCE` forces them even when stdout is not a terminal,
//! - otherwise colors are used when the terminal supports them.

use std::env;

use console::Style;

/// Whether status lines are styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_color: bool,
}

/// The kind of a status line; picks its marker and color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Info,
    Success,
    Warning,
    Failure,
}

impl Status {
    fn marker(self) -> &'static str {
        match self {
            Status::Info => "[..]",
            Status::Success => "[ok]",
            Status::Warning => "[!!]",
            Status::Failure => "[xx]",
        }
    }

    fn style(self) -> Style {
        match self {
            Status::Info => Style::new().cyan(),
            Status::Success => Style::new().green().bold(),
            Status::Warning => Style::new().yellow(),
            Status::Failure => Style::new().red().bold(),
        }
    }
}

impl OutputConfig {
    /// Reads the `--color` flag value (`always`, `never` or `auto`).
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_ascii_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => colors_wanted(),
        };
        Self { use_color }
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }

    /// Formats one status line.
    pub fn status(&self, status: Status, message: impl AsRef<str>) -> String {
        let marker = if self.use_color {
            status.style().force_styling(true).apply_to(status.marker()).to_string()
        } else {
            status.marker().to_string()
        };
        format!("{} {}", marker, message.as_ref())
    }

    /// Emphasizes a name (path, host, role) inside a message.
    pub fn name(&self, name: impl AsRef<str>) -> String {
        if self.use_color {
            Style::new()
                .bold()
                .force_styling(true)
                .apply_to(name.as_ref())
                .to_string()
        } else {
            name.as_ref().to_string()
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

fn colors_wanted() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
        return false;
    }
    if env::var("CLICOLOR_FORCE").is_ok_and(|v| !v.is_empty() && v != "0") {
        return true;
    }
    console::Term::stdout().features().colors_supported()
}
