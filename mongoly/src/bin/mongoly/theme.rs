use clap::builder::styling::{AnsiColor, Color as HelpColor, Style};
use colored::{Color, Colorize};

/// Emphasis for a piece of CLI output. Status lines and `--help` share the same palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Passed,
    Failed,
    Warned,
    Note,
    Heading,
    Example,
}

impl Tone {
    fn color(self) -> Color {
        match self {
            Tone::Passed => Color::Green,
            Tone::Failed => Color::Red,
            Tone::Warned => Color::Yellow,
            Tone::Note => Color::BrightBlack,
            Tone::Heading => Color::Cyan,
            Tone::Example => Color::Magenta,
        }
    }

    /// The same color for clap's help renderer.
    pub fn style(self) -> Style {
        let ansi = match self {
            Tone::Passed => AnsiColor::Green,
            Tone::Failed => AnsiColor::Red,
            Tone::Warned => AnsiColor::Yellow,
            Tone::Note => AnsiColor::BrightBlack,
            Tone::Heading => AnsiColor::Cyan,
            Tone::Example => AnsiColor::Magenta,
        };
        Style::new().fg_color(Some(HelpColor::Ansi(ansi)))
    }

    /// Prefix for status lines.
    pub fn marker(self) -> &'static str {
        match self {
            Tone::Passed => "✓",
            Tone::Failed => "✗",
            Tone::Warned => "⚠",
            Tone::Note => "•",
            Tone::Heading => "",
            Tone::Example => "→",
        }
    }

    pub fn paint(self, text: &str, enabled: bool) -> String {
        if !enabled {
            return text.to_string();
        }
        let painted = text.color(self.color());
        if self == Tone::Heading { painted.bold().to_string() } else { painted.to_string() }
    }
}
