use console::style;
use std::fmt::Display;

/// Green bold: completed deletions, confirmations
pub fn success<D: Display>(text: D) -> String {
    style(text).green().bold().to_string()
}

/// White bold: section headers, run titles
pub fn header<D: Display>(text: D) -> String {
    style(text).white().bold().to_string()
}

/// Dim: retired copies, secondary text
pub fn dim<D: Display>(text: D) -> String {
    style(text).dim().to_string()
}

/// Yellow: dry-run notices, warnings
pub fn yellow<D: Display>(text: D) -> String {
    style(text).yellow().to_string()
}

/// Red bold: destructive prompts
pub fn danger<D: Display>(text: D) -> String {
    style(text).red().bold().to_string()
}

/// Cyan: field labels, hosts
pub fn cyan<D: Display>(text: D) -> String {
    style(text).cyan().to_string()
}
