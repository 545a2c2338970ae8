//! Shell completions module for Restible
//!
//! Provides shell completion scripts for bash, zsh, fish, powershell, and elvish.

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

use crate::cli::Cli;

/// Generate shell completions and write to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "restible", &mut io::stdout());
}

/// Get completions as a string
#[cfg(test)]
fn get_completions(shell: Shell) -> String {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    generate(shell, &mut cmd, "restible", &mut buf);
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_completions() {
        let completions = get_completions(Shell::Bash);
        assert!(completions.contains("restible"));
        assert!(completions.contains("complete"));
    }

    #[test]
    fn test_zsh_completions() {
        let completions = get_completions(Shell::Zsh);
        assert!(completions.contains("restible"));
        assert!(completions.contains("compdef") || completions.contains("_restible"));
    }

    #[test]
    fn test_fish_completions() {
        let completions = get_completions(Shell::Fish);
        assert!(completions.contains("restible"));
        assert!(completions.contains("args-file"));
    }
}
