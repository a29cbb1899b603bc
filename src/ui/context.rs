//! Terminal detection

use std::io::IsTerminal;

/// Environment variables that mark a CI runner
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// Whether output goes to a person at a terminal or to a script
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Interactive only when both stdio ends are terminals, outside CI and
    /// without `REPOCACHE_PLAIN`
    pub fn detect() -> Self {
        let tty = std::io::stdout().is_terminal() && std::io::stderr().is_terminal();
        let forced_plain = std::env::var_os("REPOCACHE_PLAIN").is_some();
        let ci = CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            interactive: tty && !forced_plain && !ci,
        }
    }

    /// Plain output regardless of the environment
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    /// Spinners, colors and cliclack framing
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn non_interactive_context() {
        assert!(!UiContext::non_interactive().use_fancy_output());
    }

    #[test]
    #[serial]
    fn plain_override_wins() {
        std::env::set_var("REPOCACHE_PLAIN", "1");
        let ctx = UiContext::detect();
        std::env::remove_var("REPOCACHE_PLAIN");
        assert!(!ctx.use_fancy_output());
    }
}
