#![allow(dead_code)]

use procvisor::command::{CommandSpec, CommandSpecBuilder};

/// `/bin/sh -c <script>`: the whole script goes in as the command.
pub fn sh(script: &str) -> CommandSpecBuilder {
    CommandSpec::builder().shell("/bin/sh").command(script)
}

/// Build a spec, panicking on invalid options.
pub fn spec(builder: CommandSpecBuilder) -> CommandSpec {
    builder.build().expect("Failed to build valid CommandSpec from builder")
}

/// A test-only error type for custom exit code mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestExitError(pub &'static str);

impl std::fmt::Display for TestExitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for TestExitError {}

/// Path of a bash interpreter, if this machine has one.
pub fn bash() -> Option<&'static str> {
    ["/bin/bash", "/usr/bin/bash"]
        .into_iter()
        .find(|p| std::path::Path::new(p).exists())
}
