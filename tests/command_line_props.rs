// tests/command_line_props.rs
use std::path::PathBuf;

use proptest::prelude::*;
use procvisor::command::CommandSpec;

fn word() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_./=-]{1,12}"
}

proptest! {
    #[test]
    fn args_are_joined_with_single_spaces(
        cmd in word(),
        args in proptest::collection::vec(word(), 0..6),
    ) {
        let spec = CommandSpec::builder()
            .command(cmd.clone())
            .args(args.clone())
            .build()
            .unwrap();

        let line = spec.command_line();
        let mut parts: Vec<&str> = line.split(' ').collect();
        prop_assert_eq!(parts.remove(0), cmd.as_str());
        prop_assert_eq!(parts, args.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn sources_prefix_the_command_in_order(
        sources in proptest::collection::vec(word(), 0..4),
        cmd in word(),
    ) {
        let spec = CommandSpec::builder()
            .command(cmd.clone())
            .sources(sources.iter().map(PathBuf::from))
            .build()
            .unwrap();

        let expected_prefix: String = sources
            .iter()
            .map(|s| format!("source {s} && "))
            .collect();
        prop_assert_eq!(spec.command_line(), format!("{expected_prefix}{cmd}"));
    }

    #[test]
    fn every_byte_exit_code_can_be_mapped(code in any::<u8>()) {
        let spec = CommandSpec::builder()
            .command("true")
            .exit_code(code, std::io::Error::other(format!("code {code}")))
            .build()
            .unwrap();

        let err = spec.custom_error(i32::from(code));
        prop_assert!(err.is_some());
        prop_assert_eq!(err.unwrap().to_string(), format!("code {code}"));
    }
}
