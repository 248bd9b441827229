#![allow(unused_imports)]

pub use procvisor_test_utils::builders;
pub use procvisor_test_utils::recorder::Recorder;
pub use procvisor_test_utils::{init_tracing, with_timeout};
