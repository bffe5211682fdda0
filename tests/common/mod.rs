#![allow(dead_code)]
#![allow(unused_imports)]

pub use hostcare_test_utils::builders;
pub use hostcare_test_utils::{init_tracing, with_timeout};
pub use hostcare_test_utils::{FakeProcessRunner, FakeResponse, RecordingSink};
