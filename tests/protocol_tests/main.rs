//! Wire protocol tests

mod codec_tests;
