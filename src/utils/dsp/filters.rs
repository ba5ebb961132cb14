//! Simple, allocation free filters used in feedback and degradation paths.

pub mod onepole;
