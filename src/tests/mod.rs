//! Cross-module tests: the components chained the way the analysis pipeline
//! and the CLI use them.
