//! Codemod generation, static checking and replay validation.

pub mod anti_pattern;
pub mod dsl;
pub mod generator;
pub mod replay;

pub use anti_pattern::AntiPatternValidator;
pub use dsl::{transform_signature, CodemodDocument, CompiledCodemod, Step};
pub use generator::{CodemodGenerator, EditStrategy, GeneratedCodemod};
pub use replay::{static_check, ReplayCase, ReplayOutcome, ReplayValidator};
