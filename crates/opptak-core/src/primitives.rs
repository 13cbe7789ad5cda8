//! # Engine Primitives
//!
//! Hardcoded constants for the rule engine.
//!
//! These bound every recursive walk and every persisted write, so a
//! malformed or hostile rule tree cannot exhaust the stack or the store.

/// Magic bytes for the snapshot file header.
///
/// - File Header = Magic Bytes ("OPTK") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"OPTK";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

/// Default bound on rule-tree depth for evaluation, rendering and building.
///
/// Overridable through `EngineConfig::max_rule_depth`.
pub const DEFAULT_MAX_RULE_DEPTH: usize = 64;

/// Maximum number of nodes a single save may create.
pub const MAX_RULE_TREE_NODES: usize = 10_000;

/// Maximum length, in characters, of a rule node label, whether given
/// explicitly or taken from a requirement name.
pub const MAX_LABEL_LENGTH: usize = 256;

/// Document type tag that counts as a diploma by default.
pub const DEFAULT_DIPLOMA_DOCUMENT_TYPE: &str = "vitnemal";
