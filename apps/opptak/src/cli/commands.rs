//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use crate::catalog::Catalog;
use crate::config::load_engine_config;
use opptak_core::{
    ApplicantId, OpptakError, PathwayEvaluationResult, PathwayId, RuleExpression, RuleNodeId,
    Session, graph_from_bytes, graph_to_bytes,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for catalog import (100 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum file size for a single rule expression (2 MB).
const MAX_EXPRESSION_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), OpptakError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| OpptakError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(OpptakError::Validation(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path.
///
/// Canonicalizes the path (resolving symlinks and "..") and ensures it
/// names an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, OpptakError> {
    let canonical = path.canonicalize().map_err(|e| {
        OpptakError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(OpptakError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read a bounded input file.
fn read_input_file(path: &Path, max_size: u64) -> Result<Vec<u8>, OpptakError> {
    let canonical = validate_file_path(path)?;
    validate_file_size(&canonical, max_size)?;
    std::fs::read(&canonical).map_err(|e| OpptakError::IoError(format!("Read file: {}", e)))
}

/// Read a rule expression from a JSON file.
fn read_expression(path: &Path) -> Result<RuleExpression, OpptakError> {
    let data = read_input_file(path, MAX_EXPRESSION_FILE_SIZE)?;
    serde_json::from_slice(&data)
        .map_err(|e| OpptakError::DeserializationError(format!("Invalid expression: {}", e)))
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// STORE CONTEXT
// =============================================================================

/// Where and how a command opens its session.
#[derive(Debug, Clone, Copy)]
pub struct StoreContext<'a> {
    pub db_path: &'a Path,
    pub backend: &'a str,
    pub config: Option<&'a Path>,
}

impl StoreContext<'_> {
    /// Open the session and apply the engine configuration.
    pub fn open(&self) -> Result<Session, OpptakError> {
        let mut session = load_or_create_session(self.db_path, self.backend)?;
        session.set_config(load_engine_config(self.config)?)?;
        Ok(session)
    }

    /// Persist a session after a write (no-op for redb).
    pub fn save(&self, session: &Session) -> Result<(), OpptakError> {
        save_session(session, self.db_path)
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(ctx: &StoreContext<'_>, host: &str, port: u16) -> Result<(), OpptakError> {
    let session = ctx.open()?;
    if !session.is_persistent() {
        tracing::warn!("File backend: changes made through the server are not written back");
    }

    println!("Opptak Eligibility Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", ctx.backend);
    println!("  Database: {:?}", ctx.db_path);
    println!();
    println!("Endpoints:");
    println!("  GET    /health                                - Health check");
    println!("  GET    /status                                - Store status");
    println!("  POST   /rules                                 - Save a rule expression");
    println!("  GET    /rules/{{id}}                            - Rebuild a rule expression");
    println!("  GET    /rules/{{id}}/text                       - Render a rule as text");
    println!("  DELETE /rules/{{id}}                            - Delete a rule tree");
    println!("  POST   /rules/requirement-ids                 - Requirement ids of an expression");
    println!("  PUT    /pathways/{{id}}/rule                    - Replace a pathway's rule");
    println!("  GET    /applicants/{{a}}/pathways/{{p}}/evaluation - Evaluate one pathway");
    println!("  GET    /applicants/{{a}}/evaluations             - Evaluate all pathways");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, session).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(ctx: &StoreContext<'_>, force: bool) -> Result<(), OpptakError> {
    if ctx.db_path.exists() {
        if !force {
            return Err(OpptakError::Validation(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(ctx.db_path)
            .map_err(|e| OpptakError::IoError(format!("Remove db: {}", e)))?;
    }

    match ctx.backend {
        "redb" => {
            let _session = Session::with_redb(ctx.db_path)?;
            println!("Initialized new redb database at {:?}", ctx.db_path);
        }
        _ => {
            let session = Session::new();
            save_session(&session, ctx.db_path)?;
            println!("Initialized new file database at {:?}", ctx.db_path);
        }
    }

    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store status.
pub fn cmd_status(ctx: &StoreContext<'_>, json_mode: bool) -> Result<(), OpptakError> {
    let session = ctx.open()?;
    let rule_nodes = session.rule_node_count()?;
    let requirements = session.requirements()?.len();
    let pathways = session.pathways()?;
    let with_rule = pathways.iter().filter(|p| p.rule_root.is_some()).count();

    if json_mode {
        let output = serde_json::json!({
            "database": ctx.db_path.to_string_lossy(),
            "backend": ctx.backend,
            "ruleNodes": rule_nodes,
            "requirements": requirements,
            "pathways": pathways.len(),
            "pathwaysWithRule": with_rule,
        });
        print_json(&output);
        return Ok(());
    }

    println!("Opptak Store Status");
    println!("===================");
    println!("Database: {:?}", ctx.db_path);
    println!("Backend:  {}", ctx.backend);
    println!();
    println!("Rule Nodes:   {}", rule_nodes);
    println!("Requirements: {}", requirements);
    println!("Pathways:     {} ({with_rule} with a rule)", pathways.len());

    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Import a catalog JSON file.
pub fn cmd_import(
    ctx: &StoreContext<'_>,
    json_mode: bool,
    input: &Path,
) -> Result<(), OpptakError> {
    let data = read_input_file(input, MAX_IMPORT_FILE_SIZE)?;
    let catalog = Catalog::from_json(&data)?;

    let mut session = ctx.open()?;
    let summary = catalog.apply(&mut session)?;
    ctx.save(&session)?;

    if json_mode {
        print_json(&serde_json::json!(summary));
    } else {
        println!("Imported from {:?}:", input);
        println!("  Requirements:       {}", summary.requirements);
        println!("  Qualifying codes:   {}", summary.qualifying_code_sets);
        println!("  Applicants:         {}", summary.applicants);
        println!("  Pathways:           {}", summary.pathways);
        println!("  Pathway rules:      {}", summary.rules);
    }
    Ok(())
}

// =============================================================================
// RULE COMMANDS
// =============================================================================

/// Persist an expression as a new rule tree.
pub fn cmd_save_rule(
    ctx: &StoreContext<'_>,
    json_mode: bool,
    file: &Path,
    label: Option<&str>,
) -> Result<(), OpptakError> {
    let expression = read_expression(file)?;

    let mut session = ctx.open()?;
    let root = session.save_logical_expression(&expression, label)?;
    ctx.save(&session)?;

    if json_mode {
        print_json(&serde_json::json!({ "nodeId": root.0 }));
    } else {
        println!("Saved rule tree with top node {}", root);
    }
    Ok(())
}

/// Print a rule tree as JSON and as infix text.
pub fn cmd_show_rule(ctx: &StoreContext<'_>, json_mode: bool, id: u64) -> Result<(), OpptakError> {
    let session = ctx.open()?;
    let Some(expression) = session.build_logical_expression(RuleNodeId(id))? else {
        return Err(OpptakError::Validation(format!("Rule node {id} not found")));
    };
    let text = session.render_rule(RuleNodeId(id))?;

    if json_mode {
        print_json(&serde_json::json!({
            "nodeId": id,
            "expression": expression,
            "ruleText": text,
        }));
    } else {
        println!("Rule {}: {}", id, text);
        println!();
        println!(
            "{}",
            serde_json::to_string_pretty(&expression).unwrap_or_default()
        );
    }
    Ok(())
}

/// Delete a rule tree. Deleting an unknown node is not an error.
pub fn cmd_delete_rule(
    ctx: &StoreContext<'_>,
    json_mode: bool,
    id: u64,
) -> Result<(), OpptakError> {
    let mut session = ctx.open()?;
    let removed = session.delete_logical_expression(RuleNodeId(id))?;
    ctx.save(&session)?;

    if json_mode {
        print_json(&serde_json::json!({ "nodeId": id, "removed": removed }));
    } else {
        println!("Removed {} rule node(s) under {}", removed, id);
    }
    Ok(())
}

/// Replace or detach a pathway's rule tree.
pub fn cmd_set_pathway_rule(
    ctx: &StoreContext<'_>,
    json_mode: bool,
    pathway: u64,
    file: Option<&Path>,
) -> Result<(), OpptakError> {
    let expression = file.map(read_expression).transpose()?;

    let mut session = ctx.open()?;
    let root = session.replace_pathway_rule(PathwayId(pathway), expression.as_ref())?;
    ctx.save(&session)?;

    if json_mode {
        print_json(&serde_json::json!({
            "pathway": pathway,
            "nodeId": root.map(|id| id.0),
        }));
    } else {
        match root {
            Some(id) => println!("Pathway {} now uses rule tree {}", pathway, id),
            None => println!("Pathway {} has no rule tree", pathway),
        }
    }
    Ok(())
}

// =============================================================================
// EVALUATE COMMAND
// =============================================================================

/// Evaluate an applicant against one pathway, or all of them.
pub fn cmd_evaluate(
    ctx: &StoreContext<'_>,
    json_mode: bool,
    applicant: u64,
    pathway: Option<u64>,
) -> Result<(), OpptakError> {
    let session = ctx.open()?;
    let applicant_id = ApplicantId(applicant);

    let results = match pathway {
        Some(p) => session
            .evaluate_opptaks_vei(applicant_id, PathwayId(p))?
            .map(|result| vec![result])
            .ok_or_else(|| {
                OpptakError::Validation(format!(
                    "Applicant {} or pathway {} not found",
                    applicant, p
                ))
            })?,
        None => session.evaluate_applicant(applicant_id)?.ok_or_else(|| {
            OpptakError::Validation(format!("Applicant {} not found", applicant))
        })?,
    };

    if json_mode {
        print_json(&serde_json::to_value(&results).unwrap_or_default());
        return Ok(());
    }

    println!("Applicant {}", applicant);
    println!("============");
    for result in &results {
        print_result(result);
    }
    Ok(())
}

fn print_result(result: &PathwayEvaluationResult) {
    let verdict = if result.satisfied {
        "ELIGIBLE"
    } else {
        "NOT ELIGIBLE"
    };
    println!();
    println!(
        "[{}] {} ({})",
        verdict, result.pathway.name, result.pathway.id
    );
    if !result.rule_text.is_empty() {
        println!("  Rule:      {}", result.rule_text);
    }
    println!("  Rationale: {}", result.rationale);
    if !result.satisfied_requirements.is_empty() {
        println!("  Met:       {}", result.satisfied_requirements.join(", "));
    }
    if !result.missing_subject_codes.is_empty() {
        println!("  Missing:   {}", result.missing_subject_codes.join(", "));
    }
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Load or create a session from a database path with specified backend.
pub fn load_or_create_session(db_path: &Path, backend: &str) -> Result<Session, OpptakError> {
    match backend {
        "redb" => Session::with_redb(db_path),
        "file" => {
            if db_path.exists() {
                let data = std::fs::read(db_path)
                    .map_err(|e| OpptakError::IoError(format!("Read db: {}", e)))?;
                Ok(Session::with_graph(graph_from_bytes(&data)?))
            } else {
                Ok(Session::new())
            }
        }
        other => Err(OpptakError::ConfigError(format!(
            "Unknown backend '{}' (expected 'redb' or 'file')",
            other
        ))),
    }
}

/// Save a session to a database path.
pub fn save_session(session: &Session, db_path: &Path) -> Result<(), OpptakError> {
    if session.is_persistent() {
        // Redb backend - already persisted, nothing to do
        Ok(())
    } else {
        let graph = session.graph_opt().ok_or_else(|| {
            OpptakError::SerializationError("No graph available for export".to_string())
        })?;
        let data = graph_to_bytes(graph)?;
        std::fs::write(db_path, &data)
            .map_err(|e| OpptakError::IoError(format!("Write db: {}", e)))?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
