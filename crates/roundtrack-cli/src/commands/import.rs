use std::path::PathBuf;

use roundtrack_core::{BlockDraft, Config};

use super::{open_context, print_json, CliResult};

/// Import a JSON array of block records for the selected user.
pub fn run(file: PathBuf, user: Option<i64>) -> CliResult {
    let config = Config::load()?;
    let content = std::fs::read_to_string(&file)
        .map_err(|e| format!("cannot read {}: {e}", file.display()))?;
    let drafts: Vec<BlockDraft> = serde_json::from_str(&content)?;

    let mut ctx = open_context(&config, user)?;
    let report = ctx.import_blocks(drafts)?;
    print_json(&report)
}
