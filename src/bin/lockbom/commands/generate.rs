//! `lockbom generate` command

use std::path::Path;

use anyhow::Result;

use crate::cli::GenerateArgs;
use lockbom::ops::generate::{generate, GenerateOptions};
use lockbom::util::config::load_config;
use lockbom::util::GlobalContext;

pub fn execute(args: GenerateArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;

    let config_path = ctx.find_config(args.config.as_deref())?;
    let global = if args.no_global {
        None
    } else {
        ctx.global_config()
    };
    let config = load_config(global, &config_path)?;

    let base_dir = config_path.parent().unwrap_or(Path::new("."));
    let options = GenerateOptions {
        output_dir: args.output_dir.map(|dir| ctx.cwd().join(dir)),
    };

    let report = generate(&config, base_dir, &options)?;

    for doc in &report.documents {
        eprintln!(
            "   Generated {} ({} components) -> {}",
            doc.subject,
            doc.components,
            doc.path.display()
        );
    }
    eprintln!("    Finished {} documents", report.documents.len());

    Ok(())
}
