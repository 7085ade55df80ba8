//! Schema command implementation.

use crate::cli::SchemaArgs;
use crate::config::load_project;
use crate::error::Result;
use crate::output::Formatter;
use taxtract_extractor::SchemaCompiler;

/// Execute the schema command.
pub async fn execute_schema(args: SchemaArgs, formatter: &Formatter) -> Result<()> {
    let project = load_project(&args.project)?;
    let schema = SchemaCompiler::new().compile(&project.fields, &project.examples)?;
    println!("{}", formatter.schema(&schema, args.prompt)?);
    Ok(())
}
