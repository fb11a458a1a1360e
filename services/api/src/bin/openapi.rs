//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI 3 document for the performance API to disk.

use api_lib::web::rest::ApiDoc;
use clap::Parser;
use utoipa::OpenApi;

#[derive(Parser, Debug)]
#[command(about = "Generate the OpenAPI document for the performance API")]
struct Args {
    /// Output path for the generated JSON.
    #[arg(short, long, default_value = "openapi.json")]
    output: String,
}

fn generate_spec(
    api_doc: utoipa::openapi::OpenApi,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec_json = api_doc.to_pretty_json()?;
    std::fs::write(path, spec_json)?;
    println!("OpenAPI document written to {}", path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    generate_spec(ApiDoc::openapi(), &args.output)
}
