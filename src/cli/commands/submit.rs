use clap::Args;
use serde_json::Value;

use crate::cli::config::load_session;
use crate::cli::utils::{output_success, parse_json_arg, scalar};
use crate::cli::OutputFormat;
use crate::client::ApiClient;

#[derive(Args)]
pub struct SubmitArgs {
    #[arg(help = "Form id, or slug when --api-key is given")]
    pub form: String,
    #[arg(long, help = "Submission as a JSON object, or @file")]
    pub data: String,
    #[arg(long, env = "FORMS_API_KEY", help = "Tenant API key")]
    pub api_key: Option<String>,
}

/// Goes through the public API, so no login is needed.
pub async fn handle(
    args: SubmitArgs,
    server: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let session = load_session()?;
    let client = ApiClient::new(server.unwrap_or(session.server));
    let data = parse_json_arg(&args.data)?;
    if !data.is_object() {
        anyhow::bail!("submission data must be a JSON object");
    }

    let created: Value = client.submit(&args.form, &data, args.api_key.as_deref()).await?;
    output_success(
        output_format,
        &format!("Submission {} stored", scalar(&created["id"])),
        Some(created),
    )
}
