use clap::Subcommand;
use serde_json::Value;

use crate::cli::config::load_session;
use crate::cli::utils::{output_empty_collection, output_record, scalar};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum SubmissionsCommands {
    #[command(about = "List submissions of a form, newest first")]
    List {
        #[arg(help = "Form id")]
        form: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
        #[arg(long, help = "Only submissions whose data contains this text")]
        keyword: Option<String>,
    },
}

pub async fn handle(
    cmd: SubmissionsCommands,
    server: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let mut session = load_session()?;
    let client = session.client(server.as_deref());

    let result = match cmd {
        SubmissionsCommands::List {
            form,
            page,
            page_size,
            keyword,
        } => {
            let mut path = format!(
                "/admin/forms/{}/submissions?page={}&page_size={}",
                form, page, page_size
            );
            if let Some(keyword) = keyword {
                path.push_str(&format!("&keyword={}", encode_query(&keyword)));
            }
            let page: Value = client.get(&path).await?;
            let items = page["items"].as_array().cloned().unwrap_or_default();

            if output_format == OutputFormat::Json {
                output_record(output_format, &page)
            } else if items.is_empty() {
                output_empty_collection(output_format, "submissions", "No submissions found")
            } else {
                for item in &items {
                    println!(
                        "{}  {}  {}",
                        scalar(&item["created_at"]),
                        scalar(&item["id"]),
                        item["data"]
                    );
                }
                println!(
                    "page {} of {} total",
                    scalar(&page["page"]),
                    scalar(&page["total"])
                );
                Ok(())
            }
        }
    };

    session.sync_from(&client).await?;
    result
}

fn encode_query(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}
