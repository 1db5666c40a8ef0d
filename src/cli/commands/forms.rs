use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::config::load_session;
use crate::cli::utils::{output_empty_collection, output_record, output_success, parse_json_arg, scalar};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum FormsCommands {
    #[command(about = "List forms visible to the current session")]
    List,

    #[command(about = "Show a form with its fields")]
    Show {
        #[arg(help = "Form id")]
        id: String,
    },

    #[command(about = "Create a form")]
    Create {
        #[arg(long, help = "Form name")]
        name: String,
        #[arg(long, help = "Slug for API-key submissions")]
        slug: Option<String>,
        #[arg(long, help = "Description")]
        description: Option<String>,
        #[arg(long, help = "Owning tenant id (admins only)")]
        tenant: Option<String>,
        #[arg(long, help = "Field definitions as a JSON array, or @file")]
        fields: Option<String>,
    },
}

pub async fn handle(
    cmd: FormsCommands,
    server: Option<String>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let mut session = load_session()?;
    let client = session.client(server.as_deref());

    let result = match cmd {
        FormsCommands::List => {
            let forms: Vec<Value> = client.get("/admin/forms").await?;
            if forms.is_empty() {
                output_empty_collection(output_format, "forms", "No forms found")
            } else if output_format == OutputFormat::Json {
                output_record(output_format, &Value::Array(forms))
            } else {
                println!("{:<38} {:<24} {:<16} {:>6} {:>11}", "ID", "NAME", "SLUG", "FIELDS", "SUBMISSIONS");
                for form in &forms {
                    println!(
                        "{:<38} {:<24} {:<16} {:>6} {:>11}",
                        scalar(&form["id"]),
                        scalar(&form["name"]),
                        scalar(&form["slug"]),
                        form["fields"].as_array().map_or(0, Vec::len),
                        scalar(&form["submissions_count"]),
                    );
                }
                Ok(())
            }
        }
        FormsCommands::Show { id } => {
            let form: Value = client.get(&format!("/admin/forms/{}", id)).await?;
            if output_format == OutputFormat::Json {
                output_record(output_format, &form)
            } else {
                println!("{} ({})", scalar(&form["name"]), scalar(&form["id"]));
                println!("Slug:        {}", scalar(&form["slug"]));
                println!("Submissions: {}", scalar(&form["submissions_count"]));
                println!("Fields:");
                for field in form["fields"].as_array().into_iter().flatten() {
                    println!(
                        "  {:>3}. {:<20} {:<10} {}",
                        scalar(&field["position"]),
                        scalar(&field["name"]),
                        scalar(&field["type"]),
                        if field["required"].as_bool() == Some(true) { "required" } else { "" },
                    );
                }
                Ok(())
            }
        }
        FormsCommands::Create {
            name,
            slug,
            description,
            tenant,
            fields,
        } => {
            let fields = match fields {
                Some(raw) => parse_json_arg(&raw)?,
                None => json!([]),
            };
            let body = json!({
                "name": name,
                "slug": slug,
                "description": description,
                "tenant_id": tenant,
                "fields": fields,
            });
            let form: Value = client.post("/admin/forms", &body).await?;
            output_success(
                output_format,
                &format!("Created form {} ({})", scalar(&form["name"]), scalar(&form["id"])),
                Some(form),
            )
        }
    };

    session.sync_from(&client).await?;
    result
}
