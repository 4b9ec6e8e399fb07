use serde_json::json;

use crate::cli::{utils, OutputFormat};
use crate::provisioning::{generate_password, DEFAULT_PASSWORD_LENGTH};

pub fn handle(length: Option<usize>, output_format: OutputFormat) -> anyhow::Result<()> {
    let password = generate_password(length.unwrap_or(DEFAULT_PASSWORD_LENGTH));

    match output_format {
        OutputFormat::Json => utils::output_success(
            &output_format,
            "Generated temporary password",
            Some(json!({ "password": password })),
        ),
        OutputFormat::Text => {
            println!("{}", password);
            Ok(())
        }
    }
}
