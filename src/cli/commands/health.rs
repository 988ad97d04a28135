use crate::cli::utils::output_value;
use crate::cli::OutputFormat;
use crate::client::NvlpClient;
use crate::token::TokenStorage;

pub async fn handle<S: TokenStorage>(
    client: &NvlpClient<S>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let health = client.health().await?;
    output_value(&output_format, &health, |health| {
        println!("API:      {}", client.config().api_url);
        println!("Status:   {}", health["status"].as_str().unwrap_or("unknown"));
        println!("Database: {}", health["database"].as_str().unwrap_or("unknown"));
        println!("Cache:    {} entries", health["cache_entries"]);
    })
}
