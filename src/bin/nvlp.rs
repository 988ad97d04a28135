use clap::Parser;
use nvlp_api::cli::{utils::output_error, Cli, OutputFormat};
use nvlp_api::client::ClientError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_format = OutputFormat::from_cli(&cli);

    if let Err(e) = nvlp_api::cli::run(cli).await {
        if matches!(std::env::var("CLI_VERBOSE").as_deref(), Ok("true") | Ok("1")) {
            eprintln!("{e:?}");
        }

        let code = match e.downcast_ref::<ClientError>() {
            Some(ClientError::Api { code, .. }) => code.clone(),
            Some(ClientError::NotAuthenticated) => Some("NOT_AUTHENTICATED".to_string()),
            _ => None,
        };
        let _ = output_error(&output_format, &e.to_string(), code.as_deref());
        std::process::exit(1);
    }
}
