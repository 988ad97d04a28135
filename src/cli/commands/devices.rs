use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_success, output_value};
use crate::cli::OutputFormat;
use crate::client::NvlpClient;
use crate::models::RegisterDeviceRequest;
use crate::token::TokenStorage;

#[derive(Subcommand)]
pub enum DeviceCommands {
    #[command(about = "Register this machine as a device")]
    Register {
        #[arg(help = "Display name", default_value = "nvlp-cli")]
        name: String,
    },

    #[command(about = "List registered devices")]
    List,

    #[command(about = "Revoke a device and end its session")]
    Revoke {
        #[arg(help = "Device ID")]
        device_id: String,
    },

    #[command(about = "Sign out every device except this one")]
    SignoutAll,
}

pub async fn handle<S: TokenStorage>(
    client: &NvlpClient<S>,
    cmd: DeviceCommands,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        DeviceCommands::Register { name } => {
            let request = RegisterDeviceRequest {
                device_name: name,
                device_type: Some("cli".to_string()),
                push_token: None,
                app_version: Some(env!("CARGO_PKG_VERSION").to_string()),
                last_location: None,
            };
            let device = client.register_device(&request).await?;
            output_success(
                &output_format,
                &format!("Registered device {}", device.device_id),
                Some(json!({ "device": device })),
            )
        }
        DeviceCommands::List => {
            let devices = client.list_devices().await?;
            output_value(&output_format, &devices, |devices| {
                for listing in devices {
                    let device = &listing.device;
                    let mut flags = Vec::new();
                    if listing.is_current {
                        flags.push("current");
                    }
                    if device.is_revoked {
                        flags.push("revoked");
                    }
                    println!(
                        "{}  {}  last seen {}  {}",
                        device.device_id,
                        device.device_name,
                        device.last_seen,
                        flags.join(", ")
                    );
                }
            })
        }
        DeviceCommands::Revoke { device_id } => {
            client.revoke_device(&device_id).await?;
            output_success(&output_format, &format!("Revoked device {}", device_id), None)
        }
        DeviceCommands::SignoutAll => {
            let revoked = client.sign_out_other_devices().await?;
            output_success(
                &output_format,
                &format!("Signed out {} other device(s)", revoked),
                Some(json!({ "revoked": revoked })),
            )
        }
    }
}
