use commerce_helcim_driver::{HelcimClient, ProcessorApi};
use console::style;

use crate::Context;

#[derive(Debug, Clone, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct TransactionCommand {
    /// Helcim transaction id
    pub transaction_id: String,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl TransactionCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<(), String> {
        let (_, config) = ctx.gateway_config()?;
        config.validate().map_err(|e| e.to_string())?;

        let client = HelcimClient::new().map_err(|e| e.to_string())?;
        let transaction = client
            .get_transaction(&self.transaction_id, &config)
            .await
            .map_err(|e| format!("Failed to fetch transaction: {}", e))?;

        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&transaction)
                    .map_err(|e| format!("Failed to serialize transaction: {}", e))?;
                println!("{}", json);
            }
            OutputFormat::Text => {
                let status = if transaction.status.is_approved() {
                    style(transaction.status.to_string()).green()
                } else {
                    style(transaction.status.to_string()).yellow()
                };
                println!("{} {}", style("Transaction:").bold(), self.transaction_id);
                println!("{} {}", style("Status:").bold(), status);
                if let Some(message) = &transaction.message {
                    println!("{} {}", style("Message:").bold(), style(message).dim());
                }
            }
        }
        Ok(())
    }
}
