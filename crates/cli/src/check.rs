use commerce_helcim_driver::HelcimClient;
use console::style;

use crate::{API_TOKEN_ENV, Context, SECRET_KEY_ENV};

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct CheckCommand {
    /// Only check the configuration, without calling Helcim
    #[arg(long)]
    pub offline: bool,
}

impl CheckCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<(), String> {
        let (name, config) = ctx.gateway_config()?;

        println!(
            "{} {} ({})",
            style("Gateway:").bold(),
            name,
            style(config.mode).cyan()
        );

        config.validate().map_err(|e| {
            format!(
                "{}\nSet {} and {} or configure them in {}",
                e,
                API_TOKEN_ENV,
                SECRET_KEY_ENV,
                ctx.manifest_path.display()
            )
        })?;
        println!("{} Credentials look valid", style("✓").green());

        match config.hosted_page_url() {
            Ok(url) => println!("{} Hosted page: {}", style("✓").green(), url),
            Err(_) => println!("  {}", style("Hosted page flow not configured").dim()),
        }

        if self.offline {
            return Ok(());
        }

        let client = HelcimClient::new().map_err(|e| e.to_string())?;
        if !client.validate_credentials(&config).await {
            return Err(
                "Could not connect to Helcim. Please verify your API credentials.".to_string(),
            );
        }
        println!("{} Connected to Helcim", style("✓").green());
        Ok(())
    }
}
