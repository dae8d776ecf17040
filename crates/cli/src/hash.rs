use commerce_helcim_core::trust;
use commerce_helcim_types::Price;
use console::style;

use crate::Context;

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct HashCommand {
    /// Order amount, e.g. 19.99
    pub amount: String,

    /// Three-letter currency code
    #[arg(long, default_value = "USD")]
    pub currency: String,

    /// Compare against this reported hash instead of printing it
    #[arg(long)]
    pub verify: Option<String>,
}

impl HashCommand {
    pub fn execute(&self, ctx: &Context) -> Result<(), String> {
        let (_, config) = ctx.gateway_config()?;
        if config.hash_key().is_empty() {
            return Err("No secret key configured to hash with".to_string());
        }
        let amount = Price::parse(&self.amount, &self.currency).map_err(|e| e.to_string())?;

        match &self.verify {
            None => {
                println!("{}", trust::amount_hash(config.hash_key(), &amount));
                Ok(())
            }
            Some(reported) => {
                if trust::verify_amount_hash(config.hash_key(), &amount, reported.trim()) {
                    println!("{} Hash matches {}", style("✓").green(), amount);
                    Ok(())
                } else {
                    Err(format!("Hash does not match {}", amount))
                }
            }
        }
    }
}
