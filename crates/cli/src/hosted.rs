use std::sync::Arc;

use commerce_helcim_core::{
    HostedPage, InMemoryPaymentRepository, Services,
    hosted::{CallbackUrls, RedirectForm},
};
use commerce_helcim_types::{Order, Payment, Price};
use console::style;
use url::Url;

use crate::Context;

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct HostedFormCommand {
    /// Order id sent as `orderId`
    #[arg(long)]
    pub order_id: String,

    /// Order total, e.g. 19.99
    #[arg(long)]
    pub amount: String,

    #[arg(long, default_value = "USD")]
    pub currency: String,

    #[arg(long, default_value = "")]
    pub customer_id: String,

    #[arg(long, default_value = "")]
    pub email: String,

    /// URL the hosted page returns to after payment
    #[arg(long)]
    pub return_url: Url,

    /// URL the hosted page sends cancelled payments to
    #[arg(long)]
    pub cancel_url: Url,
}

impl HostedFormCommand {
    pub fn execute(&self, ctx: &Context) -> Result<(), String> {
        let (_, config) = ctx.gateway_config()?;
        let total = Price::parse(&self.amount, &self.currency).map_err(|e| e.to_string())?;
        let order = Order::new(&self.order_id, &self.customer_id, &self.email, total.clone());
        let payment = Payment::new(&self.order_id, total);

        let services = Services::new(Arc::new(InMemoryPaymentRepository::new()));
        let page = HostedPage::new(config, services);
        let form = page
            .build_redirect_form(
                &payment,
                &order,
                &CallbackUrls {
                    return_url: self.return_url.clone(),
                    cancel_url: self.cancel_url.clone(),
                },
            )
            .map_err(|e| e.to_string())?;

        println!(
            "{} {} {}",
            style("Form:").bold(),
            RedirectForm::METHOD.to_uppercase(),
            form.action
        );
        for (name, value) in &form.fields {
            println!("  {} {}", style(format!("{}:", name)).dim(), value);
        }
        Ok(())
    }
}
