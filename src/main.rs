use clap::Parser;
use miette::{IntoDiagnostic, Result, miette};
use mpesa_checkout::application::checkout::{CheckoutRequest, CheckoutService};
use mpesa_checkout::config::{HttpConfig, PollerConfig, PollerConfigFile};
use mpesa_checkout::domain::events::EventSink;
use mpesa_checkout::domain::order::{PaymentMethod, ShippingDetails};
use mpesa_checkout::domain::payment::{PaymentStatus, PollState};
use mpesa_checkout::domain::ports::{SharedOrderService, SharedPaymentGateway};
use mpesa_checkout::error::GatewayError;
use mpesa_checkout::infrastructure::http::HttpCommerceClient;
use mpesa_checkout::infrastructure::in_memory::{InMemoryOrderService, ScriptedPaymentGateway};
use mpesa_checkout::interfaces::console::StatusPrinter;
use mpesa_checkout::interfaces::csv::cart_reader::CartReader;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cart CSV file (product_id, quantity, price)
    #[arg(long)]
    cart: PathBuf,

    /// M-Pesa phone number that receives the STK Push
    #[arg(long, default_value = "")]
    phone: String,

    #[arg(long, default_value = "")]
    address: String,

    #[arg(long, default_value = "")]
    city: String,

    #[arg(long, default_value = "")]
    postal_code: String,

    #[arg(long, default_value = "")]
    country: String,

    /// Base URL of the commerce API
    #[arg(long, env = "MPESA_API_BASE_URL", default_value = "http://localhost:8000/api")]
    api_base_url: String,

    /// Bearer token for the commerce API
    #[arg(long, env = "MPESA_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// JSON file with poller settings
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_attempts: Option<u32>,

    #[arg(long)]
    poll_interval_ms: Option<u64>,

    #[arg(long)]
    success_redirect_ms: Option<u64>,

    #[arg(long)]
    timeout_redirect_ms: Option<u64>,

    /// Run against scripted in-memory collaborators instead of the API.
    /// Comma-separated statuses; `error` simulates a failed status check.
    #[arg(long, value_delimiter = ',')]
    simulate: Option<Vec<String>>,

    /// With --simulate, reject the initiation with this message
    #[arg(long, requires = "simulate")]
    simulate_reject: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn poller_config(&self) -> mpesa_checkout::error::Result<PollerConfig> {
        let base = match &self.config {
            Some(path) => PollerConfig::from_file(path)?,
            None => PollerConfig::default(),
        };
        base.merge(PollerConfigFile {
            max_attempts: self.max_attempts,
            poll_interval_ms: self.poll_interval_ms,
            success_redirect_ms: self.success_redirect_ms,
            timeout_redirect_ms: self.timeout_redirect_ms,
        })
    }

    fn collaborators(&self) -> Result<(SharedOrderService, SharedPaymentGateway)> {
        if let Some(script) = &self.simulate {
            let gateway = match &self.simulate_reject {
                Some(message) => ScriptedPaymentGateway::rejecting(message.clone()),
                None => ScriptedPaymentGateway::accepting("SIM-1"),
            };
            let statuses = script.iter().map(|status| match status.trim() {
                "error" => Err(GatewayError::Transport("simulated network error".to_string())),
                other => Ok(PaymentStatus::from(other)),
            });
            let orders: SharedOrderService = Arc::new(InMemoryOrderService::new());
            let gateway: SharedPaymentGateway = Arc::new(gateway.with_statuses(statuses));
            return Ok((orders, gateway));
        }

        let http = HttpConfig {
            base_url: self.api_base_url.clone(),
            token: self.api_token.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        };
        let client = Arc::new(HttpCommerceClient::new(&http).into_diagnostic()?);
        let orders: SharedOrderService = client.clone();
        let gateway: SharedPaymentGateway = client;
        Ok((orders, gateway))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.poller_config().into_diagnostic()?;
    let items = CartReader::new(File::open(&cli.cart).into_diagnostic()?)
        .read_all()
        .into_diagnostic()?;
    let (orders, gateway) = cli.collaborators()?;
    let service = CheckoutService::new(orders, gateway, config);

    let request = CheckoutRequest {
        shipping: ShippingDetails {
            address: cli.address.clone(),
            city: cli.city.clone(),
            postal_code: cli.postal_code.clone(),
            country: cli.country.clone(),
        },
        payment_method: PaymentMethod::MPesa,
        items,
        phone_number: cli.phone.clone(),
    };

    // Ctrl-C plays the role of navigating away from the checkout view.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let (events, rx) = EventSink::channel();
    let printer = tokio::spawn(StatusPrinter::new(io::stdout()).run(rx));
    let outcome = service.checkout(request, events, cancel).await;
    let summary = printer.await.into_diagnostic()?.into_diagnostic()?;

    let attempt = outcome.into_diagnostic()?;
    tracing::info!(
        order_id = %attempt.order_id(),
        state = ?attempt.state(),
        attempts = attempt.attempt_count(),
        navigated = summary.navigated_to_orders,
        "checkout finished"
    );
    match attempt.state() {
        PollState::Succeeded => Ok(()),
        PollState::TimedOut => Err(miette!(
            "payment for order {} not confirmed after {} checks",
            attempt.order_id(),
            attempt.attempt_count()
        )),
        PollState::Failed => Err(miette!("payment for order {} failed", attempt.order_id())),
        _ => Err(miette!(
            "payment for order {} abandoned before completion",
            attempt.order_id()
        )),
    }
}
