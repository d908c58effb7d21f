//! # plan-checkout
//!
//! Drives the plan-checkout flows against a live backend from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! # Point at the backend
//! export API_BASE_URL=https://api.example.com
//! export API_AUTH_TOKEN=...
//!
//! # Pay for a plan with the first registered card
//! plan-checkout checkout --plan PRO --months 3
//!
//! # Watch an existing payment
//! plan-checkout poll pay_123
//! ```

use anyhow::{anyhow, Context, Result};
use checkout_backend::HttpBackend;
use checkout_cli::{card_line, ConsoleNavigator, Settings};
use checkout_core::{
    BackendApi, CardOption, CheckoutContextStore, ErrorKind, InvoiceId, Navigator, PlanSelection,
    RedirectParams, SharedBackend,
};
use checkout_flow::{
    CardWallet, CheckoutFlow, CheckoutOutcome, PaymentPoller, RedirectConfirmationHandler,
    ResultFinalizer,
};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "plan-checkout", about = "Subscription checkout and payment confirmation", version)]
struct Cli {
    /// Settings file (default: config/checkout.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,

    #[arg(long, global = true, action = ArgAction::SetTrue, help = "Emit logs as JSON lines")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered cards
    Cards,
    /// Remove a registered card
    RemoveCard(CardArgs),
    /// Create an invoice, start the payment and poll it to completion
    Checkout(CheckoutArgs),
    /// Poll an existing payment handle until it is done
    Poll { handle: String },
    /// Confirm a payment from a result-page URL
    Finalize {
        url: String,
        /// Invoice id recovered from the session
        #[arg(long)]
        session_invoice: Option<u64>,
    },
    /// Handle a billing-key redirect-landing URL
    Redirect {
        url: String,
        /// Checkout page the shopper left from
        #[arg(long)]
        checkout_url: Option<String>,
        /// Navigate back to checkout afterwards
        #[arg(long, action = ArgAction::SetTrue)]
        return_to_checkout: bool,
    },
    /// Show the merged parameters of a redirect URL
    Params { url: String },
    /// Cancel a payment
    CancelPayment {
        payment_id: String,
        #[arg(long, default_value = "Requested by customer")]
        reason: String,
    },
    /// Stop the subscription from renewing
    CancelRenewal {
        #[arg(long, default_value = "Requested by customer")]
        reason: String,
    },
    /// Validate settings
    Doctor,
}

#[derive(Args, Clone, Default)]
struct CardArgs {
    #[arg(long)]
    pay_id: Option<String>,
    #[arg(long)]
    billing_key: Option<String>,
}

impl CardArgs {
    fn card(&self) -> Option<CardOption> {
        if self.pay_id.is_none() && self.billing_key.is_none() {
            return None;
        }
        Some(CardOption {
            pay_id: self.pay_id.clone(),
            billing_key: self.billing_key.clone(),
            ..Default::default()
        })
    }
}

#[derive(Args)]
struct CheckoutArgs {
    /// Checkout query string, e.g. "code=PRO&months=3"
    #[arg(long, conflicts_with = "plan")]
    query: Option<String>,
    #[arg(long)]
    plan: Option<String>,
    #[arg(long, default_value_t = 1)]
    months: u32,
    #[command(flatten)]
    card: CardArgs,
}

impl CheckoutArgs {
    fn plan(&self) -> Result<PlanSelection> {
        let plan = match (&self.query, &self.plan) {
            (Some(query), _) => PlanSelection::from_query(query),
            (None, Some(code)) => PlanSelection::new(code.clone(), self.months),
            (None, None) => return Err(anyhow!("either --plan or --query is required")),
        };
        if plan.plan_code.is_empty() {
            return Err(anyhow!("no plan code given"));
        }
        Ok(plan)
    }
}

struct CliContext {
    settings: Settings,
    backend: SharedBackend,
    store: CheckoutContextStore,
    json: bool,
}

impl CliContext {
    fn initialize(cli: &Cli) -> Result<Self> {
        let settings = Settings::load(cli.config.as_deref())?;
        let backend = HttpBackend::new(settings.backend_config()?)
            .context("failed to initialize backend client")?;
        info!("Backend: {}", backend.config().api_base_url);

        Ok(Self {
            settings,
            backend: Arc::new(backend),
            store: CheckoutContextStore::in_memory(),
            json: cli.json,
        })
    }

    fn navigator(&self, href: impl Into<String>) -> Arc<ConsoleNavigator> {
        Arc::new(ConsoleNavigator::at(href))
    }

    fn page(&self, fragment: &str) -> String {
        format!("{}/#{}", self.settings.origin(), fragment)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let context = CliContext::initialize(&cli)?;

    match cli.command {
        Commands::Cards => list_cards(&context).await?,
        Commands::RemoveCard(args) => remove_card(&context, args).await?,
        Commands::Checkout(args) => checkout(&context, args).await?,
        Commands::Poll { handle } => poll(&context, handle).await?,
        Commands::Finalize {
            url,
            session_invoice,
        } => finalize(&context, url, session_invoice).await?,
        Commands::Redirect {
            url,
            checkout_url,
            return_to_checkout,
        } => redirect(&context, url, checkout_url, return_to_checkout).await?,
        Commands::Params { url } => params(&context, &url)?,
        Commands::CancelPayment { payment_id, reason } => {
            context
                .backend
                .cancel_payment(&payment_id, &reason)
                .await
                .context("failed to cancel payment")?;
            println!("Payment {} canceled", payment_id);
        }
        Commands::CancelRenewal { reason } => {
            context
                .backend
                .cancel_renewal(&reason)
                .await
                .context("failed to cancel renewal")?;
            println!("Renewal canceled");
        }
        Commands::Doctor => doctor(&context),
    }

    Ok(())
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    if json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

// =============================================================================
// Cards
// =============================================================================

async fn list_cards(context: &CliContext) -> Result<()> {
    let mut wallet = CardWallet::new(context.backend.clone());
    wallet.load().await.context("failed to load cards")?;

    if context.json {
        return print_json(&wallet.cards());
    }
    if wallet.cards().is_empty() {
        println!("No registered cards");
    }
    for (i, card) in wallet.cards().iter().enumerate() {
        println!("{}", card_line(i, card, Some(card) == wallet.selected()));
    }
    Ok(())
}

async fn remove_card(context: &CliContext, args: CardArgs) -> Result<()> {
    let card = args
        .card()
        .ok_or_else(|| anyhow!("--pay-id or --billing-key is required"))?;

    let mut wallet = CardWallet::new(context.backend.clone());
    wallet.remove(&card).await.context("failed to remove card")?;
    println!("Card removed; {} card(s) remain", wallet.cards().len());
    Ok(())
}

// =============================================================================
// Checkout & polling
// =============================================================================

async fn checkout(context: &CliContext, args: CheckoutArgs) -> Result<()> {
    let plan = args.plan()?;

    let card = match args.card.card() {
        Some(card) => card,
        None => {
            let mut wallet = CardWallet::new(context.backend.clone());
            wallet.load().await.context("failed to load cards")?;
            wallet
                .selected()
                .cloned()
                .ok_or_else(|| anyhow!("no usable card registered"))?
        }
    };

    let page = context.settings.checkout_page(&plan)?;
    let navigator = context.navigator(page);
    let flow = CheckoutFlow::new(context.backend.clone(), context.store.clone(), navigator);
    flow.mount();

    info!(plan = %plan.plan_code, months = plan.months, "Starting checkout");
    let outcome = tokio::select! {
        outcome = flow.run(&plan, &card) => outcome,
        _ = tokio::signal::ctrl_c() => {
            flow.teardown();
            CheckoutOutcome::Canceled
        }
    };

    match outcome {
        CheckoutOutcome::Completed { outcome, route } => {
            let snapshot = outcome.snapshot();
            if context.json {
                return print_json(&json!({
                    "success": outcome.is_success(),
                    "status": snapshot.status,
                    "paymentId": snapshot.payment_id,
                    "route": route,
                }));
            }
            println!(
                "Payment {}: {}",
                if outcome.is_success() { "succeeded" } else { "did not succeed" },
                snapshot.status
            );
        }
        CheckoutOutcome::Aborted { message, kind } => {
            return Err(match kind {
                ErrorKind::Transient => anyhow!("{} Please try again.", message),
                _ => anyhow!(message),
            })
        }
        CheckoutOutcome::Canceled => println!("Checkout canceled"),
    }
    Ok(())
}

async fn poll(context: &CliContext, handle: String) -> Result<()> {
    let session = PaymentPoller::new(context.backend.clone()).start(handle);
    let mut progress = session.progress();
    let wait = session.wait();
    tokio::pin!(wait);

    let outcome = loop {
        tokio::select! {
            biased;
            outcome = &mut wait => break outcome,
            _ = tokio::signal::ctrl_c() => break None,
            changed = progress.changed() => {
                if changed.is_ok() {
                    let p = progress.borrow().clone();
                    eprintln!(
                        "payment in progress (elapsed {} s, status {}, {} lookups)",
                        p.attempt.elapsed_secs, p.attempt.status, p.polls
                    );
                }
            }
        }
    };

    match outcome {
        Some(outcome) if context.json => print_json(outcome.snapshot())?,
        Some(outcome) => println!("Payment done: {}", outcome.snapshot().status),
        None => println!("Polling stopped"),
    }
    Ok(())
}

// =============================================================================
// Landing pages
// =============================================================================

async fn finalize(context: &CliContext, url: String, session_invoice: Option<u64>) -> Result<()> {
    if let Some(id) = session_invoice {
        context.store.set_pending_invoice(InvoiceId::from(id));
    }

    let finalizer = ResultFinalizer::new(
        context.backend.clone(),
        context.store.clone(),
        context.navigator(url),
    );
    let outcome = finalizer
        .run()
        .await
        .ok_or_else(|| anyhow!("result page already finalized"))?;

    if context.json {
        return print_json(&json!({
            "outcome": format!("{:?}", outcome),
            "message": outcome.message(),
        }));
    }
    println!("{}", outcome.message());
    Ok(())
}

async fn redirect(
    context: &CliContext,
    url: String,
    checkout_url: Option<String>,
    return_to_checkout: bool,
) -> Result<()> {
    let checkout_url = checkout_url.unwrap_or_else(|| context.page("/plan/checkout"));
    context.store.remember_page(&checkout_url);

    let navigator = context.navigator(url);
    let handler =
        RedirectConfirmationHandler::new(context.backend.clone(), context.store.clone(), navigator.clone());
    let outcome = handler.handle().await;

    if context.json {
        print_json(&json!({
            "outcome": format!("{:?}", outcome),
            "message": outcome.message(),
        }))?;
    } else {
        println!("{}", outcome.message());
    }

    if return_to_checkout && handler.return_to_checkout().is_none() {
        return Err(anyhow!("cannot return to checkout from {}", navigator.current_href()));
    }
    Ok(())
}

fn params(context: &CliContext, url: &str) -> Result<()> {
    let params = RedirectParams::from_url(url);
    let sorted: BTreeMap<&str, &str> = params.iter().collect();

    if context.json {
        return print_json(&sorted);
    }
    for (key, value) in sorted {
        println!("{} = {}", key, value);
    }
    Ok(())
}

fn doctor(context: &CliContext) {
    println!("Backend: {}", context.settings.backend.base_url.as_deref().unwrap_or("(default)"));
    match context.settings.gateway_config() {
        Ok(gateway) => println!(
            "Gateway: store {} / method {} / redirect {}",
            gateway.store_id,
            gateway.billing_key_method,
            gateway
                .redirect_url(&context.page("/plan/checkout"))
                .unwrap_or_default()
        ),
        Err(e) => println!("Gateway: {}", e),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
