//! pocketpay CLI
//!
//! Thin command layer over [`pocketpay::Wallet`]. Every command loads
//! `config/<env>.yaml`, starts logging, runs one wallet operation against
//! the HTTP API and prints the result.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};

use pocketpay::config::AppConfig;
use pocketpay::logging::init_logging;
use pocketpay::models::{CardId, UserId, UserSummary};
use pocketpay::money::from_canonical_minor_units;
use pocketpay::pagination::{PageSlot, page_window};
use pocketpay::{Currency, HttpWalletApi, NewCardForm, SendFlow, TopUpFlow, TopUpMethod, Wallet};

#[derive(Parser, Debug)]
#[command(author, version, long_version = env!("POCKETPAY_LONG_VERSION"), about)]
struct Cli {
    /// Config environment, loads config/<env>.yaml
    #[arg(short, long, default_value = "dev", global = true)]
    env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with email and password
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Signup {
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    Logout,
    /// Show the current profile
    Me,
    Balance,
    /// Transaction history, newest first
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Send money to another user, found by name or email
    Send {
        to: String,
        /// Amount in your display currency
        amount: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Add money from a card or UPI
    Add {
        /// Amount in your display currency
        amount: String,
        #[arg(long, value_enum, default_value_t = MethodArg::Card)]
        method: MethodArg,
        /// Stored card id
        #[arg(long, conflicts_with = "card_number")]
        card: Option<CardId>,
        #[command(flatten)]
        new_card: NewCardArgs,
    },
    /// Stored cards
    Cards {
        #[command(subcommand)]
        action: Option<CardsAction>,
    },
    Friends {
        #[command(subcommand)]
        action: Option<FriendsAction>,
    },
    /// Find users by name or email (at least 3 characters)
    Search { query: String },
    /// Show or change the display currency
    Currency { code: Option<Currency> },
    /// Server health check
    Health,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MethodArg {
    Card,
    Upi,
}

impl From<MethodArg> for TopUpMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Card => TopUpMethod::Card,
            MethodArg::Upi => TopUpMethod::Upi,
        }
    }
}

#[derive(clap::Args, Debug, Default)]
struct NewCardArgs {
    #[arg(long)]
    card_number: Option<String>,
    #[arg(long)]
    expiry_month: Option<String>,
    #[arg(long)]
    expiry_year: Option<String>,
    #[arg(long)]
    cvv: Option<String>,
    #[arg(long)]
    holder: Option<String>,
}

impl NewCardArgs {
    fn is_empty(&self) -> bool {
        self.card_number.is_none()
    }

    /// Feed the values through the form filters, like keystrokes would
    fn fill(&self, form: &mut NewCardForm) -> Result<()> {
        let field = |name: &str, accepted: bool| {
            if accepted {
                Ok(())
            } else {
                Err(anyhow!("invalid {}", name))
            }
        };
        field(
            "card number",
            form.set_card_number(self.card_number.as_deref().unwrap_or_default()),
        )?;
        field(
            "expiry month",
            form.set_expiry_month(self.expiry_month.as_deref().unwrap_or_default()),
        )?;
        field(
            "expiry year",
            form.set_expiry_year(self.expiry_year.as_deref().unwrap_or_default()),
        )?;
        field("cvv", form.set_cvv(self.cvv.as_deref().unwrap_or_default()))?;
        form.set_holder_name(self.holder.as_deref().unwrap_or_default());
        Ok(())
    }
}

#[derive(Subcommand, Debug)]
enum CardsAction {
    List,
    Add {
        #[command(flatten)]
        card: NewCardArgs,
    },
    Delete { id: CardId },
}

#[derive(Subcommand, Debug)]
enum FriendsAction {
    List,
    Add { id: UserId },
    Remove { id: UserId },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.env)
        .with_context(|| format!("loading config for env '{}'", cli.env))?;
    let _log_guard = init_logging(&config.logging);
    tracing::debug!(env = %cli.env, base_url = %config.api.base_url, "starting pocketpay");

    let api = HttpWalletApi::new(&config.api).context("building API client")?;
    let wallet = Wallet::from_config(Arc::new(api), &config);

    run(cli.command, &wallet, &config).await
}

async fn run(command: Command, wallet: &Wallet, config: &AppConfig) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            wallet.login(&email, &password).await?;
            println!("Logged in as {}", email);
        }
        Command::Signup {
            email,
            password,
            name,
        } => {
            wallet.signup(&email, &password, name.as_deref()).await?;
            println!("Account created for {}", email);
        }
        Command::Logout => {
            if let Err(e) = wallet.logout().await {
                println!("Logged out locally ({})", e);
            } else {
                println!("Logged out");
            }
        }
        Command::Me => {
            let user = wallet.current_user().await?;
            println!("{} <{}> (id {})", user.name, user.email, user.id);
            println!(
                "Balance:  {}",
                from_canonical_minor_units(user.balance, user.currency)
            );
            println!("Currency: {}", user.currency);
        }
        Command::Balance => {
            println!("{}", wallet.display_balance().await?);
        }
        Command::History { page, limit } => {
            let limit = limit.unwrap_or(config.display.history_page_size);
            let currency = wallet.currency().await;
            let history = wallet.transaction_history(page, limit).await?;
            for tx in &history.transactions {
                let counterparty = tx
                    .receiver
                    .as_ref()
                    .or(tx.sender.as_ref())
                    .map_or("-", |u| u.name.as_str());
                println!(
                    "#{:<6} {:<9?} {:>12}  {:<16} {}",
                    tx.id,
                    tx.kind,
                    from_canonical_minor_units(tx.amount, currency).to_string(),
                    counterparty,
                    tx.description
                );
            }
            let pages: Vec<String> = page_window(history.page, history.total_pages())
                .into_iter()
                .map(|slot| match slot {
                    PageSlot::Page(p) if p == history.page => format!("[{}]", p),
                    PageSlot::Page(p) => p.to_string(),
                    PageSlot::Ellipsis => "...".to_string(),
                })
                .collect();
            println!("{} transactions  {}", history.total, pages.join(" "));
        }
        Command::Send { to, amount, note } => {
            let currency = wallet.currency().await;
            let mut flow = SendFlow::new(currency);
            flow.set_search(&to);
            let candidates = wallet.search_users(flow.search_text()).await?;
            let recipient = pick_recipient(&to, candidates)?;
            flow.select_recipient(recipient);
            if !flow.edit_amount(&amount) {
                bail!("'{}' is not an amount", amount);
            }
            flow.set_note(note.as_deref().unwrap_or_default());

            let tx = flow.submit(wallet).await?;
            println!(
                "Sent {} (transaction #{})",
                from_canonical_minor_units(tx.amount, currency),
                tx.id
            );
        }
        Command::Add {
            amount,
            method,
            card,
            new_card,
        } => {
            let currency = wallet.currency().await;
            let mut flow = TopUpFlow::new(currency);
            if !flow.edit_amount(&amount) {
                bail!("'{}' is not an amount", amount);
            }
            flow.continue_to_methods()?;
            flow.select_method(method.into())?;

            if let MethodArg::Card = method {
                flow.continue_to_cards()?;
                match card {
                    Some(id) => flow.select_stored_card(id)?,
                    None if !new_card.is_empty() => new_card.fill(flow.new_card_mut()?)?,
                    None => bail!("pass --card <id> or the new card details"),
                }
            }
            if let Some(quote) = flow.fee_quote()
                && !quote.is_free()
            {
                println!("Fee {}  Total {}", quote.fee_display(), quote.total_display());
            }

            let outcome = flow.submit(wallet).await?;
            println!(
                "New balance {}",
                from_canonical_minor_units(outcome.new_balance(), currency)
            );
        }
        Command::Cards { action } => match action.unwrap_or(CardsAction::List) {
            CardsAction::List => {
                for card in wallet.cards().await? {
                    println!(
                        "{:>4}  {:<4} {}  {}/{}  {}",
                        card.id,
                        card.card_type,
                        card.masked_number,
                        card.expiry_month,
                        card.expiry_year,
                        card.holder_name
                    );
                }
            }
            CardsAction::Add { card } => {
                let mut form = NewCardForm::new();
                card.fill(&mut form)?;
                let stored = wallet.add_card(&form.validate()?).await?;
                println!("Saved card {} ({})", stored.id, stored.masked_number);
            }
            CardsAction::Delete { id } => {
                println!("{}", wallet.delete_card(id).await?.message);
            }
        },
        Command::Friends { action } => match action.unwrap_or(FriendsAction::List) {
            FriendsAction::List => {
                for friend in wallet.friends().await? {
                    println!("{:>6}  {:<20} {}", friend.id, friend.name, friend.email);
                }
            }
            FriendsAction::Add { id } => println!("{}", wallet.add_friend(id).await?.message),
            FriendsAction::Remove { id } => {
                println!("{}", wallet.remove_friend(id).await?.message)
            }
        },
        Command::Search { query } => {
            let users = wallet.search_users(&query).await?;
            if users.is_empty() {
                println!("No users found");
            }
            for user in users {
                println!("{:>6}  {:<20} {}", user.id, user.name, user.email);
            }
        }
        Command::Currency { code } => match code {
            Some(currency) => {
                wallet.set_currency(currency).await?;
                println!("Display currency set to {}", currency);
            }
            None => println!("{}", wallet.currency().await),
        },
        Command::Health => {
            println!("{}", wallet.health().await?.status);
        }
    }
    Ok(())
}

/// Exact name or email match wins, otherwise the search must be unambiguous
fn pick_recipient(query: &str, candidates: Vec<UserSummary>) -> Result<UserSummary> {
    let query = query.trim();
    if let Some(exact) = candidates
        .iter()
        .find(|u| u.email.eq_ignore_ascii_case(query) || u.name == query)
    {
        return Ok(exact.clone());
    }
    match candidates.len() {
        0 => bail!("no user matches '{}'", query),
        1 => Ok(candidates.into_iter().next().context("empty candidate list")?),
        n => bail!("'{}' matches {} users, be more specific", query, n),
    }
}
