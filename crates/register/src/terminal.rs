//! Line-oriented terminal front-end for the register.
//!
//! The cashier types one command per line:
//!
//! ```text
//! category <id>     list the products of a category
//! add <product-id>  add one unit of a listed product
//! pay <method>      cash, mpesa or credit
//! name <text>       customer name for credit sales
//! cart              show the cart
//! products          show the product list
//! checkout          submit the sale
//! help              show this list
//! quit              leave the till
//! ```

use std::io::{self, Write};
use std::str::FromStr;

use thiserror::Error;
use till_core::{CategoryId, PaymentMethod, PaymentMethodError, ProductId};
use tokio::sync::Notify;

use crate::backend::SalesBackend;
use crate::register::{Host, Register};
use crate::view::{CartView, PaymentView, ProductEntry, Region, Screen};

pub const HELP: &str = "\
Commands:
  category <id>     list the products of a category
  add <product-id>  add one unit of a listed product
  pay <method>      cash, mpesa or credit
  name <text>       customer name for credit sales
  cart              show the cart
  products          show the product list
  checkout          submit the sale
  help              show this list
  quit              leave the till";

/// Errors that can occur when parsing a command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0} (type `help`)")]
    Unknown(String),

    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error(transparent)]
    PaymentMethod(#[from] PaymentMethodError),
}

/// One cashier command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Category(CategoryId),
    Add(ProductId),
    Pay(PaymentMethod),
    Name(String),
    Cart,
    Products,
    Checkout,
    Help,
    Quit,
}

fn parse_id<T: FromStr>(command: &'static str, arg: &str) -> Result<T, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::MissingArgument(command));
    }
    arg.parse().map_err(|_| CommandError::InvalidId(arg.to_string()))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, arg) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let arg = arg.trim();

        match word.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "category" | "c" => parse_id("category", arg).map(Self::Category),
            "add" | "a" => parse_id("add", arg).map(Self::Add),
            "pay" => {
                if arg.is_empty() {
                    return Err(CommandError::MissingArgument("pay"));
                }
                Ok(Self::Pay(arg.parse()?))
            }
            "name" => Ok(Self::Name(arg.to_string())),
            "cart" => Ok(Self::Cart),
            "products" | "ls" => Ok(Self::Products),
            "checkout" => Ok(Self::Checkout),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Product list as printed.
#[must_use]
pub fn format_products(entries: &[ProductEntry]) -> String {
    if entries.is_empty() {
        return "No products listed".to_string();
    }
    entries
        .iter()
        .map(|e| {
            let sold_out = if e.add_enabled { "" } else { "  [sold out]" };
            format!("{:>5}  {}{sold_out}", e.product_id, e.label)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cart and grand total as printed.
#[must_use]
pub fn format_cart(cart: &CartView) -> String {
    let mut out = String::new();
    if cart.lines.is_empty() {
        out.push_str("Cart is empty\n");
    }
    for line in &cart.lines {
        out.push_str("  ");
        out.push_str(&line.text);
        out.push('\n');
    }
    out.push_str(&format!("Total: {}", cart.total_price));
    out
}

/// Payment controls as printed.
#[must_use]
pub fn format_payment(payment: &PaymentView) -> String {
    if payment.customer_name_visible {
        format!(
            "Payment: {}  Customer: {}",
            payment.payment_method, payment.customer_name
        )
    } else {
        format!("Payment: {}", payment.payment_method)
    }
}

fn format_region(region: Region, screen: &Screen) -> String {
    match region {
        Region::ProductList => format_products(&screen.product_list),
        Region::Cart => format_cart(&screen.cart),
        Region::PaymentControls => format_payment(&screen.payment),
    }
}

/// [`Host`] that prints to stdout and signals reloads to the input loop.
#[derive(Debug, Default)]
pub struct TerminalHost {
    reload: Notify,
}

impl TerminalHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Print one block of text.
    pub fn print(&self, text: &str) {
        let mut out = io::stdout().lock();
        if let Err(e) = writeln!(out, "{text}") {
            tracing::debug!(error = %e, "Failed to write to terminal");
        }
    }

    /// Wait until the register asks for a reload.
    pub async fn reload_requested(&self) {
        self.reload.notified().await;
    }
}

impl Host for TerminalHost {
    fn alert(&self, message: &str) {
        self.print(&format!("*** {message}"));
    }

    fn request_reload(&self) {
        self.reload.notify_one();
    }

    fn redraw(&self, region: Region, screen: &Screen) {
        self.print(&format_region(region, screen));
    }
}

/// What the input loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run one command against the register.
pub async fn execute<B: SalesBackend>(
    register: &Register<B, TerminalHost>,
    command: Command,
) -> Flow {
    let host = register.host();
    match command {
        Command::Category(category) => {
            if register.filter_category(category).await.is_err() {
                host.print(&format!("Could not load category {category}"));
            }
        }
        Command::Add(product_id) => {
            let screen = register.screen();
            match screen.product(product_id) {
                None => host.print(&format!(
                    "Product {product_id} is not listed; open its category first"
                )),
                Some(entry) if !entry.add_enabled => {
                    host.print(&format!("{} is sold out", entry.name));
                }
                Some(entry) => {
                    register
                        .add_to_cart(product_id, &entry.name, entry.price)
                        .await;
                }
            }
        }
        Command::Pay(method) => register.select_payment_method(method),
        Command::Name(name) => register.set_customer_name(&name),
        Command::Cart => host.print(&format_cart(&register.screen().cart)),
        Command::Products => host.print(&format_products(&register.screen().product_list)),
        Command::Checkout => {
            register.checkout().await;
        }
        Command::Help => host.print(HELP),
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}
