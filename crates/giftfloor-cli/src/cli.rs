//! CLI argument definitions for Giftfloor.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `price` | Aggregate floor prices for one gift across all marketplaces |
//! | `rates` | Show the current TON→USD and USDT→IRR exchange rates |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `text` | Output format (text, json) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! # Floor prices for a gift variant
//! giftfloor price "Desk Calendar" --variant "Dark Mode" --variant-percent 1.5%
//!
//! # Include the background facet and emit JSON
//! giftfloor price "Desk Calendar" --variant "Dark Mode" \
//!     --background "Deep Space" --format json --pretty
//!
//! # Just the exchange rates
//! giftfloor rates
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Giftfloor - collectible-gift floor price aggregator
///
/// Queries the Portals, Tonnel, and MRKT marketplaces concurrently for the
/// cheapest listing matching a gift's variant (and optionally background),
/// and annotates prices with TON→USD and USDT→IRR conversions.
#[derive(Debug, Parser)]
#[command(
    name = "giftfloor",
    author,
    version,
    about = "Collectible-gift floor price aggregator"
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text for terminal display.
    Text,
    /// Single JSON object output.
    Json,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Aggregate floor prices for one gift across all marketplaces.
    ///
    /// Every marketplace is queried twice: once filtering on the variant
    /// alone, once on variant plus background. A marketplace that cannot be
    /// reached degrades to an error entry without affecting the others.
    ///
    /// # Examples
    ///
    ///   giftfloor price "Desk Calendar" --variant "Dark Mode"
    ///   giftfloor price "Desk Calendar" --variant "Dark Mode" --variant-percent 1.5% --background "Deep Space"
    Price(PriceArgs),

    /// Show the current TON→USD and USDT→IRR exchange rates.
    Rates,
}

/// Arguments for the `price` command.
#[derive(Debug, Args)]
pub struct PriceArgs {
    /// Gift collection name (e.g. "Desk Calendar").
    pub collection: String,

    /// Variant (model) name. Required: a gift without a variant is not a
    /// priceable collectible.
    #[arg(long)]
    pub variant: Option<String>,

    /// Rarity percent label of the variant (e.g. "1.5%").
    #[arg(long)]
    pub variant_percent: Option<String>,

    /// Background (backdrop) name.
    #[arg(long)]
    pub background: Option<String>,

    /// Rarity percent label of the background.
    #[arg(long)]
    pub background_percent: Option<String>,
}
