//! Command-line arguments

use catalog::VariantFilter;
use clap::{Parser, Subcommand};

/// Storefront session and catalog client
#[derive(Debug, Parser)]
#[command(name = "storefront-sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Print Prometheus metrics to stderr when the command finishes
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Current session and user
    #[command(name = "whoami")]
    WhoAmI,

    /// Every catalog category
    Categories,

    /// Children of a category
    Subcategories { parent: u64 },

    /// Products in a category
    Products { category: u64 },

    /// One product
    Product { id: u64 },

    /// Variants of a product, optionally filtered
    Variants {
        product: u64,
        #[arg(long)]
        size: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },

    /// Current pricing of a product
    Pricing { id: u64 },

    /// End the session
    Logout,
}

impl Command {
    /// Variant filter for `variants`; empty for every other command.
    pub fn variant_filter(&self) -> VariantFilter {
        match self {
            Command::Variants { size, color, .. } => VariantFilter {
                size: size.clone(),
                color: color.clone(),
            },
            _ => VariantFilter::default(),
        }
    }
}
