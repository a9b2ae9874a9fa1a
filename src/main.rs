//! Smart-contract wallet onboarding CLI
//!
//! Fills the wallet creation form from the command line and submits it.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use scw_onboarding::provisioning::SafeDeployment;
use scw_onboarding::{
    check_address, normalize, Config, ConfiguredProvisioner, CounterfactualProvisioner, FormError,
    ProvisionerKind, WalletCreationForm, WalletProvisioner,
};
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "scw-onboarding")]
#[command(about = "Create smart-contract wallets from a list of signer addresses")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProvisionerArg {
    Local,
    Relay,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill the form with signers and submit it
    Create {
        /// Signer address, in wallet owner order (repeat for each signer)
        #[arg(short, long = "signer", required = true)]
        signers: Vec<String>,

        /// Override the configured provisioner
        #[arg(short, long, value_enum)]
        provisioner: Option<ProvisionerArg>,
    },

    /// Print the counterfactual wallet address for a signer list
    Predict {
        /// Signer address, in wallet owner order (repeat for each signer)
        #[arg(short, long = "signer", required = true)]
        signers: Vec<String>,
    },

    /// Check whether values are usable signer addresses
    Check {
        addresses: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG overrides --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Create { signers, provisioner } => {
            if let Some(kind) = provisioner {
                config.provisioner = match kind {
                    ProvisionerArg::Local => ProvisionerKind::Local,
                    ProvisionerArg::Relay => ProvisionerKind::Relay,
                };
            }
            create_wallet(&config, &signers).await?
        }
        Commands::Predict { signers } => predict_wallet(&config, &signers)?,
        Commands::Check { addresses } => check_addresses(&addresses),
    }

    Ok(())
}

/// Build a form holding `signers` in order
fn fill_form<P: WalletProvisioner>(form: &WalletCreationForm<P>, signers: &[String]) -> Result<()> {
    for (index, signer) in signers.iter().enumerate() {
        form.add_signer_field()?;
        form.update_signer_field(index, signer.as_str())?;
    }
    Ok(())
}

async fn create_wallet(config: &Config, signers: &[String]) -> Result<()> {
    println!("\n{}", "=".repeat(70));
    println!("  CREATE WALLET");
    println!(
        "  Provisioner: {} | Chain: {} | Signers: {}",
        match config.provisioner {
            ProvisionerKind::Local => "LOCAL (counterfactual)",
            ProvisionerKind::Relay => "RELAY",
        },
        config.safe.chain_id,
        signers.len()
    );
    println!("{}\n", "=".repeat(70));

    let provisioner = ConfiguredProvisioner::from_config(config)?;
    let form = WalletCreationForm::with_max_signers(provisioner, config.max_signers);
    fill_form(&form, signers)?;

    match form.submit().await {
        Ok(wallet_id) => {
            println!("{} {}", "Wallet created:".green().bold(), wallet_id);
        }
        Err(FormError::Validation(report)) => {
            println!("{}", "Signer list rejected:".red().bold());
            for issue in &report.issues {
                println!("  - {}", issue);
            }
            anyhow::bail!("{} validation issue(s)", report.issues.len());
        }
        Err(err) => {
            error!("Wallet creation failed: {}", err);
            println!("{}", err.user_message().red());
            return Err(err.into());
        }
    }

    Ok(())
}

fn predict_wallet(config: &Config, signers: &[String]) -> Result<()> {
    let deployment = SafeDeployment::from_config(&config.safe)?;
    let provisioner = CounterfactualProvisioner::new(deployment)?;

    let report = scw_onboarding::validate_signers(
        &signers
            .iter()
            .map(|s| scw_onboarding::SignerAddressEntry::new(s.as_str()))
            .collect::<Vec<_>>(),
        config.max_signers,
    );

    match report {
        Ok(normalized) => {
            let address = provisioner.predict(&normalized)?;
            println!("{}", address);
            Ok(())
        }
        Err(report) => {
            for issue in &report.issues {
                println!("  - {}", issue.to_string().red());
            }
            anyhow::bail!("{} validation issue(s)", report.issues.len())
        }
    }
}

fn check_addresses(addresses: &[String]) {
    for raw in addresses {
        match check_address(raw) {
            Ok(address) => println!("{} {}", "OK ".green(), normalize(&address)),
            Err(issue) => println!("{} {} ({})", "BAD".red(), raw, issue),
        }
    }
}
