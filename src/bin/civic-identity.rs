use std::{
    io::Read as _,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use civic_identity_core::{
    action_domain::{build_action_domain, ActionDomainParams, JurisdictionType},
    config::CoreConfig,
    credential::{
        hash_district, AddressVerificationMethod, CredentialIssuer, DistrictResidencyCredential,
        IssueCredentialRequest,
    },
    did::{derive_did_key_from_base64url, get_cose_key_algorithm},
    field::hex_to_field,
    identity::{derive_user_secret, generate_user_entropy},
    nullifier::compute_nullifier,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Civic identity core toolkit", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: CoreConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive the action-domain scalar for one civic action
    ActionDomain {
        #[arg(long)]
        country: String,
        #[arg(long)]
        jurisdiction: JurisdictionType,
        #[arg(long)]
        recipient_subdivision: String,
        #[arg(long)]
        template_id: String,
        #[arg(long)]
        session_id: String,
    },

    /// Compute hash2(userSecret, actionDomain)
    Nullifier {
        #[arg(long)]
        user_secret: String,
        #[arg(long)]
        action_domain: String,
    },

    /// Derive a user secret; generates fresh entropy when none is given
    UserSecret {
        #[arg(long)]
        identity_commitment: String,
        #[arg(long)]
        user_entropy: Option<String>,
    },

    /// Derive a did:key from a base64url COSE_Key
    DidKey {
        #[arg(long)]
        public_key: String,
    },

    /// Issue a signed district residency credential
    IssueCredential {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        did_key: Option<String>,
        #[arg(long)]
        congressional: String,
        #[arg(long)]
        state_senate: Option<String>,
        #[arg(long)]
        state_assembly: Option<String>,
        #[arg(long, value_parser = parse_verification_method, default_value = "civic_api")]
        method: AddressVerificationMethod,
    },

    /// Verify a credential JSON file (`-` for stdin) against the configured key
    VerifyCredential {
        #[arg(long)]
        file: PathBuf,
    },

    /// SHA-256 of a district code
    HashDistrict {
        #[arg(long)]
        district: String,
    },

    /// Salted pseudonymous id for an internal user id
    Pseudonym {
        #[arg(long)]
        user_id: String,
    },
}

fn parse_verification_method(s: &str) -> Result<AddressVerificationMethod, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown verification method {s:?}; expected civic_api or postal"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(config = ?cli.config, "configuration loaded");

    match cli.command {
        Command::ActionDomain {
            country,
            jurisdiction,
            recipient_subdivision,
            template_id,
            session_id,
        } => {
            let params = ActionDomainParams {
                country,
                jurisdiction_type: jurisdiction,
                recipient_subdivision,
                template_id,
                session_id,
            };
            println!("{}", build_action_domain(&params)?);
        }
        Command::Nullifier {
            user_secret,
            action_domain,
        } => {
            let secret = hex_to_field(&user_secret).context("invalid --user-secret")?;
            let domain = hex_to_field(&action_domain).context("invalid --action-domain")?;
            println!("{}", compute_nullifier(&secret, &domain));
        }
        Command::UserSecret {
            identity_commitment,
            user_entropy,
        } => {
            let entropy = match user_entropy {
                Some(e) => e,
                None => {
                    let fresh = generate_user_entropy().to_hex();
                    println!("userEntropy: {fresh}");
                    fresh
                }
            };
            println!("userSecret: {}", derive_user_secret(&identity_commitment, &entropy)?);
        }
        Command::DidKey { public_key } => {
            println!("{}", derive_did_key_from_base64url(&public_key)?);
            let bytes = URL_SAFE_NO_PAD.decode(public_key.trim_end_matches('='))?;
            if let Some(alg) = get_cose_key_algorithm(&bytes)? {
                tracing::info!(alg = alg.label(), "declared key algorithm");
            }
        }
        Command::IssueCredential {
            user_id,
            did_key,
            congressional,
            state_senate,
            state_assembly,
            method,
        } => {
            let issuer = CredentialIssuer::from_config(&cli.config)?;
            let credential = issuer.issue(&IssueCredentialRequest {
                user_id,
                did_key,
                congressional,
                state_senate,
                state_assembly,
                verification_method: method,
            })?;
            println!("{}", serde_json::to_string_pretty(&credential)?);
        }
        Command::VerifyCredential { file } => {
            let issuer = CredentialIssuer::from_config(&cli.config)?;
            let raw = read_input(&file)?;
            let credential: DistrictResidencyCredential =
                serde_json::from_str(&raw).context("credential is not valid JSON")?;
            println!("{}", issuer.verify(&credential));
        }
        Command::HashDistrict { district } => {
            println!("{}", hash_district(&district));
        }
        Command::Pseudonym { user_id } => {
            let salt = cli.config.pseudonym_salt()?;
            println!("{}", salt.pseudonymize(&user_id));
        }
    }

    Ok(())
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
