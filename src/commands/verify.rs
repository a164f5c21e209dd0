//! Policy hash verification command

use anyhow::{bail, Context, Result};
use screener_policy::signature::{self, Verification};
use screener_policy::PolicyDocument;
use std::path::PathBuf;
use tracing::{error, info};

pub fn run(policy_path: PathBuf) -> Result<()> {
    let doc = PolicyDocument::load(&policy_path)
        .with_context(|| format!("Error reading policy {}", policy_path.display()))?;

    match signature::verify(&doc)? {
        Verification::Placeholder { calculated } => {
            info!("Policy signature is placeholder");
            println!("Calculated hash: {}", calculated);
            println!("\nTo update the policy with this signature:");
            println!("   1. Copy the hash above");
            println!(
                "   2. Replace the 'signature' field in {}",
                policy_path.display()
            );
            println!("   3. Run this command again to verify");
            Ok(())
        }
        Verification::Mismatch {
            expected,
            calculated,
        } => {
            error!("Policy signature mismatch!");
            eprintln!("Expected: {}", expected);
            eprintln!("Got:      {}", calculated);
            bail!("Policy file may have been modified or corrupted")
        }
        Verification::Valid {
            algorithm,
            hash,
            enforce_hash,
        } => {
            println!("Policy signature valid");
            println!("   Algorithm: {}", algorithm);
            println!("   Hash: {}", hash);
            println!("   Enforcement: {}", enforce_hash);
            Ok(())
        }
    }
}
