//! Generate an encryption key file

use anyhow::{Context, Result};
use coffer_core::crypto::generate_key_file;

use crate::cli::KeygenArgs;
use crate::output;

pub fn run(args: KeygenArgs) -> Result<()> {
    output::header("Generate Encryption Key");
    output::kv("Output", &args.output.display().to_string());
    output::kv("Algorithm", "ChaCha20-Poly1305 (256-bit key)");
    println!();

    let path = generate_key_file(&args.output, args.force)
        .with_context(|| format!("Failed to generate key file {}", args.output.display()))?;

    output::success("Key generated successfully");
    output::kv("Key file", &path);
    println!();
    output::warning("IMPORTANT: Keep this key secure and backed up! Objects cannot be read without it");
    output::info("Pass it with --key-file to encrypt and decrypt transparently");

    Ok(())
}
