// generate_key.rs
// Prints a fresh ENCRYPTION_MASTER_KEY for sealing stored tokens and API keys

#[path = "services/encryption.rs"]
#[allow(dead_code)]
mod encryption;

use encryption::EncryptionService;

fn main() {
    println!("Generating new AES-256 encryption key...\n");

    let key = EncryptionService::generate_key();

    println!("✅ Key generated successfully!\n");
    println!("Add this to your .env file:");
    println!("─────────────────────────────────────────────────");
    println!("ENCRYPTION_MASTER_KEY={}", key);
    println!("─────────────────────────────────────────────────");
    println!("\n⚠️  IMPORTANT:");
    println!("  • Keep this key secure and never commit it to version control");
    println!("  • Rotating it makes existing sessions and stored API keys unreadable");
    println!("  • Sessions recover on next sign-in; API keys must be re-entered");
}
