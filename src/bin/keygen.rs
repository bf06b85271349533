//! Generate a tenant API key.
//!
//! Prints the key (shown once, never stored), its lookup prefix and the salted
//! hash to insert into the `users` table:
//!
//! ```text
//! keygen [--rounds N]
//! ```

use anyhow::{bail, Context};

use omni_gateway::auth::{
    generate_api_key, hash_api_key_with_rounds, key_prefix, DEFAULT_HASH_ROUNDS,
};

fn parse_rounds(mut args: impl Iterator<Item = String>) -> anyhow::Result<u32> {
    let mut rounds = DEFAULT_HASH_ROUNDS;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--rounds" => {
                let value = args.next().context("--rounds needs a value")?;
                rounds = value
                    .parse()
                    .with_context(|| format!("invalid --rounds value: {}", value))?;
                if rounds == 0 {
                    bail!("--rounds must be greater than 0");
                }
            }
            other => bail!("unknown argument: {}", other),
        }
    }
    Ok(rounds)
}

fn main() -> anyhow::Result<()> {
    let rounds = parse_rounds(std::env::args().skip(1))?;

    let key = generate_api_key();
    let hash = hash_api_key_with_rounds(&key, rounds);

    println!("api_key:        {}", key);
    println!("api_key_prefix: {}", key_prefix(&key));
    println!("api_key_hash:   {}", hash);
    Ok(())
}
