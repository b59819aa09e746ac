//! Single positional argument: path to the service-account credential file.

pub struct Args {
    pub crypto_token_file: String,
}

impl Args {
    pub fn parse(raw: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let crypto_token_file = raw
            .nth(1)
            .ok_or_else(|| anyhow::anyhow!("usage: command-router <credential-file>"))?;
        Ok(Self { crypto_token_file })
    }
}
