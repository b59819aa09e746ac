//! Hand-rolled flag parsing. Argument parsing itself is out of this
//! system's scope; these four named flags are just enough surface to
//! locate credentials and local state, so a dependency as large as a
//! derive-based parser isn't worth pulling in for it.

#[derive(Debug, Clone)]
pub struct Args {
    pub crypto_token_file: String,
    pub project_name: Option<String>,
    pub credentials_bucket_name: String,
    pub last_update_token_path: String,
}

impl Args {
    pub fn parse(raw: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut crypto_token_file = None;
        let mut project_name = None;
        let mut credentials_bucket_name = None;
        let mut last_update_token_path = None;

        let mut args = raw.skip(1);
        while let Some(flag) = args.next() {
            let value = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))?;
            match flag.as_str() {
                "--crypto-token-file" => crypto_token_file = Some(value),
                "--project-name" => project_name = Some(value),
                "--credentials-bucket-name" => credentials_bucket_name = Some(value),
                "--last-update-token-path" => last_update_token_path = Some(value),
                other => anyhow::bail!("unrecognized flag: {other}"),
            }
        }

        Ok(Self {
            crypto_token_file: crypto_token_file
                .ok_or_else(|| anyhow::anyhow!("--crypto-token-file is required"))?,
            project_name,
            credentials_bucket_name: credentials_bucket_name
                .ok_or_else(|| anyhow::anyhow!("--credentials-bucket-name is required"))?,
            last_update_token_path: last_update_token_path
                .ok_or_else(|| anyhow::anyhow!("--last-update-token-path is required"))?,
        })
    }
}
