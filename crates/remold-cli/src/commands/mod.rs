pub mod analyze;
pub mod init;
pub mod migrate;

use std::path::Path;

use remold_core::{load_config, Migrator};

/// Split repeated `OLD=NEW` arguments. An empty right-hand side is kept.
pub fn parse_pairs(flag: &str, values: &[String]) -> miette::Result<Vec<(String, String)>> {
    values
        .iter()
        .map(|kv| match kv.split_once('=') {
            Some((old, new)) if !old.trim().is_empty() => {
                Ok((old.trim().to_string(), new.trim().to_string()))
            }
            _ => Err(miette::miette!(
                "invalid {flag} value '{kv}': expected OLD=NEW"
            )),
        })
        .collect()
}

pub fn load_migrator(config: &Path) -> miette::Result<Migrator> {
    let config = load_config(config)?;
    Ok(Migrator::new(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_pairs(
            "--set-var",
            &["user_name=username".to_string(), "old.html=".to_string()],
        )
        .unwrap();
        assert_eq!(
            pairs,
            vec![
                ("user_name".to_string(), "username".to_string()),
                ("old.html".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_parse_pairs_rejects_missing_separator() {
        assert!(parse_pairs("--set-block", &["content".to_string()]).is_err());
        assert!(parse_pairs("--set-block", &["=body".to_string()]).is_err());
    }
}
