use crate::core::config::DEFAULT_API_URL;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Deserialize, Clone, Debug)]
#[command(author, version, about = "Markbench - workbench for an invisible-watermarking service")]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to a config file (TOML)
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Base URL of the watermarking service
    #[clap(long)]
    pub api_url: Option<String>,

    /// Directory where downloaded result images are written.
    /// Defaults to the current directory.
    #[clap(long)]
    pub output_dir: Option<PathBuf>,

    /// Override the data directory (previews, cached artifacts, logs)
    #[clap(long)]
    pub data_dir: Option<PathBuf>,

    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    #[serde(default)]
    pub verbose: u8,
}

impl Args {
    /// Load Args from CLI + TOML file (if it exists).
    /// CLI values override those from the file.
    pub fn load() -> Self {
        let cli_args = Args::parse();

        if let Some(config_path) = &cli_args.config {
            if let Some(mut file_args) = Self::from_file(config_path) {
                file_args = Self::merge(file_args, cli_args);
                return file_args;
            }
        }

        let default_path = PathBuf::from("markbench.toml");
        if let Some(mut file_args) = Self::from_file(&default_path) {
            file_args = Self::merge(file_args, cli_args);
            return file_args;
        }

        cli_args
    }

    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    fn from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let content = fs::read_to_string(path).ok()?;
        toml::from_str::<Args>(&content).ok()
    }

    fn merge(mut file: Args, cli: Args) -> Args {
        if cli.api_url.is_some() {
            file.api_url = cli.api_url;
        }
        if cli.output_dir.is_some() {
            file.output_dir = cli.output_dir;
        }
        if cli.data_dir.is_some() {
            file.data_dir = cli.data_dir;
        }
        if cli.config.is_some() {
            file.config = cli.config;
        }
        if cli.verbose > 0 {
            file.verbose = cli.verbose;
        }
        file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare() -> Args {
        Args {
            config: None,
            api_url: None,
            output_dir: None,
            data_dir: None,
            verbose: 0,
        }
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = bare();
        file.api_url = Some("http://file:1".into());
        file.verbose = 1;

        let mut cli = bare();
        cli.api_url = Some("http://cli:2".into());

        let merged = Args::merge(file, cli);
        assert_eq!(merged.api_url.as_deref(), Some("http://cli:2"));
        assert_eq!(merged.verbose, 1, "file value kept when CLI is silent");
    }

    #[test]
    fn test_default_api_url() {
        assert_eq!(bare().api_url(), DEFAULT_API_URL);
    }

    #[test]
    fn test_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markbench.toml");
        std::fs::write(&path, "api_url = \"http://example:9000\"\n").unwrap();
        let args = Args::from_file(&path).unwrap();
        assert_eq!(args.api_url.as_deref(), Some("http://example:9000"));
    }
}
