use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "API token not configured. Set FAXTER_TOKEN or add `token:` to \
        ~/.config/faxter/config.yaml (or the file named by FAXTER_CONFIG_PATH)"
    )]
    MissingToken,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Config file error in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
