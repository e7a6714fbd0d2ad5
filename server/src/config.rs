use std::path::PathBuf;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr =
            std::env::var("WHITEBOARD_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into());
        let data_dir = std::env::var("WHITEBOARD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("rooms"));
        Self {
            bind_addr,
            data_dir,
        }
    }
}
