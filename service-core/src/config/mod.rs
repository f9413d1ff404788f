use config::{Config, ConfigError, Environment, File};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Environment variable prefix shared by every portal crate (`APP_API__BASE_URL`).
pub const ENV_PREFIX: &str = "APP";

/// Load settings from `<directory>/base.yaml` layered with `APP_*` environment variables.
///
/// The yaml file is optional so that a crate can run on defaults alone; nested keys
/// are addressed with a double underscore (`APP_SESSION__LOGIN_PATH`).
pub fn load_settings<T: DeserializeOwned>(configuration_directory: &Path) -> Result<T, ConfigError> {
    dotenvy::dotenv().ok();

    let settings = Config::builder()
        .add_source(File::from(configuration_directory.join("base.yaml")).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default = "default_port")]
        port: u16,
        name: Option<String>,
    }

    fn default_port() -> u16 {
        8080
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let sample: Sample = load_settings(dir.path()).unwrap();
        assert_eq!(sample.port, 8080);
    }

    #[test]
    fn reads_base_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.yaml"), "port: 9000\nname: portal\n").unwrap();

        let sample: Sample = load_settings(dir.path()).unwrap();
        assert_eq!(sample.port, 9000);
        assert_eq!(sample.name.as_deref(), Some("portal"));
    }
}
