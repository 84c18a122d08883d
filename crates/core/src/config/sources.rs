/// Where a resolved configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value loaded from environment variable
    EnvVar(String),
    /// Default value used
    Default,
    /// Value loaded from the configuration file
    File(String),
    /// Value provided on the command line
    CommandLine,
}

impl ConfigSource {
    /// Get source description
    pub fn description(&self) -> String {
        match self {
            ConfigSource::EnvVar(var) => format!("environment variable {}", var),
            ConfigSource::Default => "default value".to_string(),
            ConfigSource::File(path) => format!("configuration file {}", path),
            ConfigSource::CommandLine => "command line".to_string(),
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
