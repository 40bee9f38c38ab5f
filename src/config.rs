use std::path::PathBuf;

/// Deployment environment. Production hides unexpected error details.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Unknown names fall back to development.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// WAL appends after which the compactor rewrites the log.
    pub compact_threshold: u64,
    pub environment: Environment,
}

impl Config {
    /// Read `ROOMD_*` variables, falling back to defaults for anything
    /// missing or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |var: &str| lookup(var).and_then(|s| s.trim().parse().ok());

        Self {
            bind: lookup("ROOMD_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed("ROOMD_PORT").unwrap_or(8080),
            data_dir: PathBuf::from(lookup("ROOMD_DATA_DIR").unwrap_or_else(|| "./data".into())),
            metrics_port: parsed("ROOMD_METRICS_PORT"),
            compact_threshold: lookup("ROOMD_COMPACT_THRESHOLD")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(1000),
            environment: lookup("ROOMD_ENV")
                .map(|s| Environment::parse(&s))
                .unwrap_or_default(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("schedules.wal")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]);
        assert_eq!(c.addr(), "0.0.0.0:8080");
        assert_eq!(c.wal_path(), PathBuf::from("./data/schedules.wal"));
        assert_eq!(c.metrics_port, None);
        assert_eq!(c.compact_threshold, 1000);
        assert_eq!(c.environment, Environment::Development);
    }

    #[test]
    fn overrides() {
        let c = config(&[
            ("ROOMD_BIND", "127.0.0.1"),
            ("ROOMD_PORT", "9000"),
            ("ROOMD_DATA_DIR", "/var/lib/roomd"),
            ("ROOMD_METRICS_PORT", "9100"),
            ("ROOMD_COMPACT_THRESHOLD", "50"),
            ("ROOMD_ENV", "Production"),
        ]);
        assert_eq!(c.addr(), "127.0.0.1:9000");
        assert_eq!(c.wal_path(), PathBuf::from("/var/lib/roomd/schedules.wal"));
        assert_eq!(c.metrics_port, Some(9100));
        assert_eq!(c.compact_threshold, 50);
        assert!(c.environment.is_production());
    }

    #[test]
    fn unparseable_numbers_fall_back() {
        let c = config(&[("ROOMD_PORT", "http"), ("ROOMD_METRICS_PORT", "-1")]);
        assert_eq!(c.port, 8080);
        assert_eq!(c.metrics_port, None);
    }

    #[test]
    fn environment_names() {
        assert_eq!(Environment::parse("staging"), Environment::Staging);
        assert_eq!(Environment::parse("prod"), Environment::Production);
        assert_eq!(Environment::parse("whatever"), Environment::Development);
    }
}
