//! CLI configuration
//!
//! An optional `rime.toml` in the working directory; currently just extra
//! load paths. A malformed file warns and is otherwise ignored so a bad
//! config never blocks script execution.

use std::path::Path;

use serde::Deserialize;

const CONFIG_FILE: &str = "rime.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extra directories appended to the module load paths.
    pub load_paths: Vec<String>,
}

pub fn load() -> Config {
    load_from(Path::new(CONFIG_FILE))
}

fn load_from(path: &Path) -> Config {
    let Ok(text) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    match toml::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring malformed {}: {e}", path.display());
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_is_default() {
        let config = load_from(Path::new("/nonexistent/rime.toml"));
        assert!(config.load_paths.is_empty());
    }

    #[test]
    fn test_load_paths_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "load_paths = [\"vendor\", \"scripts\"]").unwrap();
        let config = load_from(&path);
        assert_eq!(config.load_paths, vec!["vendor", "scripts"]);
    }

    #[test]
    fn test_malformed_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "load_paths = 7").unwrap();
        let config = load_from(&path);
        assert!(config.load_paths.is_empty());
    }
}
