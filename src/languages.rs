//! Language configuration for compilation and execution

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::error::ExecError;

/// Numeric language selector accepted from callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageId {
    Python,
    Cpp,
    Java,
}

impl TryFrom<u32> for LanguageId {
    type Error = ExecError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(LanguageId::Python),
            2 => Ok(LanguageId::Cpp),
            3 => Ok(LanguageId::Java),
            other => Err(ExecError::NotSupported(other)),
        }
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LanguageId::Python => "python",
            LanguageId::Cpp => "cpp",
            LanguageId::Java => "java",
        };
        write!(f, "{}", s)
    }
}

/// Configuration for a supported programming language
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    pub id: LanguageId,
    /// Name of the source file (e.g., "Program.cpp")
    pub source_file: String,
    /// Compiled artifact left next to the source (None for interpreted languages)
    pub artifact: Option<String>,
    /// Compile command (None if not needed)
    pub compile_command: Option<Vec<String>>,
    /// Run command
    pub run_command: Vec<String>,
}

impl LanguageConfig {
    pub fn is_compiled(&self) -> bool {
        self.compile_command.is_some()
    }
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    id: u32,
    source_file: String,
    artifact: Option<String>,
    compile_command: Option<String>,
    run_command: String,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Immutable table of languages, keyed by id and by name/alias
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    by_id: HashMap<LanguageId, LanguageConfig>,
    by_name: HashMap<String, LanguageId>,
}

impl LanguageRegistry {
    /// Registry built from the table shipped with the crate
    pub fn builtin() -> anyhow::Result<Self> {
        let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));
        Self::from_toml_str(content)
    }

    /// Load a registry from a TOML file on disk
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read language config {:?}", path))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid language config {:?}", path))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let raw_configs: HashMap<String, RawLanguageConfig> = toml::from_str(content)?;

        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();

        for (name, raw) in raw_configs {
            let id = LanguageId::try_from(raw.id)
                .with_context(|| format!("Invalid id for language {}", name))?;

            let run_command = into_command(&raw.run_command);
            if run_command.is_empty() {
                anyhow::bail!("Empty run command for {}", name);
            }

            let compile_command = match raw.compile_command.map(|cmd| into_command(&cmd)) {
                Some(cmd) if cmd.is_empty() => anyhow::bail!("Empty compile command for {}", name),
                other => other,
            };

            let config = LanguageConfig {
                id,
                source_file: raw.source_file,
                artifact: raw.artifact,
                compile_command,
                run_command,
            };

            if by_id.insert(id, config).is_some() {
                anyhow::bail!("Duplicate language id {} ({})", raw.id, name);
            }

            by_name.insert(name.to_lowercase(), id);
            for alias in raw.aliases {
                by_name.insert(alias.to_lowercase(), id);
            }
        }

        Ok(Self { by_id, by_name })
    }

    /// Look up a language by its numeric selector
    pub fn resolve(&self, language_id: u32) -> Result<&LanguageConfig, ExecError> {
        let id = LanguageId::try_from(language_id)?;
        self.by_id
            .get(&id)
            .ok_or(ExecError::NotSupported(language_id))
    }

    /// Look up a language by name or alias
    pub fn get_by_name(&self, language: &str) -> Option<&LanguageConfig> {
        let id = self.by_name.get(&language.to_lowercase())?;
        self.by_id.get(id)
    }

    /// Get all supported language names
    pub fn supported_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let registry = LanguageRegistry::builtin().unwrap();

        let python = registry.resolve(1).unwrap();
        assert_eq!(python.id, LanguageId::Python);
        assert_eq!(python.source_file, "Program.py");
        assert!(!python.is_compiled());
        assert_eq!(python.run_command, vec!["python3", "Program.py"]);

        let cpp = registry.resolve(2).unwrap();
        assert_eq!(
            cpp.compile_command.as_deref(),
            Some(&["g++", "-o", "Program", "Program.cpp"].map(String::from)[..])
        );
        assert_eq!(cpp.artifact.as_deref(), Some("Program"));

        let java = registry.resolve(3).unwrap();
        assert_eq!(java.run_command, vec!["java", "-cp", ".", "Program"]);
        assert_eq!(java.artifact.as_deref(), Some("Program.class"));
    }

    #[test]
    fn test_unknown_id_is_not_supported() {
        let registry = LanguageRegistry::builtin().unwrap();
        assert!(matches!(
            registry.resolve(42),
            Err(ExecError::NotSupported(42))
        ));
    }

    #[test]
    fn test_aliases() {
        let registry = LanguageRegistry::builtin().unwrap();
        assert_eq!(registry.get_by_name("PY").unwrap().id, LanguageId::Python);
        assert_eq!(registry.get_by_name("c++").unwrap().id, LanguageId::Cpp);
        assert!(registry.get_by_name("cobol").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let content = r#"
[python]
id = 1
source_file = "a.py"
run_command = "python3 a.py"

[python2]
id = 1
source_file = "b.py"
run_command = "python2 b.py"
"#;
        let err = LanguageRegistry::from_toml_str(content).unwrap_err();
        assert!(err.to_string().contains("Duplicate language id"));
    }

    #[test]
    fn test_missing_entry_is_not_supported() {
        let content = r#"
[python]
id = 1
source_file = "Program.py"
run_command = "python3 Program.py"
"#;
        let registry = LanguageRegistry::from_toml_str(content).unwrap();
        assert!(matches!(registry.resolve(3), Err(ExecError::NotSupported(3))));
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[cpp]
id = 2
source_file = "main.cpp"
artifact = "main"
compile_command = "g++ -O2 -o main main.cpp"
run_command = "./main"
"#
        )
        .unwrap();

        let registry = LanguageRegistry::from_file(file.path()).unwrap();
        let cpp = registry.resolve(2).unwrap();
        assert_eq!(cpp.source_file, "main.cpp");
        assert_eq!(registry.supported_languages(), vec!["cpp"]);
    }
}
