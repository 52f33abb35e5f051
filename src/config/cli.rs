use crate::domain::model::ExportScope;
use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_path, validate_url, Validate};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(name = "mesa-io")]
#[command(about = "CSV import/export for the restaurant back office")]
pub struct CliConfig {
    #[arg(long, value_enum)]
    pub mode: Mode,

    #[arg(
        long,
        help = "Back-office module (fornecedores, clientes, itens, pedidos, ...)"
    )]
    pub module: String,

    #[arg(long, help = "CSV file to import")]
    pub input: Option<String>,

    #[arg(long, default_value = "http://localhost:3000/api")]
    pub api_endpoint: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, help = "TOML file with extra module profiles")]
    pub profiles: Option<String>,

    #[arg(long, value_enum, default_value_t = ScopeArg::All)]
    pub scope: ScopeArg,

    #[arg(long, value_delimiter = ',', help = "Record ids for --scope selected")]
    pub ids: Vec<i64>,

    #[arg(long, help = "Create missing referenced entities during import")]
    pub allow_create: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Import,
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Current,
    Selected,
    All,
}

impl CliConfig {
    pub fn export_scope(&self) -> ExportScope {
        match self.scope {
            ScopeArg::Current => ExportScope::Current,
            ScopeArg::Selected => ExportScope::Selected(self.ids.clone()),
            ScopeArg::All => ExportScope::All,
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_url("api_endpoint", &self.api_endpoint)?;
        validate_path("output_path", &self.output_path)?;
        validate_non_empty_string("module", &self.module)?;

        if self.mode == Mode::Import && self.input.is_none() {
            return Err(PipelineError::ConfigError {
                message: "--input is required for --mode import".to_string(),
            });
        }

        if self.mode == Mode::Export && self.scope == ScopeArg::Selected && self.ids.is_empty() {
            return Err(PipelineError::ConfigError {
                message: "--ids is required for --scope selected".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> CliConfig {
        CliConfig {
            mode: Mode::Export,
            module: "itens".to_string(),
            input: None,
            api_endpoint: "http://localhost:3000/api".to_string(),
            output_path: "./output".to_string(),
            profiles: None,
            scope: ScopeArg::All,
            ids: Vec::new(),
            allow_create: false,
            verbose: false,
        }
    }

    #[test]
    fn test_valid_export_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_import_requires_input() {
        let config = CliConfig {
            mode: Mode::Import,
            ..base_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_selected_scope_requires_ids() {
        let config = CliConfig {
            scope: ScopeArg::Selected,
            ..base_config()
        };
        assert!(config.validate().is_err());

        let config = CliConfig {
            scope: ScopeArg::Selected,
            ids: vec![1, 2],
            ..base_config()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.export_scope(), ExportScope::Selected(vec![1, 2]));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let config = CliConfig {
            api_endpoint: "ftp://example.com".to_string(),
            ..base_config()
        };
        assert!(config.validate().is_err());
    }
}
