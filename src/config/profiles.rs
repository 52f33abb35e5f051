use crate::core::format;
use crate::core::reader::default_header_key;
use crate::domain::model::{ColumnSpec, ModuleProfile, Record};
use crate::utils::error::Result;
use crate::utils::validation;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Declarative module profiles loaded from a TOML file, for modules the
/// built-in set does not cover.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfilesConfig {
    #[serde(rename = "module", default)]
    pub modules: Vec<ModuleDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleDefinition {
    pub name: String,
    #[serde(default)]
    pub import_columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub export_columns: Vec<ColumnSpec>,
    /// Raw header → canonical key aliases; anything absent falls back to
    /// the default mapping.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub active_label: Option<String>,
    pub inactive_label: Option<String>,
}

impl ProfilesConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn build(&self, module: &str) -> Option<ModuleProfile> {
        self.modules
            .iter()
            .find(|m| m.name == module)
            .cloned()
            .map(ModuleDefinition::into_profile)
    }
}

impl ModuleDefinition {
    pub fn into_profile(self) -> ModuleProfile {
        let mut profile = ModuleProfile::new(&self.name)
            .with_import_columns(self.import_columns)
            .with_export_columns(self.export_columns);

        if !self.headers.is_empty() {
            profile = profile.with_header_map(alias_map(self.headers));
        }

        if let (Some(active), Some(inactive)) = (self.active_label, self.inactive_label) {
            profile = profile.with_status_labels(&active, &inactive);
        }

        profile
    }
}

fn alias_map(aliases: HashMap<String, String>) -> crate::domain::model::HeaderMapFn {
    Box::new(move |raw| {
        aliases
            .get(raw)
            .cloned()
            .unwrap_or_else(|| default_header_key(raw))
    })
}

/// Built-in profiles for the back-office modules shipped with the CLI.
pub fn builtin(module: &str) -> Option<ModuleProfile> {
    match module {
        "fornecedores" => Some(fornecedores()),
        "clientes" => Some(clientes()),
        "itens" => Some(itens()),
        "pedidos" => Some(pedidos()),
        _ => None,
    }
}

fn fornecedores() -> ModuleProfile {
    let columns = vec![
        ColumnSpec::new("nome", "Nome").required(),
        ColumnSpec::new("cnpj", "CNPJ"),
        ColumnSpec::new("telefone", "Telefone"),
        ColumnSpec::new("email", "Email"),
        ColumnSpec::new("endereco", "Endereço"),
    ];
    let mut export = columns.clone();
    export.push(ColumnSpec::new("ativo", "Status"));

    ModuleProfile::new("fornecedores")
        .with_import_columns(columns)
        .with_export_columns(export)
        .with_header_map(alias_map(HashMap::from([(
            "Endereço".to_string(),
            "endereco".to_string(),
        )])))
}

fn clientes() -> ModuleProfile {
    let columns = vec![
        ColumnSpec::new("nome", "Nome").required(),
        ColumnSpec::new("telefone", "Telefone"),
        ColumnSpec::new("email", "Email"),
        ColumnSpec::new("endereco", "Endereço"),
        ColumnSpec::new("data_cadastro", "Data de Cadastro"),
    ];
    let mut export = columns.clone();
    export.push(ColumnSpec::new("ativo", "Status"));

    ModuleProfile::new("clientes")
        .with_import_columns(columns)
        .with_export_columns(export)
        .with_header_map(alias_map(HashMap::from([
            ("Endereço".to_string(), "endereco".to_string()),
            ("Data de Cadastro".to_string(), "data_cadastro".to_string()),
        ])))
}

fn itens() -> ModuleProfile {
    let columns = vec![
        ColumnSpec::new("nome", "Nome").required(),
        ColumnSpec::new("descricao", "Descrição"),
        ColumnSpec::new("preco", "Preço"),
        ColumnSpec::new("id_fornecedor", "Fornecedor"),
    ];
    let mut export = columns.clone();
    export.push(ColumnSpec::new("ativo", "Status"));

    ModuleProfile::new("itens")
        .with_import_columns(columns)
        .with_export_columns(export)
        .with_header_map(alias_map(HashMap::from([
            ("Descrição".to_string(), "descricao".to_string()),
            ("Preço".to_string(), "preco".to_string()),
            ("Fornecedor".to_string(), "id_fornecedor".to_string()),
        ])))
}

fn pedidos() -> ModuleProfile {
    let columns = vec![
        ColumnSpec::new("id_cliente", "Cliente").required(),
        ColumnSpec::new("data_pedido", "Data do Pedido").required(),
        ColumnSpec::new("total", "Total"),
        ColumnSpec::new("observacao", "Observação"),
    ];
    let export = columns.clone();
    let required = columns.clone();

    ModuleProfile::new("pedidos")
        .with_import_columns(columns)
        .with_export_columns(export)
        .with_header_map(alias_map(HashMap::from([
            ("Cliente".to_string(), "id_cliente".to_string()),
            ("Data do Pedido".to_string(), "data_pedido".to_string()),
            ("Observação".to_string(), "observacao".to_string()),
        ])))
        .with_validator(Box::new(move |record: &Record, _index| {
            let mut errors = validation::required_errors(&required, record);
            if let Some(raw) = record.get_str("data_pedido") {
                if format::parse_date(raw).is_none() {
                    errors.push(format!(
                        "field 'Data do Pedido' must use dd/mm/yyyy (got '{}')",
                        raw
                    ));
                }
            }
            errors
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert!(builtin("fornecedores").is_some());
        assert!(builtin("pedidos").is_some());
        assert!(builtin("desconhecido").is_none());
    }

    #[test]
    fn test_builtin_header_aliases() {
        let profile = builtin("itens").unwrap();
        let map = profile.header_map.as_ref().unwrap();
        assert_eq!(map("Fornecedor"), "id_fornecedor");
        assert_eq!(map("Preço"), "preco");
        // anything else falls through to the default mapping
        assert_eq!(map("Outra Coluna"), "outra_coluna");
    }

    #[test]
    fn test_pedidos_validator_checks_date_format() {
        let profile = builtin("pedidos").unwrap();
        let validate = profile.validate.as_ref().unwrap();

        let mut record = Record::new();
        record
            .data
            .insert("id_cliente".to_string(), serde_json::json!("Maria"));
        record
            .data
            .insert("data_pedido".to_string(), serde_json::json!("2026-08-07"));

        let errors = validate(&record, 0);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("dd/mm/yyyy"));

        record
            .data
            .insert("data_pedido".to_string(), serde_json::json!("07/08/2026"));
        assert!(validate(&record, 0).is_empty());
    }

    #[test]
    fn test_profiles_config_from_toml() {
        let text = r#"
            [[module]]
            name = "entregas"
            active_label = "Ativa"
            inactive_label = "Inativa"

            [module.headers]
            "Motoboy" = "id_motoboy"

            [[module.import_columns]]
            key = "id_pedido"
            label = "Pedido"
            required = true

            [[module.import_columns]]
            key = "id_motoboy"
            label = "Motoboy"

            [[module.export_columns]]
            key = "id_pedido"
            label = "Pedido"
        "#;

        let config = ProfilesConfig::from_toml(text).unwrap();
        let profile = config.build("entregas").unwrap();

        assert_eq!(profile.name, "entregas");
        assert_eq!(profile.import_columns.len(), 2);
        assert!(profile.import_columns[0].required);
        assert_eq!(profile.active_label, "Ativa");

        let map = profile.header_map.as_ref().unwrap();
        assert_eq!(map("Motoboy"), "id_motoboy");
        assert_eq!(map("Data de Saída"), "data_de_saída");
    }

    #[test]
    fn test_profiles_config_unknown_module() {
        let config = ProfilesConfig::from_toml("").unwrap();
        assert!(config.build("entregas").is_none());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(ProfilesConfig::from_toml("[[module]\nname=").is_err());
    }
}
