use crate::domain::model::{ModuleProfile, Record};
use crate::utils::error::Result;
use regex::Regex;
use std::sync::OnceLock;

/// 只檢查第一行：比較未被引號包住的逗號與分號數量
pub fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");

    let mut commas = 0usize;
    let mut semicolons = 0usize;
    let mut in_quotes = false;

    for ch in first_line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => commas += 1,
            ';' if !in_quotes => semicolons += 1,
            _ => {}
        }
    }

    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Fallback header key: lower-cased, whitespace runs collapsed to one `_`.
pub fn default_header_key(raw: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    re.replace_all(raw.trim().to_lowercase().as_str(), "_")
        .into_owned()
}

fn map_header(profile: &ModuleProfile, raw: &str) -> String {
    match &profile.header_map {
        Some(map) => map(raw),
        None => default_header_key(raw),
    }
}

/// Tokenizes delimited text into records: first row is the header, every
/// following non-empty row is zipped with the mapped header keys.
/// Empty cells are omitted rather than stored as empty strings; rows
/// shorter than the header leave their trailing keys absent.
pub fn parse(text: &str, profile: &ModuleProfile) -> Result<Vec<Record>> {
    let text = text.trim_start_matches('\u{feff}');
    let delimiter = sniff_delimiter(text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(false)
        .from_reader(text.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row?;

        match &headers {
            None => {
                headers = Some(row.iter().map(|h| map_header(profile, h)).collect());
            }
            Some(keys) => {
                let mut record = Record::new();
                for (key, cell) in keys.iter().zip(row.iter()) {
                    if !cell.is_empty() {
                        record
                            .data
                            .insert(key.clone(), serde_json::Value::String(cell.to_string()));
                    }
                }
                // 整行皆為空值時不產生記錄
                if !record.data.is_empty() {
                    records.push(record);
                }
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ModuleProfile;

    fn profile() -> ModuleProfile {
        ModuleProfile::new("fornecedores")
    }

    #[test]
    fn test_sniff_comma_by_default() {
        assert_eq!(sniff_delimiter("nome,telefone,email"), b',');
        assert_eq!(sniff_delimiter("nome"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn test_sniff_semicolon_when_majority() {
        assert_eq!(sniff_delimiter("nome;telefone;email"), b';');
        assert_eq!(sniff_delimiter("nome;\"a,b,c\";email"), b';');
    }

    #[test]
    fn test_sniff_ignores_quoted_delimiters() {
        // one unquoted comma, zero unquoted semicolons
        assert_eq!(sniff_delimiter("\"a;b;c\",nome"), b',');
    }

    #[test]
    fn test_sniff_tie_goes_to_comma() {
        assert_eq!(sniff_delimiter("a,b;c"), b',');
    }

    #[test]
    fn test_default_header_key() {
        assert_eq!(default_header_key("Nome"), "nome");
        assert_eq!(default_header_key("Razão   Social"), "razão_social");
        assert_eq!(default_header_key("  Data de Entrega "), "data_de_entrega");
    }

    #[test]
    fn test_parse_basic() {
        let text = "Nome,Telefone\nAcme,1199\nBeta,2288\n";
        let records = parse(text, &profile()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get_str("nome"), Some("Acme"));
        assert_eq!(records[1].get_str("telefone"), Some("2288"));
    }

    #[test]
    fn test_parse_crlf_line_endings() {
        let text = "Nome,Telefone\r\nAcme,1199\r\n";
        let records = parse(text, &profile()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_str("nome"), Some("Acme"));
    }

    #[test]
    fn test_parse_quoted_delimiter_stays_one_cell() {
        let text = "Nome,Endereco\nAcme,\"Rua A, 123\"\n";
        let records = parse(text, &profile()).unwrap();
        assert_eq!(records[0].get_str("endereco"), Some("Rua A, 123"));
    }

    #[test]
    fn test_parse_doubled_quote() {
        let text = "Nome,Obs\nAcme,\"Said \"\"hi\"\"\"\n";
        let records = parse(text, &profile()).unwrap();
        assert_eq!(records[0].get_str("obs"), Some("Said \"hi\""));
    }

    #[test]
    fn test_parse_newline_inside_quotes() {
        let text = "Nome,Obs\n\"Acme\",\"linha 1\nlinha 2\"\n";
        let records = parse(text, &profile()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_str("obs"), Some("linha 1\nlinha 2"));
    }

    #[test]
    fn test_parse_semicolon_file() {
        let text = "Nome;Telefone\nAcme;1199\n";
        let records = parse(text, &profile()).unwrap();
        assert_eq!(records[0].get_str("telefone"), Some("1199"));
    }

    #[test]
    fn test_parse_empty_cells_omitted() {
        let text = "Nome,Telefone,Email\nAcme,,a@b.com\n";
        let records = parse(text, &profile()).unwrap();
        assert!(records[0].get("telefone").is_none());
        assert_eq!(records[0].get_str("email"), Some("a@b.com"));
    }

    #[test]
    fn test_parse_short_row_leaves_trailing_keys_absent() {
        let text = "Nome,Telefone,Email\nAcme,1199\n";
        let records = parse(text, &profile()).unwrap();
        assert_eq!(records[0].get_str("nome"), Some("Acme"));
        assert!(records[0].get("email").is_none());
    }

    #[test]
    fn test_parse_trailing_blank_line_dropped() {
        let text = "Nome\nAcme\n\n";
        let records = parse(text, &profile()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_headers_only() {
        let text = "Nome,Telefone\n";
        let records = parse(text, &profile()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_custom_header_map() {
        let profile = ModuleProfile::new("fornecedores").with_header_map(Box::new(|raw| {
            match raw {
                "Fornecedor" => "id_fornecedor".to_string(),
                other => default_header_key(other),
            }
        }));
        let text = "Nome,Fornecedor\nPizza,Acme\n";
        let records = parse(text, &profile).unwrap();
        assert_eq!(records[0].get_str("id_fornecedor"), Some("Acme"));
    }

    #[test]
    fn test_parse_unknown_headers_carried() {
        let text = "Nome,Coluna Estranha\nAcme,xyz\n";
        let records = parse(text, &profile()).unwrap();
        assert_eq!(records[0].get_str("coluna_estranha"), Some("xyz"));
    }
}
