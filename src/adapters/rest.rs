use crate::domain::model::{ImportOutcome, Record};
use crate::domain::ports::{ImportSink, RelationResolver};
use crate::utils::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;

/// REST-backed relation resolver: relation fields map onto entity
/// collections of the back-office API (`id_fornecedor` → `/fornecedores`).
pub struct RestCatalog {
    base_url: String,
    client: Client,
    routes: HashMap<String, String>,
    allow_create: bool,
}

impl RestCatalog {
    pub fn new(base_url: &str) -> Self {
        let mut routes = HashMap::new();
        // 預設路由；不規則的複數用 with_route 覆蓋
        routes.insert("id_fornecedor".to_string(), "fornecedores".to_string());
        routes.insert("id_cliente".to_string(), "clientes".to_string());
        routes.insert("id_estabelecimento".to_string(), "estabelecimentos".to_string());
        routes.insert("id_item".to_string(), "itens".to_string());
        routes.insert("id_cardapio".to_string(), "cardapios".to_string());
        routes.insert("id_pedido".to_string(), "pedidos".to_string());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            routes,
            allow_create: false,
        }
    }

    pub fn with_route(mut self, field: &str, path: &str) -> Self {
        self.routes.insert(field.to_string(), path.to_string());
        self
    }

    pub fn with_create(mut self, allow: bool) -> Self {
        self.allow_create = allow;
        self
    }

    fn route(&self, field: &str) -> String {
        self.routes
            .get(field)
            .cloned()
            .unwrap_or_else(|| format!("{}s", field.trim_start_matches("id_")))
    }

    /// Fetches an entire entity collection, used when exporting the full
    /// dataset.
    pub async fn fetch_records(&self, path: &str) -> Result<Vec<Record>> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!("Fetching records from: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::Processing {
                message: format!("'{}' returned {}", path, response.status()),
            });
        }

        let json_data: serde_json::Value = response.json().await?;
        let mut records = Vec::new();

        if let serde_json::Value::Array(items) = json_data {
            for item in items {
                if let serde_json::Value::Object(obj) = item {
                    let mut data = HashMap::new();
                    for (key, value) in obj {
                        data.insert(key, value);
                    }
                    records.push(Record { data });
                }
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl RelationResolver for RestCatalog {
    async fn resolve_id(&self, field: &str, text: &str) -> Result<Option<i64>> {
        let url = format!("{}/{}", self.base_url, self.route(field));
        let response = self
            .client
            .get(&url)
            .query(&[("search", text)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::Processing {
                message: format!("lookup on '{}' returned {}", field, response.status()),
            });
        }

        let results: serde_json::Value = response.json().await?;
        let Some(items) = results.as_array() else {
            return Ok(None);
        };

        // 以名稱完全比對（不分大小寫），避免 search 的部分符合誤判
        let id = items
            .iter()
            .find(|item| {
                item.get("nome")
                    .and_then(|v| v.as_str())
                    .map(|nome| nome.eq_ignore_ascii_case(text))
                    .unwrap_or(false)
            })
            .and_then(|item| item.get("id"))
            .and_then(|v| v.as_i64());

        Ok(id)
    }

    fn can_create(&self, _field: &str) -> bool {
        self.allow_create
    }

    async fn create(&self, field: &str, text: &str) -> Result<i64> {
        let url = format!("{}/{}", self.base_url, self.route(field));
        tracing::debug!("Creating '{}' via {}", text, url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "nome": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::Processing {
                message: format!("create on '{}' returned {}", field, response.status()),
            });
        }

        let body: serde_json::Value = response.json().await?;
        body.get("id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| PipelineError::Processing {
                message: format!("create on '{}' returned no id", field),
            })
    }

    async fn resolve_label(&self, field: &str, id: i64) -> Result<String> {
        let url = format!("{}/{}/{}", self.base_url, self.route(field), id);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(PipelineError::Processing {
                message: format!("label lookup on '{}' returned {}", field, response.status()),
            });
        }

        let body: serde_json::Value = response.json().await?;
        body.get("nome")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| PipelineError::Processing {
                message: format!("entity {}/{} has no display name", field, id),
            })
    }
}

/// Posts an import batch to the module's endpoint and decodes the
/// server-side outcome verbatim.
pub struct RestImportSink {
    endpoint: String,
    client: Client,
}

impl RestImportSink {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ImportSink for RestImportSink {
    async fn submit(&self, records: Vec<Record>) -> Result<ImportOutcome> {
        tracing::debug!(
            "Submitting {} records to: {}",
            records.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "records": records }))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json::<ImportOutcome>().await?)
        } else {
            Ok(ImportOutcome {
                success: false,
                message: format!("import endpoint returned {}", response.status()),
                imported: 0,
                errors: Vec::new(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_resolve_id_exact_match() {
        let server = MockServer::start();
        let search_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/fornecedores")
                .query_param("search", "Acme");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!([
                    {"id": 3, "nome": "Acme Filial"},
                    {"id": 7, "nome": "acme"}
                ]));
        });

        let catalog = RestCatalog::new(&server.url(""));
        let id = catalog.resolve_id("id_fornecedor", "Acme").await.unwrap();

        search_mock.assert();
        assert_eq!(id, Some(7));
    }

    #[tokio::test]
    async fn test_resolve_id_no_match() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/fornecedores");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!([{"id": 3, "nome": "Outro"}]));
        });

        let catalog = RestCatalog::new(&server.url(""));
        let id = catalog
            .resolve_id("id_fornecedor", "Desconhecido")
            .await
            .unwrap();

        assert_eq!(id, None);
    }

    #[tokio::test]
    async fn test_create_returns_new_id() {
        let server = MockServer::start();
        let create_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/fornecedores")
                .json_body(serde_json::json!({"nome": "Novo"}));
            then.status(201)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"id": 42, "nome": "Novo"}));
        });

        let catalog = RestCatalog::new(&server.url("")).with_create(true);
        assert!(catalog.can_create("id_fornecedor"));

        let id = catalog.create("id_fornecedor", "Novo").await.unwrap();

        create_mock.assert();
        assert_eq!(id, 42);
    }

    #[tokio::test]
    async fn test_resolve_label() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/clientes/9");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"id": 9, "nome": "Maria"}));
        });

        let catalog = RestCatalog::new(&server.url(""));
        let label = catalog.resolve_label("id_cliente", 9).await.unwrap();

        assert_eq!(label, "Maria");
    }

    #[tokio::test]
    async fn test_resolve_label_failure_is_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/clientes/9");
            then.status(404);
        });

        let catalog = RestCatalog::new(&server.url(""));
        assert!(catalog.resolve_label("id_cliente", 9).await.is_err());
    }

    #[tokio::test]
    async fn test_default_route_strips_prefix() {
        let catalog = RestCatalog::new("http://localhost");
        assert_eq!(catalog.route("id_fornecedor"), "fornecedores");
        assert_eq!(catalog.route("id_motoboy"), "motoboys");
    }

    #[tokio::test]
    async fn test_sink_decodes_outcome() {
        let server = MockServer::start();
        let import_mock = server.mock(|when, then| {
            when.method(POST).path("/itens/import");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "success": true,
                    "message": "2 registros importados",
                    "imported": 2,
                    "errors": ["linha 4: duplicado"]
                }));
        });

        let sink = RestImportSink::new(&server.url("/itens/import"));
        let outcome = sink.submit(vec![Record::new()]).await.unwrap();

        import_mock.assert();
        assert!(outcome.success);
        assert_eq!(outcome.imported, 2);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_sink_maps_server_error_to_failed_outcome() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/itens/import");
            then.status(500);
        });

        let sink = RestImportSink::new(&server.url("/itens/import"));
        let outcome = sink.submit(vec![Record::new()]).await.unwrap();

        assert!(!outcome.success);
        assert!(outcome.message.contains("500"));
    }
}
