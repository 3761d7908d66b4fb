//! Registry API client
//!
//! Fetches company records by CNPJ from a ReceitaWS-compatible HTTP API.
//! The API answers unknown identifiers with a JSON body carrying
//! `"status": "ERROR"` rather than a 404; those map to `None`.

use async_trait::async_trait;
use cnpj_common::types::Cnpj;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ImporterConfig;

/// Registry API failures
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Http(reqwest::StatusCode),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A company record fetched from the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyRecord {
    pub cnpj: Cnpj,
    pub razao_social: Option<String>,
    pub nome_fantasia: Option<String>,
    pub situacao: Option<String>,
    pub abertura: Option<String>,
    pub natureza_juridica: Option<String>,
    pub logradouro: Option<String>,
    pub numero: Option<String>,
    pub municipio: Option<String>,
    pub uf: Option<String>,
    pub cep: Option<String>,
    pub email: Option<String>,
    pub telefone: Option<String>,
    pub capital_social: Option<String>,
    /// Full payload as returned by the API, persisted alongside the
    /// extracted columns.
    pub raw: serde_json::Value,
}

/// Wire shape of a registry response.
#[derive(Debug, Deserialize)]
struct RegistryPayload {
    status: Option<String>,
    nome: Option<String>,
    fantasia: Option<String>,
    situacao: Option<String>,
    abertura: Option<String>,
    natureza_juridica: Option<String>,
    logradouro: Option<String>,
    numero: Option<String>,
    municipio: Option<String>,
    uf: Option<String>,
    cep: Option<String>,
    email: Option<String>,
    telefone: Option<String>,
    capital_social: Option<String>,
}

impl CompanyRecord {
    /// Build a record from a raw registry payload.
    ///
    /// Returns `None` when the payload reports `"status": "ERROR"`, which
    /// is how the registry signals an unknown or unconsultable CNPJ.
    pub fn from_payload(
        cnpj: &Cnpj,
        raw: serde_json::Value,
    ) -> Result<Option<Self>, ApiError> {
        let payload: RegistryPayload = serde_json::from_value(raw.clone())?;

        if payload.status.as_deref() == Some("ERROR") {
            return Ok(None);
        }

        Ok(Some(Self {
            cnpj: cnpj.clone(),
            razao_social: payload.nome,
            nome_fantasia: payload.fantasia,
            situacao: payload.situacao,
            abertura: payload.abertura,
            natureza_juridica: payload.natureza_juridica,
            logradouro: payload.logradouro,
            numero: payload.numero,
            municipio: payload.municipio,
            uf: payload.uf,
            cep: payload.cep,
            email: payload.email,
            telefone: payload.telefone,
            capital_social: payload.capital_social,
            raw,
        }))
    }
}

/// Capability to fetch a company record for an identifier.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Fetch the record for `cnpj`; `Ok(None)` means the registry has no
    /// data for it.
    async fn fetch(&self, cnpj: &Cnpj) -> Result<Option<CompanyRecord>, ApiError>;
}

/// HTTP client against a ReceitaWS-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ReceitaClient {
    http: reqwest::Client,
    base_url: String,
}

impl ReceitaClient {
    /// Build a client from importer configuration.
    ///
    /// The request timeout guards against a hung API call stalling the
    /// whole run.
    pub fn new(config: &ImporterConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.api_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RegistryApi for ReceitaClient {
    async fn fetch(&self, cnpj: &Cnpj) -> Result<Option<CompanyRecord>, ApiError> {
        let url = format!("{}/v1/cnpj/{}", self.base_url, cnpj);

        tracing::debug!(cnpj = %cnpj, %url, "querying registry API");

        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::Http(response.status()));
        }

        let raw: serde_json::Value = response.json().await?;
        CompanyRecord::from_payload(cnpj, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> ImporterConfig {
        ImporterConfig {
            api_base_url: base_url.to_string(),
            api_timeout_secs: 5,
            pace_secs: 1,
        }
    }

    fn cnpj(raw: &str) -> Cnpj {
        Cnpj::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/cnpj/11111111000100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "cnpj": "11.111.111/0001-00",
                "nome": "Empresa Teste LTDA",
                "fantasia": "Teste",
                "situacao": "ATIVA",
                "uf": "SP"
            })))
            .mount(&server)
            .await;

        let client = ReceitaClient::new(&test_config(&server.uri())).unwrap();
        let record = client
            .fetch(&cnpj("11111111000100"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.razao_social.as_deref(), Some("Empresa Teste LTDA"));
        assert_eq!(record.nome_fantasia.as_deref(), Some("Teste"));
        assert_eq!(record.situacao.as_deref(), Some("ATIVA"));
        assert_eq!(record.uf.as_deref(), Some("SP"));
        assert_eq!(record.raw["status"], "OK");
    }

    #[tokio::test]
    async fn test_fetch_error_status_maps_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/cnpj/22222222000100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ERROR",
                "message": "CNPJ invalido"
            })))
            .mount(&server)
            .await;

        let client = ReceitaClient::new(&test_config(&server.uri())).unwrap();
        let record = client.fetch(&cnpj("22222222000100")).await.unwrap();

        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_fetch_http_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/cnpj/33333333000100"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ReceitaClient::new(&test_config(&server.uri())).unwrap();
        let result = client.fetch(&cnpj("33333333000100")).await;

        assert!(matches!(result, Err(ApiError::Http(status)) if status.as_u16() == 500));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ReceitaClient::new(&test_config("http://localhost:9999/")).unwrap();
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
