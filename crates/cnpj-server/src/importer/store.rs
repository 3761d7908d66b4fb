//! Storage access for the import run
//!
//! The source table (`cnpj_sitac`) holds the candidate identifiers; the
//! destination table (`empresa`) holds imported company records. The trait
//! seam keeps the runner testable without Postgres.

use async_trait::async_trait;
use cnpj_common::types::Cnpj;
use sqlx::PgPool;

use super::{CompanyRecord, ImportError};

/// Storage contract needed by the processing loop.
#[async_trait]
pub trait ImportStore: Send + Sync {
    /// Full candidate identifier list, in source-table order.
    async fn candidate_cnpjs(&self) -> Result<Vec<Cnpj>, ImportError>;

    /// Identifiers already present in the destination table.
    async fn existing_cnpjs(&self) -> Result<Vec<Cnpj>, ImportError>;

    /// Point existence check in the destination table.
    async fn contains(&self, cnpj: &Cnpj) -> Result<bool, ImportError>;

    /// Persist a fetched record.
    async fn insert_company(&self, record: &CompanyRecord) -> Result<(), ImportError>;
}

/// Postgres-backed store over the shared connection pool.
///
/// Connections are acquired per query and returned to the pool, so every
/// exit path of a run releases its connections.
#[derive(Debug, Clone)]
pub struct PgImportStore {
    pool: PgPool,
}

impl PgImportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn candidate_cnpjs(&self) -> Result<Vec<Cnpj>, ImportError> {
        let rows: Vec<String> = sqlx::query_scalar("SELECT cnpj FROM cnpj_sitac ORDER BY cnpj")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|raw| Cnpj::parse(raw).map_err(ImportError::from))
            .collect()
    }

    async fn existing_cnpjs(&self) -> Result<Vec<Cnpj>, ImportError> {
        let rows: Vec<String> = sqlx::query_scalar("SELECT cnpj FROM empresa")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|raw| Cnpj::parse(raw).map_err(ImportError::from))
            .collect()
    }

    async fn contains(&self, cnpj: &Cnpj) -> Result<bool, ImportError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM empresa WHERE cnpj = $1)")
                .bind(cnpj.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn insert_company(&self, record: &CompanyRecord) -> Result<(), ImportError> {
        sqlx::query(
            r#"
            INSERT INTO empresa (
                cnpj, razao_social, nome_fantasia, situacao, abertura,
                natureza_juridica, logradouro, numero, municipio, uf,
                cep, email, telefone, capital_social, raw
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(record.cnpj.as_str())
        .bind(&record.razao_social)
        .bind(&record.nome_fantasia)
        .bind(&record.situacao)
        .bind(&record.abertura)
        .bind(&record.natureza_juridica)
        .bind(&record.logradouro)
        .bind(&record.numero)
        .bind(&record.municipio)
        .bind(&record.uf)
        .bind(&record.cep)
        .bind(&record.email)
        .bind(&record.telefone)
        .bind(&record.capital_social)
        .bind(&record.raw)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
