//! GraphQlBackend: `MetadataBackend` over HTTP.
//!
//! Every call is a POST to `<server>/api/graphql` with an optional bearer
//! token. Failures surface as `BackendError`; nothing is retried.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use metagov_core::error::BackendError;
use metagov_core::normalize::entity_from_payload;
use metagov_core::ports::{DeleteOutcome, MetadataBackend, Result};
use metagov_core::sync_status::SyncStatus;
use metagov_core::types::{Entity, EntityKind};
use metagov_core::urn::Urn;

use crate::config::BackendConfig;
use crate::graphql::{self, Mutation};

const ERROR_BODY_LIMIT: usize = 500;

pub struct GraphQlBackend {
    http: Client,
    endpoint: Url,
    token: Option<String>,
}

impl GraphQlBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .context("Failed to create HTTP client")?;
        if !config.verify_ssl {
            tracing::warn!(server = %config.server_url, "TLS verification disabled for backend");
        }
        Ok(Self {
            http,
            endpoint: config.graphql_endpoint()?,
            token: config.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Run one GraphQL document and return its `data`.
    async fn execute(&self, query: &str, variables: Value) -> std::result::Result<Value, BackendError> {
        let mut req = self
            .http
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let response = req
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("json") {
            return Err(BackendError::NotJson { content_type });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let mut body: Value =
            serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))?;

        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let messages = errors
                    .iter()
                    .map(|e| {
                        e.get("message")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| e.to_string())
                    })
                    .collect();
                return Err(BackendError::GraphQl(messages));
            }
        }
        Ok(body.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }

    async fn run(&self, m: Mutation) -> std::result::Result<Value, BackendError> {
        self.execute(m.document, m.variables).await
    }

    async fn create(&self, entity: &Entity) -> Result<Urn> {
        let data = self.run(graphql::create_mutation(entity)).await?;
        // createStructuredProperty returns `{urn}`, the others a bare string.
        let returned = data
            .as_object()
            .and_then(|o| o.values().next())
            .and_then(|v| v.as_str().or_else(|| v.get("urn").and_then(Value::as_str)))
            .map(Urn::parse)
            .transpose()?;
        let urn = returned.unwrap_or_else(|| entity.urn.clone());
        for m in graphql::post_create_mutations(entity, &urn) {
            self.run(m).await?;
        }
        Ok(urn)
    }

    async fn update(&self, entity: &Entity) -> Result<Urn> {
        for m in graphql::update_mutations(entity) {
            self.run(m).await?;
        }
        Ok(entity.urn.clone())
    }
}

/// The entity resolver answers any well-formed urn; an entity with none of
/// its aspects set does not exist.
fn has_aspects(raw: &Value) -> bool {
    ["properties", "definition"]
        .iter()
        .any(|k| raw.get(*k).is_some_and(|v| !v.is_null()))
}

fn decode(kind: EntityKind, raw: &Value) -> Result<Entity> {
    let mut entity = entity_from_payload(kind, raw)
        .map_err(|e| BackendError::Decode(format!("{kind}: {e}")))?;
    entity.local_id = None;
    entity.sync_status = SyncStatus::RemoteOnly;
    Ok(entity)
}

#[async_trait]
impl MetadataBackend for GraphQlBackend {
    async fn list(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        let query = graphql::search_query(kind);
        let mut out = Vec::new();
        let mut start = 0u64;
        loop {
            let data = self
                .execute(&query, graphql::search_variables(kind, start))
                .await?;
            let results = data
                .pointer("/search/searchResults")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let total = data
                .pointer("/search/total")
                .and_then(Value::as_u64)
                .unwrap_or(0);

            for r in &results {
                let Some(raw) = r.get("entity") else { continue };
                match decode(kind, raw) {
                    Ok(e) => out.push(e),
                    Err(e) => tracing::warn!(%kind, error = %e, "skipping undecodable remote entity"),
                }
            }

            start += results.len() as u64;
            if results.is_empty() || start >= total {
                break;
            }
        }
        tracing::debug!(%kind, count = out.len(), "listed remote entities");
        Ok(out)
    }

    async fn get(&self, kind: EntityKind, urn: &Urn) -> Result<Option<Entity>> {
        let data = match self
            .execute(&graphql::entity_query(kind), json!({ "urn": urn.as_str() }))
            .await
        {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match data.get("entity") {
            Some(raw) if has_aspects(raw) => decode(kind, raw).map(Some),
            _ => Ok(None),
        }
    }

    async fn upsert(&self, entity: &Entity) -> Result<Urn> {
        let exists = self.get(entity.kind(), &entity.urn).await?.is_some();
        let urn = if exists {
            self.update(entity).await?
        } else {
            self.create(entity).await?
        };
        if let Some(m) = graphql::owners_mutation(entity, &urn) {
            self.run(m).await?;
        }
        tracing::info!(%urn, created = !exists, "upserted remote entity");
        Ok(urn)
    }

    async fn delete(&self, kind: EntityKind, urn: &Urn) -> Result<DeleteOutcome> {
        let (m, field) = graphql::delete_mutation(kind, urn);
        match self.run(m).await {
            Ok(data) => Ok(match data.get(field).and_then(Value::as_bool) {
                Some(false) => DeleteOutcome::AlreadyAbsent,
                _ => DeleteOutcome::Deleted,
            }),
            Err(e) if e.is_not_found() => {
                tracing::debug!(%urn, "remote entity already absent");
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => Err(e.into()),
        }
    }
}
