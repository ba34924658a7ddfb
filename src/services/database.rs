use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::store::{EntityStore, Filter, Mutation, MutationOp, UpdateOptions};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use surrealdb::engine::remote::http::{Client, Http};
use surrealdb::opt::auth::Root;
use surrealdb::{Response, Surreal};
use tracing::{debug, error, info};

/// 数据库服务
///
/// SurrealDB-backed [`EntityStore`]. Every mutation renders to a single
/// parameterized `UPDATE` statement so field changes ride on the store's
/// own atomic operators; the adapter never round-trips a read-modify-write
/// for a shared field.
#[derive(Clone)]
pub struct Database {
    client: Surreal<Client>,
}

impl Database {
    /// 创建新的数据库连接
    pub async fn connect(
        url: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self> {
        info!("Initializing database connection to {}", url);

        let endpoint = url
            .trim_start_matches("http://")
            .trim_start_matches("https://");
        let client = Surreal::new::<Http>(endpoint).await?;
        client.signin(Root { username, password }).await?;
        client.use_ns(namespace).use_db(database).await?;

        Ok(Self { client })
    }

    /// 主存储连接 (posts + user profiles)
    pub async fn primary(config: &Config) -> Result<Self> {
        Self::connect(
            &config.database_url,
            &config.database_username,
            &config.database_password,
            &config.database_namespace,
            &config.database_name,
        )
        .await
    }

    /// 书签缓存存储连接，未配置时返回 None
    pub async fn secondary(config: &Config) -> Result<Option<Self>> {
        let Some(url) = config.secondary_database_url.as_deref() else {
            return Ok(None);
        };
        let db = Self::connect(
            url,
            &config.database_username,
            &config.database_password,
            &config.secondary_database_namespace,
            &config.secondary_database_name,
        )
        .await?;
        Ok(Some(db))
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.client.query("INFO FOR DB").await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// 执行带参数的查询
    pub async fn query_with_params(&self, sql: &str, params: Value) -> Result<Response> {
        debug!("Executing query: {}", sql);
        let mut query = self.client.query(sql);
        if let Value::Object(map) = params {
            for (name, value) in map {
                query = query.bind((name, value));
            }
        }
        Ok(query.await?)
    }
}

#[async_trait]
impl EntityStore for Database {
    async fn fetch_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>> {
        let (sql, params) = render_fetch(collection, filter);
        let mut response = self.query_with_params(&sql, params).await?;
        let rows: Vec<Value> = response.take(0)?;
        Ok(rows.into_iter().next().map(|mut doc| {
            normalize_record_id(&mut doc);
            doc
        }))
    }

    async fn apply_update(
        &self,
        collection: &str,
        filter: &Filter,
        mutation: &Mutation,
        options: UpdateOptions,
    ) -> Result<Option<Value>> {
        if let Some((sql, params)) = render_update(collection, filter, mutation) {
            let mut response = self.query_with_params(&sql, params).await?;
            let rows: Vec<Value> = response.take(0)?;
            if let Some(mut doc) = rows.into_iter().next() {
                normalize_record_id(&mut doc);
                return Ok(Some(doc));
            }
        } else if let Some(doc) = self.fetch_one(collection, filter).await? {
            // Only insert-time operators; an existing document is untouched.
            return Ok(Some(doc));
        }

        if !options.upsert {
            return Ok(None);
        }

        // Nothing matched: create the document from the filter fields with
        // the mutation applied. Provisioning callers key the filter on a
        // unique field, which bounds the window where two upserts race.
        let mut doc = Value::Object(Map::new());
        for (field, value) in filter.fields() {
            doc[field] = value.clone();
        }
        mutation.apply_to(&mut doc, true);

        let sql = format!("CREATE {} CONTENT $doc", collection);
        let mut response = self.query_with_params(&sql, json!({ "doc": doc })).await?;
        let rows: Vec<Value> = response.take(0)?;
        let mut created = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Store(format!("CREATE on {} returned no document", collection)))?;
        normalize_record_id(&mut created);
        Ok(Some(created))
    }
}

/// 规范化记录ID
///
/// The HTTP protocol returns record ids as `{tb, id: {String: ..}}`
/// objects; our models carry the `table:id` string form.
fn normalize_record_id(doc: &mut Value) {
    let normalized = doc.get("id").and_then(Value::as_object).and_then(|id_obj| {
        let tb = id_obj.get("tb").and_then(Value::as_str)?;
        let inner = id_obj
            .get("id")
            .and_then(Value::as_object)?
            .get("String")
            .and_then(Value::as_str)?;
        Some(format!("{}:{}", tb, inner))
    });
    if let Some(id) = normalized {
        doc["id"] = json!(id);
    }
}

/// 渲染查询语句
pub(crate) fn render_fetch(collection: &str, filter: &Filter) -> (String, Value) {
    let mut params = Map::new();
    let clause = render_where(filter, &mut params);
    let sql = format!(
        "SELECT * FROM {} WHERE {} LIMIT 1",
        collection, clause
    );
    (sql, Value::Object(params))
}

/// 渲染更新语句。Returns `None` when every operator is insert-only and
/// there is nothing to assign on the update path.
pub(crate) fn render_update(
    collection: &str,
    filter: &Filter,
    mutation: &Mutation,
) -> Option<(String, Value)> {
    let mut params = Map::new();
    let clause = render_where(filter, &mut params);
    let assignments = render_assignments(mutation, &mut params);
    if assignments.is_empty() {
        return None;
    }
    let sql = format!(
        "UPDATE {} SET {} WHERE {} RETURN AFTER",
        collection,
        assignments.join(", "),
        clause
    );
    Some((sql, Value::Object(params)))
}

fn render_where(filter: &Filter, params: &mut Map<String, Value>) -> String {
    let mut clauses = Vec::new();
    for (i, (field, value)) in filter.fields().iter().enumerate() {
        let name = format!("w{}", i);
        clauses.push(format!("{} = ${}", escape_path(field), name));
        params.insert(name, value.clone());
    }
    clauses.join(" AND ")
}

fn render_assignments(mutation: &Mutation, params: &mut Map<String, Value>) -> Vec<String> {
    let mut assignments = Vec::new();
    for (i, op) in mutation.ops().iter().enumerate() {
        match op {
            MutationOp::Set { path, value } => {
                let name = format!("m{}", i);
                assignments.push(format!("{} = ${}", escape_path(path), name));
                params.insert(name, value.clone());
            }
            // Insert defaults are handled by the CREATE fallback only.
            MutationOp::SetOnInsert { .. } => {}
            MutationOp::Push { path, value } => {
                let name = format!("m{}", i);
                assignments.push(format!("{} += ${}", escape_path(path), name));
                params.insert(name, value.clone());
            }
            MutationOp::AddToSet { path, value } => {
                let name = format!("m{}", i);
                let path = escape_path(path);
                assignments.push(format!(
                    "{} = array::union({} ?? [], [${}])",
                    path, path, name
                ));
                params.insert(name, value.clone());
            }
            MutationOp::Pull { path, value } => {
                let name = format!("m{}", i);
                assignments.push(format!("{} -= ${}", escape_path(path), name));
                params.insert(name, value.clone());
            }
            MutationOp::Inc { path, by } => {
                let name = format!("m{}", i);
                let path = escape_path(path);
                assignments.push(format!("{} = ({} ?? 0) + ${}", path, path, name));
                params.insert(name, json!(by));
            }
            MutationOp::IncMatched {
                array,
                key_field,
                key,
                path,
                by,
            } => {
                let key_name = format!("mk{}", i);
                let by_name = format!("mv{}", i);
                // Element selected by identifier, never by position, so a
                // concurrent append cannot shift the target.
                let target = format!(
                    "{}[WHERE {} = ${}].{}",
                    escape_path(array),
                    escape_path(key_field),
                    key_name,
                    escape_path(path)
                );
                assignments.push(format!("{} = ({} ?? 0) + ${}", target, target, by_name));
                params.insert(key_name, key.clone());
                params.insert(by_name, json!(by));
            }
        }
    }
    assignments
}

/// Backtick-escape path segments that are not plain identifiers
/// (emoji reaction keys, for instance).
fn escape_path(path: &str) -> String {
    path.split('.')
        .map(|segment| {
            let plain = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if plain {
                segment.to_string()
            } else {
                format!("`{}`", segment)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}
