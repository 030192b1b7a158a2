//! LanceDB connection and housekeeping helpers.
//!
//! Besides opening the database this keeps a small key/value table,
//! `collection_meta`, recording per-collection facts such as the vector width
//! and the embedding model a collection was built with.

use std::path::Path;
use std::sync::Arc;

use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use arrow_schema::SchemaRef;
use chrono::Utc;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};

use docrag_core::{Error, Result};

use crate::schema::build_meta_schema;

pub const META_TABLE: &str = "collection_meta";

pub async fn open_db(path: &Path) -> Result<Connection> {
    std::fs::create_dir_all(path).map_err(Error::store)?;
    connect(path.to_string_lossy().as_ref()).execute().await.map_err(Error::store)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(Error::store)?;
    Ok(names.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: SchemaRef) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
    conn.create_table(name, Box::new(iter)).execute().await.map_err(Error::store)?;
    Ok(())
}

/// Quote a string literal for a Lance filter expression.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn meta_key(collection: &str, field: &str) -> String {
    format!("{collection}:{field}")
}

pub async fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    ensure_table(conn, META_TABLE, build_meta_schema()).await?;
    let t = conn.open_table(META_TABLE).execute().await.map_err(Error::store)?;
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(vec![key.to_string()])),
            Arc::new(StringArray::from(vec![value.to_string()])),
            Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
        ],
    )
    .map_err(Error::store)?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
    // key is unique
    let mut mi = t.merge_insert(&["key"]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    mi.execute(reader).await.map_err(Error::store)?;
    Ok(())
}

pub async fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    if !table_exists(conn, META_TABLE).await? {
        return Ok(None);
    }
    let t = conn.open_table(META_TABLE).execute().await.map_err(Error::store)?;
    let mut stream = t
        .query()
        .only_if(format!("key = {}", sql_literal(key)))
        .limit(1)
        .execute()
        .await
        .map_err(Error::store)?;
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await.map_err(Error::store)? {
        if batch.num_rows() == 0 {
            continue;
        }
        let val = batch
            .column_by_name("value")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| Error::Store { message: "collection_meta.value column missing".into(), source: None })?;
        return Ok(Some(val.value(0).to_string()));
    }
    Ok(None)
}
