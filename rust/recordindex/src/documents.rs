//! Adding and removing documents. Every write is followed by a commit so
//! that it is visible to searches once the call returns.

use recordindex_error::{ErrorCodes, RecordIndexError};
use recordindex_types::{IndexDocument, RemoteEffect};
use thiserror::Error;

use crate::client::{AdminResponse, ConnectError, SolrAdmin, SolrClientError};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("Error in writing documents to table '{table}': {source}")]
    Submit {
        table: String,
        #[source]
        source: SolrClientError,
    },
    #[error("Documents were sent to table '{table}' but the commit failed: {source}")]
    Commit {
        table: String,
        #[source]
        source: SolrClientError,
    },
}

impl DocumentError {
    /// An uncommitted write may still become visible with the next commit of
    /// the collection.
    pub fn remote_effect(&self) -> RemoteEffect {
        match self {
            DocumentError::Commit { .. } => RemoteEffect::Partial,
            _ => RemoteEffect::None,
        }
    }
}

impl RecordIndexError for DocumentError {
    fn code(&self) -> ErrorCodes {
        match self {
            DocumentError::Connect(err) => err.code(),
            DocumentError::Submit { source, .. } => source.code(),
            DocumentError::Commit { .. } => ErrorCodes::Aborted,
        }
    }
}

pub async fn index_documents(
    admin: &dyn SolrAdmin,
    table: &str,
    docs: &[IndexDocument],
) -> Result<(), DocumentError> {
    if docs.is_empty() {
        return Ok(());
    }
    tracing::debug!(table, count = docs.len(), "Indexing documents");
    let submitted = admin.add_documents(table, docs).await;
    commit_after(admin, table, submitted).await
}

pub async fn delete_documents_by_ids(
    admin: &dyn SolrAdmin,
    table: &str,
    ids: &[String],
) -> Result<(), DocumentError> {
    if ids.is_empty() {
        return Ok(());
    }
    tracing::debug!(table, count = ids.len(), "Deleting documents by id");
    let submitted = admin.delete_by_ids(table, ids).await;
    commit_after(admin, table, submitted).await
}

pub async fn delete_documents_by_query(
    admin: &dyn SolrAdmin,
    table: &str,
    query: &str,
) -> Result<(), DocumentError> {
    if query.trim().is_empty() {
        return Ok(());
    }
    tracing::debug!(table, query, "Deleting documents by query");
    let submitted = admin.delete_by_query(table, query).await;
    commit_after(admin, table, submitted).await
}

async fn commit_after(
    admin: &dyn SolrAdmin,
    table: &str,
    submitted: Result<AdminResponse, SolrClientError>,
) -> Result<(), DocumentError> {
    submitted
        .and_then(|response| response.into_result())
        .map_err(|source| {
            tracing::error!(table, error = %source, "Failed to write documents");
            DocumentError::Submit {
                table: table.to_string(),
                source,
            }
        })?;
    admin
        .commit(table)
        .await
        .and_then(|response| response.into_result())
        .map_err(|source| {
            tracing::error!(table, error = %source, "Failed to commit documents");
            DocumentError::Commit {
                table: table.to_string(),
                source,
            }
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{SolrOperation, TestSolr, DEFAULT_BASE_CONFIG_SET};

    async fn solr_with_orders() -> TestSolr {
        let solr = TestSolr::new();
        solr.create_config(DEFAULT_BASE_CONFIG_SET, "DEFAULT_orders")
            .await
            .unwrap();
        solr.create_collection("DEFAULT_orders", "DEFAULT_orders", 1, 1)
            .await
            .unwrap();
        solr
    }

    fn order(id: &str, status: &str) -> IndexDocument {
        IndexDocument::new()
            .with_field("id", id)
            .with_field("status", status)
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_index_and_delete() {
        let solr = solr_with_orders().await;
        let docs = vec![order("1", "open"), order("2", "closed"), order("3", "open")];

        index_documents(&solr, "orders", &docs).await.unwrap();
        assert_eq!(solr.documents("orders"), docs);

        delete_documents_by_ids(&solr, "orders", &["2".to_string()])
            .await
            .unwrap();
        assert_eq!(
            solr.documents("orders"),
            vec![order("1", "open"), order("3", "open")]
        );

        delete_documents_by_query(&solr, "orders", "status:open")
            .await
            .unwrap();
        assert!(solr.documents("orders").is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_is_a_no_op() {
        let solr = solr_with_orders().await;
        let calls = solr.calls();

        index_documents(&solr, "orders", &[]).await.unwrap();
        delete_documents_by_ids(&solr, "orders", &[]).await.unwrap();
        delete_documents_by_query(&solr, "orders", "  ").await.unwrap();
        assert_eq!(solr.calls(), calls);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_failures_report_their_remote_effect() {
        let solr = solr_with_orders().await;

        solr.fail(SolrOperation::AddDocuments, 500);
        let err = index_documents(&solr, "orders", &[order("1", "open")])
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Submit { .. }));
        assert_eq!(err.remote_effect(), RemoteEffect::None);
        solr.clear_failure(SolrOperation::AddDocuments);

        solr.fail(SolrOperation::Commit, 503);
        let err = index_documents(&solr, "orders", &[order("1", "open")])
            .await
            .unwrap_err();
        assert_eq!(err.remote_effect(), RemoteEffect::Partial);
        assert_eq!(err.code(), ErrorCodes::Aborted);
        assert!(solr.documents("orders").is_empty());

        solr.clear_failure(SolrOperation::Commit);
        index_documents(&solr, "orders", &[order("1", "open")])
            .await
            .unwrap();
        assert_eq!(solr.documents("orders"), vec![order("1", "open")]);
    }

    #[tokio::test]
    async fn test_document_without_id_is_rejected() {
        let solr = solr_with_orders().await;
        let err = index_documents(
            &solr,
            "orders",
            &[IndexDocument::new().with_field("status", "open")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DocumentError::Submit { ref source, .. } if source.status() == Some(400)));
    }
}
