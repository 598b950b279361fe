//! Knowledge retrieval boundary

use async_trait::async_trait;

use crate::TenantId;

/// Tenant-scoped knowledge context
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Formatted context for `query` from `tenant`'s collection only
    ///
    /// Total: an empty string means no relevant context, including when the
    /// backend failed or the tenant has no collection.
    async fn retrieve_context(&self, tenant: &TenantId, query: &str, limit: usize) -> String;
}
