use pricesync_db::DbError;
use pricesync_marketplace::MarketplaceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),

    #[error("store error: {0}")]
    Store(#[from] DbError),
}

impl SyncError {
    /// Credential-exchange and store-connectivity failures stop the whole
    /// cycle. Anything else is recorded against the item it happened to.
    #[must_use]
    pub fn aborts_cycle(&self) -> bool {
        match self {
            SyncError::Marketplace(e) => e.aborts_cycle(),
            SyncError::Store(e) => e.is_connectivity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_connectivity_aborts() {
        assert!(SyncError::Store(DbError::Sqlx(sqlx::Error::PoolTimedOut)).aborts_cycle());
        assert!(!SyncError::Store(DbError::NotFound).aborts_cycle());
    }

    #[test]
    fn credential_failure_aborts() {
        let err = SyncError::Marketplace(MarketplaceError::Auth {
            status: 401,
            body: String::new(),
        });
        assert!(err.aborts_cycle());

        let throttled = SyncError::Marketplace(MarketplaceError::RateLimited {
            endpoint: "/pricing".to_owned(),
            retry_after_secs: 1,
        });
        assert!(!throttled.aborts_cycle());
    }
}
