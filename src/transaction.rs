use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::connection::Connection;
use crate::error::{DmRsError, Result};
use crate::error_format::format_error;
use crate::traits::ExecuteOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// A transaction on one connection.
///
/// Sessions are opened with `autoCommit=false`, so the server already runs
/// every statement inside a transaction; this handle only finishes it.
#[derive(Debug, Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

#[derive(Debug)]
struct TransactionInner {
    id: Uuid,
    connection: Connection,
    state: Mutex<TransactionState>,
}

impl Transaction {
    pub fn new(connection: &Connection) -> Self {
        Self {
            inner: Arc::new(TransactionInner {
                id: Uuid::new_v4(),
                connection: connection.clone(),
                state: Mutex::new(TransactionState::Active),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    pub fn state(&self) -> TransactionState {
        *self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn mark(&self, state: TransactionState) {
        *self.inner.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub async fn commit(&self) -> Result<()> {
        self.finish("COMMIT", TransactionState::Committed).await
    }

    pub async fn rollback(&self) -> Result<()> {
        self.finish("ROLLBACK", TransactionState::RolledBack).await
    }

    async fn finish(&self, sql: &str, target: TransactionState) -> Result<()> {
        let state = self.state();
        if state != TransactionState::Active {
            return Err(DmRsError::TransactionFinished(state));
        }
        log::debug!("Executing ({}): {}", self.id(), sql);
        self.connection()
            .session()
            .execute(sql, &[], &ExecuteOptions::default())
            .await
            .map_err(|e| format_error(e, None, None))?;
        self.mark(target);
        Ok(())
    }
}
