use crate::db::{self, ConnectionManager, DatabaseError, ManagerStatus};
use crate::types::{QueryResult, TableInfo, TableSchema};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use tokio::sync::oneshot;

type Reply<T> = oneshot::Sender<Result<T, DatabaseError>>;

/// Messages sent to the worker thread
#[derive(Debug)]
pub enum WorkerMessage {
    ListTables {
        reply: Reply<Vec<TableInfo>>,
    },
    DescribeTable {
        table_name: String,
        reply: Reply<TableSchema>,
    },
    PreviewTable {
        table_name: String,
        limit: usize,
        reply: Reply<QueryResult>,
    },
    ExecuteQuery {
        query: String,
        max_rows: Option<usize>,
        reply: Reply<QueryResult>,
    },
    SchemaSummary {
        reply: Reply<String>,
    },
    Reset {
        reply: Reply<()>,
    },
    Swap {
        path: PathBuf,
        reply: Reply<()>,
    },
    Status {
        reply: oneshot::Sender<ManagerStatus>,
    },
    Shutdown,
}

/// Thread that exclusively owns the connection manager.
///
/// Every database operation is a message, so executions, resets and swaps
/// are strictly serialized and no caller ever sees a half-swapped handle.
pub struct Worker {
    handle: WorkerHandle,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    /// Create a new worker around a connection manager
    pub fn new(manager: ConnectionManager) -> Self {
        let (tx, rx) = mpsc::channel();

        let thread = thread::spawn(move || {
            let mut manager = manager;
            loop {
                match rx.recv() {
                    Ok(WorkerMessage::ListTables { reply }) => {
                        let _ = reply.send(db::list_tables(&mut manager));
                    }
                    Ok(WorkerMessage::DescribeTable { table_name, reply }) => {
                        let _ = reply.send(db::table_schema(&mut manager, &table_name));
                    }
                    Ok(WorkerMessage::PreviewTable {
                        table_name,
                        limit,
                        reply,
                    }) => {
                        let _ = reply.send(db::preview_table(&mut manager, &table_name, limit));
                    }
                    Ok(WorkerMessage::ExecuteQuery {
                        query,
                        max_rows,
                        reply,
                    }) => {
                        let _ = reply.send(db::execute_query(&mut manager, &query, max_rows));
                    }
                    Ok(WorkerMessage::SchemaSummary { reply }) => {
                        let _ = reply.send(db::schema_summary(&mut manager));
                    }
                    Ok(WorkerMessage::Reset { reply }) => {
                        let _ = reply.send(manager.reset());
                    }
                    Ok(WorkerMessage::Swap { path, reply }) => {
                        let _ = reply.send(manager.swap(&path));
                    }
                    Ok(WorkerMessage::Status { reply }) => {
                        let _ = reply.send(manager.status());
                    }
                    Ok(WorkerMessage::Shutdown) | Err(_) => {
                        manager.close();
                        break;
                    }
                }
            }
        });

        Self {
            handle: WorkerHandle { sender: tx },
            thread,
        }
    }

    /// Cloneable sender side for request handlers
    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Close the connection and stop the worker thread
    pub fn shutdown(self) -> Result<()> {
        // Already-stopped workers have dropped their receiver
        let _ = self.handle.sender.send(WorkerMessage::Shutdown);
        self.thread
            .join()
            .map_err(|_| anyhow::anyhow!("Worker thread panicked"))?;
        Ok(())
    }
}

/// Async client for the worker thread
#[derive(Clone)]
pub struct WorkerHandle {
    sender: mpsc::Sender<WorkerMessage>,
}

impl WorkerHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> WorkerMessage,
    ) -> Result<T, DatabaseError> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(build(tx)).map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())?
    }

    pub async fn list_tables(&self) -> Result<Vec<TableInfo>, DatabaseError> {
        self.request(|reply| WorkerMessage::ListTables { reply }).await
    }

    pub async fn describe_table(&self, table_name: &str) -> Result<TableSchema, DatabaseError> {
        let table_name = table_name.to_string();
        self.request(|reply| WorkerMessage::DescribeTable { table_name, reply })
            .await
    }

    pub async fn preview_table(
        &self,
        table_name: &str,
        limit: usize,
    ) -> Result<QueryResult, DatabaseError> {
        let table_name = table_name.to_string();
        self.request(|reply| WorkerMessage::PreviewTable {
            table_name,
            limit,
            reply,
        })
        .await
    }

    pub async fn execute_query(
        &self,
        query: &str,
        max_rows: Option<usize>,
    ) -> Result<QueryResult, DatabaseError> {
        let query = query.to_string();
        self.request(|reply| WorkerMessage::ExecuteQuery {
            query,
            max_rows,
            reply,
        })
        .await
    }

    pub async fn schema_summary(&self) -> Result<String, DatabaseError> {
        self.request(|reply| WorkerMessage::SchemaSummary { reply })
            .await
    }

    pub async fn reset(&self) -> Result<(), DatabaseError> {
        self.request(|reply| WorkerMessage::Reset { reply }).await
    }

    pub async fn swap(&self, path: PathBuf) -> Result<(), DatabaseError> {
        self.request(|reply| WorkerMessage::Swap { path, reply })
            .await
    }

    pub async fn status(&self) -> Result<ManagerStatus, DatabaseError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WorkerMessage::Status { reply: tx })
            .map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }
}

fn stopped() -> DatabaseError {
    DatabaseError::NotReady("database worker has stopped".to_string())
}
