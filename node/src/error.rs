use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] agora_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] agora_store_lmdb::LmdbError),

    #[error("governance error: {0}")]
    Governance(#[from] agora_governance::GovernanceError),

    #[error("RPC server error: {0}")]
    Rpc(#[from] agora_rpc::RpcError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("no effect executor configured")]
    NoExecutor,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
