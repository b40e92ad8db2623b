//! LMDB environment setup.
//!
//! One environment holds one named database per record kind. Every database
//! uses raw byte keys (big-endian ids, so byte order is numeric order) and
//! bincode-encoded values.

use crate::LmdbError;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

/// Default LMDB map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

const MAX_DBS: u32 = 16;

pub(crate) type RawDb = Database<Bytes, Bytes>;

/// Handles for every governance table.
pub(crate) struct Tables {
    pub daos: RawDb,
    /// `dao_id ++ user_id`
    pub memberships: RawDb,
    pub proposals: RawDb,
    /// `proposal_id ++ voter_id`
    pub ballots: RawDb,
    /// `dao_id ++ record_id`
    pub quorum_history: RawDb,
    /// `dao_id ++ delegation_id`
    pub delegations: RawDb,
    /// Keyed by proposal id; one entry per queued proposal.
    pub execution_queue: RawDb,
    /// Sequence name → last allocated id.
    pub sequences: RawDb,
}

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    pub(crate) env: Env,
    pub(crate) tables: Tables,
    path: PathBuf,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given directory.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per directory per process and
        // the memory map is never accessed outside heed's transactions.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let tables = Tables {
            daos: env.create_database(&mut wtxn, Some("daos"))?,
            memberships: env.create_database(&mut wtxn, Some("memberships"))?,
            proposals: env.create_database(&mut wtxn, Some("proposals"))?,
            ballots: env.create_database(&mut wtxn, Some("ballots"))?,
            quorum_history: env.create_database(&mut wtxn, Some("quorum_history"))?,
            delegations: env.create_database(&mut wtxn, Some("delegations"))?,
            execution_queue: env.create_database(&mut wtxn, Some("execution_queue"))?,
            sequences: env.create_database(&mut wtxn, Some("sequences"))?,
        };
        wtxn.commit()?;

        info!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(Self {
            env,
            tables,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
