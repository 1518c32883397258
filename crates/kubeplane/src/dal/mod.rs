/*
 *  Copyright 2025-2026 Kubeplane Maintainers
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Data Access Layer
//!
//! The [`DAL`] hands out short-lived per-entity accessors that borrow it:
//!
//! ```rust,ignore
//! let dal = DAL::new(database);
//! let cluster = dal.cluster().get(cluster_id).await?;
//! let events = dal.cluster_event().list_by_cluster(cluster_id).await?;
//! ```
//!
//! Every accessor method checks a connection out of the pool and runs its
//! diesel query inside `interact`, so callers never block the runtime.

use crate::database::Database;

pub mod cluster;
pub mod cluster_event;
pub mod models;

pub use cluster::ClusterDAL;
pub use cluster_event::ClusterEventDAL;

/// Entry point for entity store access.
#[derive(Clone, Debug)]
pub struct DAL {
    pub database: Database,
}

impl DAL {
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn cluster(&self) -> ClusterDAL {
        ClusterDAL { dal: self }
    }

    pub fn cluster_event(&self) -> ClusterEventDAL {
        ClusterEventDAL { dal: self }
    }
}
