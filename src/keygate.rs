// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::KeygateError;
use crate::provider::Provider;

// Placing ServiceState behind Arc is necessary to address DatabaseConnection
// not implementing Clone.
pub struct Service {
    /// Config file
    pub config: Config,

    /// Service/resource Provider
    pub provider: Provider,

    /// Database connection
    pub db: DatabaseConnection,
}

pub type ServiceState = Arc<Service>;

impl Service {
    pub fn new(
        cfg: Config,
        db: DatabaseConnection,
        provider: Provider,
    ) -> Result<Self, KeygateError> {
        Ok(Self {
            config: cfg,
            provider,
            db,
        })
    }

    pub async fn terminate(&self) -> Result<(), KeygateError> {
        info!("Terminating keygate");
        Ok(())
    }
}
