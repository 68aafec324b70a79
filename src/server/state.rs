/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::auth::proof::ProofIssuer;
use crate::auth::two_factor::{TwoFactorOptions, TwoFactorService};
use crate::delivery::DeliveryChannel;
use crate::import::ocr::TableExtractor;
use crate::import::{ImportOptions, ImportPipeline};
use crate::prelude::Store;
use std::sync::Arc;

#[derive(Clone, Getters)]
#[get = "pub"]
pub struct ApplicationState {
    store: Arc<dyn Store>,
    proofs: Arc<ProofIssuer>,
    two_factor: Arc<TwoFactorService>,
    import: Arc<ImportPipeline>,
    max_upload_bytes: usize,
}

impl ApplicationState {
    pub fn new(
        store: Arc<dyn Store>,
        delivery: Arc<dyn DeliveryChannel>,
        extractor: Arc<dyn TableExtractor>,
        proofs: ProofIssuer,
        two_factor: TwoFactorOptions,
        import: ImportOptions,
    ) -> Self {
        let proofs = Arc::new(proofs);
        let max_upload_bytes = import.max_upload_bytes;

        Self {
            two_factor: Arc::new(TwoFactorService::new(
                store.clone(),
                delivery,
                proofs.clone(),
                two_factor,
            )),
            import: Arc::new(ImportPipeline::new(store.clone(), extractor, import)),
            store,
            proofs,
            max_upload_bytes,
        }
    }
}
