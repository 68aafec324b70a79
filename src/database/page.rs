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

use crate::database::DatabaseConnection;
use crate::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::pin::Pin;

const MAX_PAGE_SIZE: u64 = 100;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Page<T>
where
    T: Serialize,
{
    /// the result
    pub data: Vec<T>,
    /// the total count of pages
    pub pages: u64,
    /// the total count of elements
    pub total: u64,
    /// the offset for the next page
    pub next_page_offset: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PagingOptions {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl<'a> PagingOptions {
    #[instrument(skip(connection))]
    pub fn execute<P, T>(
        self,
        query: &'a str,
        bindings: &'a [P],
        connection: &'a DatabaseConnection,
    ) -> PagingRequest<'a, P, T>
    where
        T: DeserializeOwned + Serialize + Send + Sync,
        P: Serialize + Send + Sync + std::fmt::Debug,
    {
        PagingRequest {
            options: self,
            query,
            bindings,
            connection,
            response: PhantomData,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1) * self.size()
    }

    pub fn size(&self) -> u64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Builds the page out of an already loaded, ordered result set.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T>
    where
        T: Serialize,
    {
        let total = items.len() as u64;
        let data = items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.size() as usize)
            .collect();

        self.page(data, total)
    }

    fn page<T>(&self, data: Vec<T>, total: u64) -> Page<T>
    where
        T: Serialize,
    {
        Page {
            data,
            pages: (total as f64 / self.size() as f64).ceil() as u64,
            total,
            next_page_offset: self.offset() + self.size(),
        }
    }
}

impl Default for PagingOptions {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

#[derive(Debug)]
pub struct PagingRequest<'a, P, T>
where
    P: Serialize + Send + Sync,
    T: DeserializeOwned + Serialize + Send + Sync,
{
    pub options: PagingOptions,
    pub query: &'a str,
    pub bindings: &'a [P],
    pub connection: &'a DatabaseConnection,
    response: PhantomData<T>,
}

impl<'a, P, T> IntoFuture for PagingRequest<'a, P, T>
where
    P: Serialize + Send + Sync,
    T: DeserializeOwned + Serialize + Send + Sync + 'a,
{
    type Output = Result<Page<T>>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + Sync + 'a>>;

    #[instrument(skip_all)]
    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            // build the query
            let query = {
                let limit = format!(
                    "LIMIT {} START {}",
                    self.options.size(),
                    self.options.offset()
                );

                if self.query.contains("%%%") {
                    self.query.replace("%%%", limit.as_str())
                } else {
                    format!("{} {}", self.query, limit)
                }
            };
            let count_query = format!(
                "RETURN count(({}))",
                self.query.split("%%%").next().unwrap_or(self.query)
            );

            // setup the database request
            let mut request = self.connection.query(count_query).query(query);
            // apply the bindings
            for binding in self.bindings.iter() {
                request = request.bind(binding)
            }

            // process the request
            let mut response = sql_span!(request, "paging").await?.check()?;
            // extract count
            let total = response
                .take::<Option<u64>>(0)?
                .ok_or(ApplicationError::InternalServerError)?;
            // parse the entries
            let data = response.take::<Vec<T>>(1)?;

            Ok(self.options.page(data, total))
        })
    }
}
