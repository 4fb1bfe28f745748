//! A process-wide default [`L402Client`] and top-level request helpers.
//!
//! The default client is built from [`ClientConfig::default`] on first use, so its payment
//! backend comes from [`discovery`](crate::discovery).

use std::sync::Arc;

use bytes::Bytes;
use http::Response;
use parking_lot::RwLock;

use crate::{
    body::RequestBody,
    client::L402Client,
    config::{ClientConfig, RequestOptions},
    errors::Result,
};

static DEFAULT_CLIENT: RwLock<Option<Arc<L402Client>>> = RwLock::new(None);

/// The default client, building it on first use.
pub fn default_client() -> Arc<L402Client> {
    if let Some(client) = DEFAULT_CLIENT.read().as_ref() {
        return client.clone();
    }

    DEFAULT_CLIENT
        .write()
        .get_or_insert_with(|| Arc::new(L402Client::new(ClientConfig::default())))
        .clone()
}

/// Replace the default client.
pub fn set_default_client(client: L402Client) -> Arc<L402Client> {
    let client = Arc::new(client);
    *DEFAULT_CLIENT.write() = Some(client.clone());
    client
}

/// Drop the default client. The next use builds a fresh one with empty budget and ledger.
pub fn reset_default_client() {
    DEFAULT_CLIENT.write().take();
}

pub async fn fetch(url: &str, options: RequestOptions) -> Result<Response<Bytes>> {
    default_client().fetch(url, options).await
}

pub async fn get(url: &str) -> Result<Response<Bytes>> {
    default_client().get(url).await
}

pub async fn post(url: &str, body: impl Into<RequestBody>) -> Result<Response<Bytes>> {
    default_client().post(url, body).await
}
