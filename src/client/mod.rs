use crate::{
    config::ClientConfig,
    hmac::{HmacToken, HmacUpload},
    http,
    item::{Item, ItemList, ItemsQuery, NewItem},
    RemoteError,
};
use futures::{prelude::*, stream};
use reqwest::{multipart::Form, Method, RequestBuilder};

#[cfg(test)]
mod tests;

/// A client for the VWflow items api.
///
/// Every method sends exactly one request. Nothing is retried, and errors of
/// any kind come back as a [`RemoteError`].
#[derive(Clone)]
pub struct VWflow {
    config: ClientConfig,
    base: String,
    // kept until the first request, so construction can't fail
    client: Result<reqwest::Client, RemoteError>,
}

impl std::fmt::Debug for VWflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VWflow")
            .field("base", &self.base)
            .field("username", &self.config.username)
            .finish()
    }
}

impl VWflow {
    pub fn new(username: impl ToString, password: impl ToString) -> Self {
        Self::with_config(ClientConfig::new(username, password))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let client = http::new_client(&config);
        Self {
            base: config.base_url(),
            client,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// The form endpoint for browser uploads signed with an [`HmacToken`]
    pub fn hmac_redirect_url(&self, account_id: &str, wprofile_id: &str) -> String {
        format!(
            "{}items-hmac-redirect/{}/{}/",
            self.base, account_id, wprofile_id
        )
    }

    /// Runs an items query.
    ///
    /// The configured default arguments go first, then `query`. If neither
    /// mentions a page, `page=1` is asked for.
    pub async fn list_items(&self, query: &ItemsQuery) -> Result<ItemList, RemoteError> {
        let url = format!("{}items/?{}", self.base, self.query_string(query));
        self.items_from_url(&url).await
    }

    /// Gets a page of items from a full url, e.g. [`ItemList::next`]
    pub async fn items_from_url(&self, url: &str) -> Result<ItemList, RemoteError> {
        http::get_json(self.request(Method::GET, url)?).await
    }

    /// Every page of an items query, following the `next` links until there are none.
    ///
    /// The stream ends after the first error.
    pub fn pages<'a>(
        &'a self,
        query: &'a ItemsQuery,
    ) -> impl Stream<Item = Result<ItemList, RemoteError>> + 'a {
        enum State {
            First,
            Next(String),
            Done,
        }

        stream::unfold(State::First, move |state| async move {
            let page = match state {
                State::First => self.list_items(query).await,
                State::Next(url) => self.items_from_url(&url).await,
                State::Done => return None,
            };

            let state = match &page {
                Ok(ItemList {
                    next: Some(next), ..
                }) if !next.is_empty() => State::Next(next.clone()),
                _ => State::Done,
            };
            Some((page, state))
        })
    }

    /// Creates an item by uploading a file
    pub async fn create_item(&self, item: &NewItem) -> Result<Item, RemoteError> {
        let mut form = Form::new().part("src", http::file_part(item.path()).await?);

        let fields = vec![
            ("name", item.name.clone()),
            ("description", item.description.clone()),
            ("wprofile_id", item.wprofile_id.clone()),
            ("data", item.data()),
            ("client_data", item.client_data.clone()),
            ("input_data", item.input_data.clone()),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                form = form.text(key, value);
            }
        }

        let url = format!("{}items/", self.base);
        let req = self
            .request(Method::POST, &url)?
            .timeout(self.config.upload_timeout)
            .multipart(form);
        http::get_json(req).await
    }

    pub async fn get_item(&self, id: &str) -> Result<Item, RemoteError> {
        http::get_json(self.request(Method::GET, &self.item_url(id))?).await
    }

    /// Replaces the item with `item`, using the id from the document.
    ///
    /// This is not a partial update: anything left out is dropped by the service.
    /// Decoded items always carry an id, one built by hand with an empty id ends up at `items//`.
    pub async fn update_item(&self, item: &Item) -> Result<Item, RemoteError> {
        let req = self.request(Method::PUT, &self.item_url(&item.id))?.json(item);
        http::get_json(req).await
    }

    /// Selects another snapshot (poster image) for an item
    pub async fn set_item_snapshot(
        &self,
        id: &str,
        snapshot_id: i64,
    ) -> Result<Item, RemoteError> {
        #[derive(serde::Serialize)]
        struct Body {
            snapshot_id: i64,
        }

        let req = self
            .request(Method::PUT, &self.item_url(id))?
            .json(&Body { snapshot_id });
        http::get_json(req).await
    }

    pub async fn delete_item(&self, id: &str) -> Result<(), RemoteError> {
        http::send(self.request(Method::DELETE, &self.item_url(id))?)
            .await
            .map(|_| ())
    }

    /// Creates an item through the `items-hmac` endpoint.
    ///
    /// This doesn't use the account credentials, only the workflow profile's secret.
    pub async fn create_item_with_hmac(
        &self,
        upload: &HmacUpload,
    ) -> Result<serde_json::Value, RemoteError> {
        let token = upload.token(time::OffsetDateTime::now_utc());
        self.upload_with_token(upload, &token).await
    }

    /// Like [`VWflow::create_item_with_hmac`], with a token made by the caller
    pub async fn upload_with_token(
        &self,
        upload: &HmacUpload,
        token: &HmacToken,
    ) -> Result<serde_json::Value, RemoteError> {
        let url = format!(
            "{}items-hmac/{}/{}/",
            self.base, upload.account_id, upload.wprofile_id
        );

        let form = Form::new().part("src", http::file_part(&upload.path).await?);
        let mut req = self
            .http()?
            .post(&url)
            .timeout(self.config.upload_timeout)
            .multipart(form);
        for (key, value) in &token.headers() {
            req = req.header(*key, value.as_str());
        }

        log::debug!("POST {}", url);
        http::get_json(req).await
    }

    fn http(&self) -> Result<&reqwest::Client, RemoteError> {
        self.client.as_ref().map_err(|err| err.clone())
    }

    fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, RemoteError> {
        log::debug!("{} {}", method, url);
        Ok(self
            .http()?
            .request(method, url)
            .basic_auth(&self.config.username, Some(&self.config.password)))
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}items/{}/", self.base, id)
    }

    fn query_string(&self, query: &ItemsQuery) -> String {
        let defaults = self.config.default_query.iter();
        let params = defaults.chain(query.params()).collect::<Vec<_>>();

        let mut out = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>();

        if !params.iter().any(|(k, _)| k.eq_ignore_ascii_case("page")) {
            out.push("page=1".to_string());
        }
        out.join("&")
    }
}
