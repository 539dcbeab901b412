use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::{Client, Proxy};

use crate::core::state::ProxySettings;

const APP_USER_AGENT: &str = "InterfaceOficial/0.1.0";

/// Build the shared HTTP client. Every download the installer performs goes
/// through this client, so the configured proxy applies everywhere.
pub fn build_http_client(proxy: Option<&ProxySettings>) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    let mut builder = Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers);

    if let Some(settings) = proxy {
        let mut proxy = Proxy::all(&settings.url)?;
        if let Some(username) = settings.username.as_deref() {
            proxy = proxy.basic_auth(username, settings.password.as_deref().unwrap_or(""));
        }
        builder = builder.proxy(proxy);
    }

    builder.build()
}
