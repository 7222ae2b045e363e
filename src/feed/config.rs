use once_cell::sync::Lazy;
use std::env;

pub static FEED_ENV: Lazy<String> =
    Lazy::new(|| env::var("FEED_ENV").unwrap_or_else(|_| "SANDBOX".to_string()));

pub static APP_KEY: Lazy<String> = Lazy::new(|| env::var("FEED_APP_KEY").unwrap_or_default());

pub static APP_SECRET: Lazy<String> = Lazy::new(|| env::var("FEED_APP_SECRET").unwrap_or_default());

pub static ROOT: Lazy<String> = Lazy::new(|| {
    if let Ok(url) = env::var("FEED_API_URL") {
        return url.trim_end_matches('/').to_string();
    }
    if FEED_ENV.as_str().eq_ignore_ascii_case("PROD") {
        "https://api.dropship-gateway.com".to_string()
    } else {
        "https://api.sandbox.dropship-gateway.com".to_string()
    }
});
