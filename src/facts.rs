//! The startup-pitch half of the bot's repertoire: one GET to
//! itsthisforthat.com, one sentence of pure venture capital.
use anyhow::Result;
use serde::Deserialize;

/// Where fresh startup ideas come from.
pub const FACT_URL: &str = "http://itsthisforthat.com/api.php?json";

/// What we say when the idea well is dry.
pub const FALLBACK: &str = "Why do I always have to come up with all the bright ideas?";

/// The payload the API serves: an X for Y.
#[derive(Clone, Debug, Deserialize)]
pub struct StartupFact {
    pub this: String,
    pub that: String,
}

impl StartupFact {
    /// Render the fact the way the bot announces it.
    pub fn pitch(&self) -> String {
        format!("So, basically, it's like a {} for {}", self.this, self.that)
    }
}

/// A thin client for the startup-fact API: a shared http client plus the
/// endpoint to hit. Stateless otherwise.
#[derive(Clone, Debug)]
pub struct FactClient {
    http: reqwest::Client,
    url: String,
}

impl FactClient {
    pub fn new(http: reqwest::Client) -> Self {
        FactClient {
            http,
            url: FACT_URL.to_string(),
        }
    }

    /// Point the client somewhere else. Tests use this.
    pub fn with_url(http: reqwest::Client, url: impl Into<String>) -> Self {
        FactClient {
            http,
            url: url.into(),
        }
    }

    /// One GET, no retries, no timeout beyond the client's defaults. Any
    /// failure here is recovered by the caller with [`FALLBACK`].
    pub async fn fetch(&self) -> Result<StartupFact> {
        let fact = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<StartupFact>()
            .await?;
        Ok(fact)
    }
}
