//! THE JOKE ENGINE. This module glues the bot's memory (sqlite) to the
//! logic that decides which responder, if any, an incoming message has
//! earned. It is expected to be consumed by a front end, such as a Slack
//! webhook client.
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use crate::classifier::{BotIdentity, Classifier, Dispatch, Message};
use crate::facts::{FactClient, FALLBACK};
use crate::store::{Store, LASTRUN};

/// Extra knobs on an outgoing post, passed through to the platform's
/// post-message call.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PostOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    /// Display-name override for the posted message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// One outbound post: the text plus how it should be dressed up.
#[derive(Clone, Debug)]
pub struct Reply {
    pub text: String,
    pub options: PostOptions,
}

/// The Beepboop struct is our app state: everything we want to live
/// through the whole process.
#[derive(Clone)]
pub struct Beepboop {
    /// the bot's display name; a trigger phrase and part of the welcome
    name: String,
    /// decides what incoming messages deserve
    classifier: Classifier,
    /// our sqlite handle
    store: Store,
    /// the startup-fact API
    facts: FactClient,
}

impl Beepboop {
    pub fn new(name: impl Into<String>, store: Store, facts: FactClient) -> Beepboop {
        let name = name.into();
        let classifier = Classifier::new(&name);
        Beepboop {
            name,
            classifier,
            store,
            facts,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Examine an incoming message and produce at most one reply. Storage
    /// errors bubble up so the face can log them and drop the reply;
    /// fact-API failures are swallowed here and replaced with the fallback.
    pub async fn process(&self, msg: &Message, identity: &BotIdentity) -> Result<Option<Reply>> {
        match self.classifier.classify(msg, identity) {
            Dispatch::None => Ok(None),
            Dispatch::Joke => self.tell_joke().await.map(Some),
            Dispatch::Startup => Ok(Some(self.pitch_startup().await)),
        }
    }

    /// Pick the least-told joke, ties at random, and bump its counter so
    /// the rest of the table gets a turn. The counter moves at selection
    /// time: a reply that later fails to post must not leave the same joke
    /// pinned at the front of the ordering.
    async fn tell_joke(&self) -> Result<Reply> {
        let joke = self.store.random_least_used().await?;
        self.store.mark_used(joke.id).await?;
        Ok(Reply {
            text: joke.joke,
            options: PostOptions {
                as_user: Some(true),
                icon_emoji: Some(":norrisbot:".to_string()),
                username: None,
            },
        })
    }

    /// Fetch a pitch; on any failure at all, shrug and use the canned line.
    /// Nothing here is an error from the caller's point of view.
    async fn pitch_startup(&self) -> Reply {
        let text = match self.facts.fetch().await {
            Ok(fact) => fact.pitch(),
            Err(e) => {
                log::warn!("the startup fact API let us down: {e:?}");
                FALLBACK.to_string()
            }
        };
        Reply {
            text,
            options: PostOptions {
                as_user: None,
                icon_emoji: Some(":startupbot:".to_string()),
                username: Some("Startup Guy".to_string()),
            },
        }
    }

    /// First-run bookkeeping, run once at session start. Reads the lastrun
    /// marker; if it has never been written, writes it and hands back a
    /// welcome for the face to broadcast. Every later run just refreshes
    /// the timestamp. The read completes before anything is written.
    pub async fn first_run_check(&self) -> Result<Option<String>> {
        let previous = self.store.info_get(LASTRUN).await?;
        let now = Utc::now().to_rfc3339();
        match previous {
            None => {
                self.store.info_insert(LASTRUN, &now).await?;
                Ok(Some(self.welcome()))
            }
            Some(_) => {
                self.store.info_update(LASTRUN, &now).await?;
                Ok(None)
            }
        }
    }

    /// Health-check read. Deliberately does not bump any counter.
    pub async fn random_joke(&self) -> Result<String> {
        let joke = self.store.random_least_used().await?;
        Ok(joke.joke)
    }

    /// The one-time welcome blast.
    fn welcome(&self) -> String {
        format!(
            "Hi guys, roundhouse-kick anyone?\n I can tell jokes, but very honest ones. Just say `Chuck Norris` or `{}` to invoke me!",
            self.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn identity() -> BotIdentity {
        BotIdentity {
            id: "U0BOT".to_string(),
            name: "beepboop".to_string(),
        }
    }

    fn chat(text: &str) -> Message {
        Message {
            kind: "message".to_string(),
            text: Some(text.to_string()),
            channel: Some("C123".to_string()),
            user: Some("U456".to_string()),
        }
    }

    async fn brain_with_jokes() -> Beepboop {
        let store = Store::in_memory().await.expect("could not build a store");
        store.add_joke("Chuck Norris counted to infinity. Twice.").await.unwrap();
        store.add_joke("Chuck Norris can divide by zero.").await.unwrap();
        Beepboop::new("beepboop", store, FactClient::new(reqwest::Client::new()))
    }

    #[tokio::test]
    async fn a_trigger_produces_exactly_one_joke_reply() {
        let brain = brain_with_jokes().await;
        let reply = brain
            .process(&chat("I heard chuck norris uses vim"), &identity())
            .await
            .expect("storage should not fail")
            .expect("a trigger should produce a reply");

        assert!(reply.text.contains("Chuck Norris"));
        assert_eq!(reply.options.as_user, Some(true));
        assert_eq!(reply.options.icon_emoji.as_deref(), Some(":norrisbot:"));
    }

    #[tokio::test]
    async fn telling_a_joke_records_the_telling() {
        let brain = brain_with_jokes().await;

        // With two jokes and a fresh table, two tellings must use both.
        let first = brain
            .process(&chat("chuck norris"), &identity())
            .await
            .unwrap()
            .unwrap();
        let second = brain
            .process(&chat("chuck norris"), &identity())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(
            first.text, second.text,
            "the counter must spread selection across the table"
        );
    }

    #[tokio::test]
    async fn boring_messages_produce_nothing() {
        let brain = brain_with_jokes().await;
        let reply = brain
            .process(&chat("a perfectly normal remark"), &identity())
            .await
            .unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn dms_produce_nothing_even_with_triggers() {
        let brain = brain_with_jokes().await;
        let mut msg = chat("chuck norris");
        msg.channel = Some("D999".to_string());
        assert!(brain.process(&msg, &identity()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn an_empty_store_aborts_the_joke() {
        let store = Store::in_memory().await.unwrap();
        let brain = Beepboop::new("beepboop", store, FactClient::new(reqwest::Client::new()));
        assert!(brain.process(&chat("chuck norris"), &identity()).await.is_err());
    }

    #[tokio::test]
    async fn startup_success_uses_the_fetched_fact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "this": "hammer",
                "that": "nail",
            })))
            .mount(&server)
            .await;

        let store = Store::in_memory().await.unwrap();
        let facts = FactClient::with_url(reqwest::Client::new(), server.uri());
        let brain = Beepboop::new("beepboop", store, facts);

        let reply = brain
            .process(&chat("got a .startup for me?"), &identity())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.text, "So, basically, it's like a hammer for nail");
        assert_eq!(reply.options.username.as_deref(), Some("Startup Guy"));
        assert_eq!(reply.options.icon_emoji.as_deref(), Some(":startupbot:"));
    }

    #[tokio::test]
    async fn startup_failure_falls_back_without_erroring() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = Store::in_memory().await.unwrap();
        let facts = FactClient::with_url(reqwest::Client::new(), server.uri());
        let brain = Beepboop::new("beepboop", store, facts);

        let reply = brain
            .process(&chat(".startup"), &identity())
            .await
            .expect("fact failures are never surfaced as errors")
            .unwrap();
        assert_eq!(
            reply.text,
            "Why do I always have to come up with all the bright ideas?"
        );
    }

    #[tokio::test]
    async fn first_run_welcomes_exactly_once() {
        let brain = brain_with_jokes().await;

        let welcome = brain.first_run_check().await.unwrap();
        let welcome = welcome.expect("the first run must produce a welcome");
        assert!(welcome.contains("roundhouse-kick"));
        assert!(welcome.contains("beepboop"));

        let marked = brain.store.info_get(LASTRUN).await.unwrap();
        assert!(marked.is_some(), "the first run must leave a marker");

        // Later runs refresh the marker but never re-welcome.
        let first_stamp = marked.unwrap();
        assert!(brain.first_run_check().await.unwrap().is_none());
        assert!(brain.first_run_check().await.unwrap().is_none());
        let second_stamp = brain.store.info_get(LASTRUN).await.unwrap().unwrap();
        assert!(second_stamp >= first_stamp, "the marker must move forward");
    }
}
