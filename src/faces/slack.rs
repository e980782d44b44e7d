//! The Slack face: bootstraps the session (who are we? which channels
//! exist?), filters incoming event envelopes, and posts whatever the brain
//! hands back via the Web API.
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use crate::beepboop::{Beepboop, PostOptions, Reply};
use crate::classifier::{BotIdentity, Message};

/// Base URL for the Slack Web API.
const SLACK_API: &str = "https://slack.com/api";

/// One channel from the workspace roster.
#[derive(Clone, Debug, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct UsersListResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    members: Vec<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct ConversationsListResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channels: Vec<ChannelInfo>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// The Slack session: API token, shared http client, the brain, and the
/// rosters resolved at connect time. Identity and channel roster are
/// immutable for the life of the session.
#[derive(Clone)]
pub struct SlackFace {
    /// the API token we must send to Slack
    slack_token: String,
    /// one shared client for all Web API traffic
    http: reqwest::Client,
    /// our beepboop brain
    brain: Beepboop,
    /// who we are on this workspace
    identity: BotIdentity,
    /// the channel roster, loaded once
    channels: Vec<ChannelInfo>,
}

impl SlackFace {
    /// Connect-time bootstrap: resolve our own identity from the user
    /// roster by configured name, and load the channel roster. A bot name
    /// nobody in the roster carries is a broken configuration, so that
    /// fails here rather than on the first message.
    pub async fn connect(
        slack_token: String,
        http: reqwest::Client,
        brain: Beepboop,
    ) -> Result<SlackFace> {
        let identity = Self::load_bot_user(&http, &slack_token, brain.name()).await?;
        let channels = Self::load_channels(&http, &slack_token).await?;
        log::info!(
            "beep boop: i am {} ({}) and i can see {} channels",
            identity.name,
            identity.id,
            channels.len()
        );
        Ok(SlackFace {
            slack_token,
            http,
            brain,
            identity,
            channels,
        })
    }

    async fn load_bot_user(
        http: &reqwest::Client,
        token: &str,
        name: &str,
    ) -> Result<BotIdentity> {
        let response: UsersListResponse = http
            .get(format!("{SLACK_API}/users.list"))
            .bearer_auth(token)
            .send()
            .await?
            .json()
            .await
            .context("users.list returned something that was not json")?;
        if !response.ok {
            anyhow::bail!("users.list failed: {}", response.error.unwrap_or_default());
        }
        response
            .members
            .into_iter()
            .find(|u| u.name == name)
            .map(|u| BotIdentity {
                id: u.id,
                name: u.name,
            })
            .ok_or_else(|| {
                anyhow::anyhow!("no user named \"{name}\" in the workspace roster; check BOT_NAME")
            })
    }

    async fn load_channels(http: &reqwest::Client, token: &str) -> Result<Vec<ChannelInfo>> {
        let response: ConversationsListResponse = http
            .get(format!("{SLACK_API}/conversations.list"))
            .bearer_auth(token)
            .send()
            .await?
            .json()
            .await
            .context("conversations.list returned something that was not json")?;
        if !response.ok {
            anyhow::bail!(
                "conversations.list failed: {}",
                response.error.unwrap_or_default()
            );
        }
        Ok(response.channels)
    }

    pub fn brain(&self) -> &Beepboop {
        &self.brain
    }

    /// Process one incoming message event. The brain decides; we post.
    /// Returns true if something was posted.
    pub async fn handle_message(&self, incoming: &Message) -> Result<bool> {
        let reply = match self.brain.process(incoming, &self.identity).await? {
            Some(reply) => reply,
            None => return Ok(false),
        };
        let channel = incoming.channel.as_deref().unwrap_or_default();
        log::info!(
            "replying in {channel}: `{}`; prompt: `{}`",
            reply.text,
            incoming.text.as_deref().unwrap_or_default()
        );
        self.post_to_channel_id(channel, &reply).await
    }

    /// Resolve a channel id against the roster we loaded at connect. The
    /// original had no fallback resolution here and neither do we: an
    /// unknown id is an error for this message.
    fn channel_by_id(&self, id: &str) -> Result<&ChannelInfo> {
        self.channels.iter().find(|c| c.id == id).ok_or_else(|| {
            anyhow::anyhow!("channel id {id} is not in the roster loaded at connect")
        })
    }

    async fn post_to_channel_id(&self, id: &str, reply: &Reply) -> Result<bool> {
        let channel = self.channel_by_id(id)?;
        let name = channel.name.clone();
        self.post_message(&name, &reply.text, &reply.options).await
    }

    /// If this is the first run ever, welcome the workspace; otherwise just
    /// refresh the lastrun marker. The welcome goes to WELCOME_CHANNEL if
    /// set, else the first channel in the roster.
    pub async fn maybe_welcome(&self) -> Result<bool> {
        let welcome = match self.brain.first_run_check().await? {
            Some(text) => text,
            None => return Ok(false),
        };
        let channel = match std::env::var("WELCOME_CHANNEL") {
            Ok(name) => name,
            Err(_) => match self.channels.first() {
                Some(c) => c.name.clone(),
                None => anyhow::bail!("nowhere to send the welcome; the channel roster is empty"),
            },
        };
        let options = PostOptions {
            as_user: Some(true),
            ..PostOptions::default()
        };
        self.post_message(&channel, &welcome, &options).await
    }

    /// Slack implementation: send one message to a channel by name.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        options: &PostOptions,
    ) -> Result<bool> {
        let mut body = json!({
            "channel": channel,
            "text": text,
        });
        // Fold the post options into the request body.
        if let (serde_json::Value::Object(map), serde_json::Value::Object(extra)) =
            (&mut body, serde_json::to_value(options)?)
        {
            map.extend(extra);
        }

        let response: PostMessageResponse = self
            .http
            .post(format!("{SLACK_API}/chat.postMessage"))
            .bearer_auth(&self.slack_token)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            log::error!(
                "error trying to post message: {}",
                response.error.unwrap_or_default()
            );
            return Ok(false);
        }
        Ok(true)
    }
}
