//! Deciding what, if anything, an incoming message has earned from us.
//! Pure predicates over the message envelope plus our own identity, so a
//! message can never trigger more than one responder.
use regex::Regex;
use serde::Deserialize;

/// An incoming real-time message, as unwrapped from an event callback.
/// Everything is optional because Slack sends many event shapes down the
/// same pipe; the predicates below sort out which ones we care about.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Message {
    /// The event type tag. Only `"message"` interests us.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Channel id. Public channels start with `C`; DMs with `D`, groups with `G`.
    #[serde(default)]
    pub channel: Option<String>,
    /// Author's user id.
    #[serde(default)]
    pub user: Option<String>,
}

/// The bot's own user entry, resolved once per session from the workspace
/// roster and immutable afterward. We use it to avoid replying to ourselves.
#[derive(Clone, Debug)]
pub struct BotIdentity {
    pub id: String,
    pub name: String,
}

/// Which responder, if any, a message gets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// No response wanted.
    None,
    /// Respond with a joke from the store.
    Joke,
    /// Respond with a freshly-fetched startup pitch.
    Startup,
}

/// Message classifier, extracted for ease of testing and to prevent having
/// to recompile regexes per message.
#[derive(Clone, Debug)]
pub struct Classifier {
    /// The famous martial artist, in any capitalization.
    norris: Regex,
    /// Our own name, whatever it was configured to be.
    own_name: Regex,
    /// The `.startup` invocation.
    startup: Regex,
}

impl Classifier {
    pub fn new(bot_name: &str) -> Self {
        Classifier {
            norris: Regex::new("(?i)chuck norris").unwrap(),
            // The name is escaped, so this compile cannot fail.
            own_name: Regex::new(&format!("(?i){}", regex::escape(bot_name))).unwrap(),
            startup: Regex::new(r"(?i)\.startup").unwrap(),
        }
    }

    /// A chat message proper: tagged `message` and carrying non-empty text.
    pub fn is_chat_message(msg: &Message) -> bool {
        msg.kind == "message" && msg.text.as_deref().map_or(false, |t| !t.is_empty())
    }

    /// Is this happening in a public channel? DMs and private groups are
    /// none of our business.
    pub fn is_channel_conversation(msg: &Message) -> bool {
        msg.channel.as_deref().map_or(false, |c| c.starts_with('C'))
    }

    /// Did we say this ourselves? Answering our own messages is how reply
    /// loops start.
    pub fn is_from_self(msg: &Message, identity: &BotIdentity) -> bool {
        msg.user.as_deref() == Some(identity.id.as_str())
    }

    /// Chuck Norris, or us by name.
    pub fn mentions_trigger(&self, text: &str) -> bool {
        self.norris.is_match(text) || self.own_name.is_match(text)
    }

    pub fn invokes_startup(&self, text: &str) -> bool {
        self.startup.is_match(text)
    }

    /// Decide what an incoming message gets. Strict order, first match wins:
    /// at most one responder ever fires for a single message.
    pub fn classify(&self, msg: &Message, identity: &BotIdentity) -> Dispatch {
        if !Self::is_chat_message(msg)
            || !Self::is_channel_conversation(msg)
            || Self::is_from_self(msg, identity)
        {
            return Dispatch::None;
        }
        let text = msg.text.as_deref().unwrap_or_default();
        if self.mentions_trigger(text) {
            Dispatch::Joke
        } else if self.invokes_startup(text) {
            Dispatch::Startup
        } else {
            Dispatch::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> BotIdentity {
        BotIdentity {
            id: "U0BOT".to_string(),
            name: "beepboop".to_string(),
        }
    }

    fn chat(text: &str, channel: &str, user: &str) -> Message {
        Message {
            kind: "message".to_string(),
            text: Some(text.to_string()),
            channel: Some(channel.to_string()),
            user: Some(user.to_string()),
        }
    }

    #[test]
    fn non_chat_messages_are_ignored() {
        let classifier = Classifier::new("beepboop");
        let me = identity();

        let mut msg = chat("chuck norris", "C123", "U456");
        msg.kind = "reaction_added".to_string();
        assert_eq!(classifier.classify(&msg, &me), Dispatch::None);

        let mut msg = chat("chuck norris", "C123", "U456");
        msg.text = Some(String::new());
        assert_eq!(classifier.classify(&msg, &me), Dispatch::None);

        let mut msg = chat("chuck norris", "C123", "U456");
        msg.text = None;
        assert_eq!(classifier.classify(&msg, &me), Dispatch::None);
    }

    #[test]
    fn dms_and_groups_are_ignored() {
        let classifier = Classifier::new("beepboop");
        let me = identity();

        assert_eq!(
            classifier.classify(&chat("chuck norris", "D123", "U456"), &me),
            Dispatch::None,
            "direct messages do not trigger"
        );
        assert_eq!(
            classifier.classify(&chat(".startup", "G123", "U456"), &me),
            Dispatch::None,
            "group messages do not trigger"
        );

        let mut msg = chat("chuck norris", "C123", "U456");
        msg.channel = None;
        assert_eq!(classifier.classify(&msg, &me), Dispatch::None);
    }

    #[test]
    fn we_never_answer_ourselves() {
        let classifier = Classifier::new("beepboop");
        let me = identity();

        assert_eq!(
            classifier.classify(&chat("chuck norris", "C123", "U0BOT"), &me),
            Dispatch::None
        );
        assert_eq!(
            classifier.classify(&chat(".startup beepboop", "C123", "U0BOT"), &me),
            Dispatch::None
        );
    }

    #[test]
    fn chuck_gets_a_joke_in_any_case() {
        let classifier = Classifier::new("beepboop");
        let me = identity();

        assert_eq!(
            classifier.classify(&chat("Chuck Norris", "C123", "U456"), &me),
            Dispatch::Joke
        );
        assert_eq!(
            classifier.classify(&chat("i heard CHUCK NORRIS once kicked", "C123", "U456"), &me),
            Dispatch::Joke
        );
        assert_eq!(
            classifier.classify(&chat("hey BeepBoop, tell me one", "C123", "U456"), &me),
            Dispatch::Joke,
            "our own name is also a trigger"
        );
    }

    #[test]
    fn startup_token_gets_a_pitch() {
        let classifier = Classifier::new("beepboop");
        let me = identity();

        assert_eq!(
            classifier.classify(&chat("give me a .startup", "C123", "U456"), &me),
            Dispatch::Startup
        );
        assert_eq!(
            classifier.classify(&chat(".STARTUP", "C123", "U456"), &me),
            Dispatch::Startup
        );
        assert_eq!(
            classifier.classify(&chat("we're starting up", "C123", "U456"), &me),
            Dispatch::None,
            "the literal token is required"
        );
    }

    #[test]
    fn joke_wins_when_both_triggers_appear() {
        let classifier = Classifier::new("beepboop");
        let me = identity();

        assert_eq!(
            classifier.classify(&chat("chuck norris .startup", "C123", "U456"), &me),
            Dispatch::Joke,
            "dispatch order is strict; only the first match fires"
        );
    }

    #[test]
    fn boring_messages_get_nothing() {
        let classifier = Classifier::new("beepboop");
        let me = identity();

        assert_eq!(
            classifier.classify(&chat("just a normal tuesday", "C123", "U456"), &me),
            Dispatch::None
        );
    }

    #[test]
    fn odd_bot_names_do_not_break_the_pattern() {
        let classifier = Classifier::new("beep.boop (v2)");
        let me = identity();

        assert_eq!(
            classifier.classify(&chat("paging beep.boop (v2)!", "C123", "U456"), &me),
            Dispatch::Joke
        );
        assert_eq!(
            classifier.classify(&chat("beepXboopY(v2)", "C123", "U456"), &me),
            Dispatch::None,
            "the name is matched literally, not as a pattern"
        );
    }
}
