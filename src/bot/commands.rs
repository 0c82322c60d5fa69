//! Turns `!command` messages into replies.

use super::reply::{build_reply_context, ReplyContext};
use super::transport::ChatTransport;
use super::types::{ContextInfo, ExtendedTextMessage, Jid, Message, MessageEvent};

/// Prefix marking a message as a command.
pub const COMMAND_SIGIL: char = '!';

pub const HELP_TEXT: &str = "🤖 *Available commands:*\n\n\
    !help - Shows this message\n\
    !all - Mentions every participant of the group\n\
    !ping - Checks that the bot is online\n\
    !info - About this bot";

pub const PING_TEXT: &str = "🏓 Pong! Bot is online!";

pub const INFO_TEXT: &str = concat!(
    "🤖 *ZapBot*\n\n",
    "Version: ",
    env!("CARGO_PKG_VERSION"),
    "\n",
    "Automated responder for group chats\n",
    "Type !help to see the commands"
);

pub const GROUPS_ONLY_TEXT: &str = "❌ This command can only be used in groups.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Ping,
    Info,
    /// Mention every participant of the group.
    All,
    Unknown(String),
}

impl Command {
    fn from_name(name: &str) -> Self {
        match name {
            "help" | "ajuda" => Command::Help,
            "ping" => Command::Ping,
            "info" => Command::Info,
            "all" => Command::All,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub args: Vec<String>,
}

/// Parses `text` as a command; `None` for ordinary chatter or a bare sigil.
pub fn parse_invocation(text: &str) -> Option<Invocation> {
    let body = text.strip_prefix(COMMAND_SIGIL)?;
    let mut parts = body.split_whitespace();
    let name = parts.next()?.to_lowercase();

    Some(Invocation {
        command: Command::from_name(&name),
        args: parts.map(str::to_string).collect(),
    })
}

/// What a command answers with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub mentions: Vec<Jid>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mentions: Vec::new(),
        }
    }
}

/// Handles one inbound message: at most one reply is sent back to its chat.
///
/// Transport failures are logged and swallowed so one bad conversation never
/// stops the processing of later events.
pub async fn handle_command(transport: &dyn ChatTransport, text: &str, evt: &MessageEvent) {
    let Some(invocation) = parse_invocation(text) else {
        return;
    };

    tracing::info!(
        "Command {:?} from {} (group: {}). Args: {:?}",
        invocation.command,
        evt.info.sender,
        evt.info.is_group,
        invocation.args
    );

    let Some(reply) = respond(transport, &invocation, evt).await else {
        return;
    };

    let reply_ctx = build_reply_context(evt);
    let message = build_outbound(reply.text, reply_ctx.as_ref(), &reply.mentions);

    if let Err(e) = transport.send_message(&evt.info.chat, message).await {
        tracing::error!("❌ Failed to send reply to {}: {}", evt.info.chat, e);
    }
}

async fn respond(
    transport: &dyn ChatTransport,
    invocation: &Invocation,
    evt: &MessageEvent,
) -> Option<Reply> {
    match &invocation.command {
        Command::Help => Some(Reply::text(HELP_TEXT)),
        Command::Ping => Some(Reply::text(PING_TEXT)),
        Command::Info => Some(Reply::text(INFO_TEXT)),
        Command::All => mention_all(transport, &invocation.args, evt).await,
        Command::Unknown(name) => Some(Reply::text(format!(
            "❌ Unknown command: {}\n\nType !help to see the available commands.",
            name
        ))),
    }
}

async fn mention_all(transport: &dyn ChatTransport, args: &[String], evt: &MessageEvent) -> Option<Reply> {
    if !evt.info.is_group {
        return Some(Reply::text(GROUPS_ONLY_TEXT));
    }

    let participants = match transport.group_roster(&evt.info.chat).await {
        Ok(participants) => participants,
        Err(e) => {
            tracing::error!("❌ Failed to fetch roster of group {}: {}", evt.info.chat, e);
            return None;
        }
    };

    let block = participants
        .iter()
        .map(|p| format!("@{}", p.user))
        .collect::<Vec<_>>()
        .join(" ");

    let text = if args.is_empty() {
        block
    } else {
        format!("{}\n\n{}", args.join(" "), block)
    };

    Some(Reply {
        text,
        mentions: participants,
    })
}

/// Builds the outbound payload.
///
/// Citation and mentions are independent: each lands in the context block
/// only when present, and a reply with neither goes out as a plain message.
pub fn build_outbound(text: String, reply_ctx: Option<&ReplyContext>, mentions: &[Jid]) -> Message {
    if reply_ctx.is_none() && mentions.is_empty() {
        return Message::plain(text);
    }

    let mut ctx = ContextInfo::default();
    if let Some(reply) = reply_ctx {
        if !reply.stanza_id.is_empty() {
            ctx.stanza_id = Some(reply.stanza_id.clone());
        }
        if !reply.participant.is_empty() {
            ctx.participant = Some(reply.participant.clone());
        }
        ctx.quoted_message = Some(reply.quoted_message.clone());
    }
    ctx.mentioned_jid = mentions.iter().map(Jid::to_string).collect();

    Message {
        conversation: None,
        extended_text_message: Some(ExtendedTextMessage {
            text,
            context_info: Some(ctx),
        }),
    }
}
