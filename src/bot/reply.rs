use super::types::{Message, MessageEvent};

/// The message a command quoted, carried forward so the answer quotes it too.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyContext {
    pub stanza_id: String,
    pub participant: String,
    /// Re-attached verbatim; never inspected.
    pub quoted_message: Box<Message>,
}

/// Extracts the quotation metadata of `evt`, if the message quoted anything.
pub fn build_reply_context(evt: &MessageEvent) -> Option<ReplyContext> {
    let ext = evt.message.as_ref()?.extended_text_message.as_ref()?;
    let ctx = ext.context_info.as_ref()?;
    let quoted_message = ctx.quoted_message.clone()?;

    Some(ReplyContext {
        stanza_id: ctx.stanza_id.clone().unwrap_or_default(),
        participant: ctx.participant.clone().unwrap_or_default(),
        quoted_message,
    })
}
