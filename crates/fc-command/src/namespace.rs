//! Closed table of opinion namespaces. An unrecognized namespace is fatal
//! rather than silently dropped.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpinionNamespace {
    ConversationAddTags,
    ConversationRemoveTags,
    ConversationSetNotes,
    ConversationSetUnread,
    MessageAddTags,
    MessageRemoveTags,
    MessageSetTranslation,
    SmsRawMsg,
    SuggestedReplies,
}

impl OpinionNamespace {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "nook_conversations/add_tags" => Self::ConversationAddTags,
            "nook_conversations/remove_tags" => Self::ConversationRemoveTags,
            "nook_conversations/set_notes" => Self::ConversationSetNotes,
            "nook_conversations/set_unread" => Self::ConversationSetUnread,
            "nook_messages/add_tags" => Self::MessageAddTags,
            "nook_messages/remove_tags" => Self::MessageRemoveTags,
            "nook_messages/set_translation" => Self::MessageSetTranslation,
            "sms_raw_msg" => Self::SmsRawMsg,
            "nook/set_suggested_replies" => Self::SuggestedReplies,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConversationAddTags => "nook_conversations/add_tags",
            Self::ConversationRemoveTags => "nook_conversations/remove_tags",
            Self::ConversationSetNotes => "nook_conversations/set_notes",
            Self::ConversationSetUnread => "nook_conversations/set_unread",
            Self::MessageAddTags => "nook_messages/add_tags",
            Self::MessageRemoveTags => "nook_messages/remove_tags",
            Self::MessageSetTranslation => "nook_messages/set_translation",
            Self::SmsRawMsg => "sms_raw_msg",
            Self::SuggestedReplies => "nook/set_suggested_replies",
        }
    }

    /// Namespaces that are recognized and acknowledged but carry no
    /// reactor implementation.
    pub fn is_inert(self) -> bool {
        matches!(
            self,
            Self::ConversationSetUnread
                | Self::MessageAddTags
                | Self::MessageRemoveTags
                | Self::MessageSetTranslation
        )
    }
}
