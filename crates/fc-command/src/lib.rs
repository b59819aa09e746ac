//! Command router: relays `send_to_multi_ids` /
//! `send_messages_to_ids` onto the outgoing topic as `send_messages`, and
//! applies `add_opinion` / `sms_from_rapidpro` against a buffered
//! conversation cache.

mod action;
mod cache;
mod conversation;
mod namespace;
mod router;
mod suggested_replies;

pub use action::{CommandAction, SmsRawPayload};
pub use cache::ConversationCache;
pub use conversation::{Conversation, ConversationError, ConversationMessage, ConversationStore, MongoConversationStore};
pub use namespace::OpinionNamespace;
pub use router::{CommandError, CommandRouter, Result};
pub use suggested_replies::{MongoSuggestedRepliesStore, SuggestedReplies, SuggestedRepliesStore};
