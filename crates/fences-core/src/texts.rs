//! User-facing message texts.

pub const MAIN_MENU: &str = "What would you like to do?";
pub const SELECT_RECIPIENT: &str = "Whose fence are we writing on?";
pub const WRITE_ALIAS: &str = "How should we sign you?";
pub const ENTER_MESSAGE: &str = "Type your message:";
pub const ADDED_CHUNK: &str = "✏️ Added. Keep writing, or press «💾 Save».";
pub const MESSAGE_SAVED: &str = "💾 Saved to the fence!";
pub const CONFIRM_CANCEL: &str =
    "⚠️ Really abandon this note? Everything unsaved will be lost.";
pub const EMPTY_MESSAGE: &str = "❌ The message is empty. Write something first.";
pub const EXPIRED_NOTICE: &str = "⏳ The fence is closed: writing time is over.";

pub const EMPTY_BOARD: &str = "Your fence is empty so far";
pub const BOARD_HEADER: &str = "Here is who wrote to you";
pub const BOARD_EOL: &str = "That was everything signed";
pub const ENTRY_NOT_FOUND: &str = "❌ No such note.";
pub const UNKNOWN_RECIPIENT: &str = "❌ That member is no longer on the list.";

pub const ACCESS_DENIED: &str = "🚫 Access denied! This fence belongs to another crew.";
pub const NOT_ADMIN: &str = "❌ You have no admin rights here.";
pub const NON_TEXT_INPUT: &str =
    "⚠️ Only text works here. Stickers, audio and other content won't do.";
pub const GENERIC_FAILURE: &str = "🧐 Something went wrong on my side. Back to the start.";
pub const FALLBACK: &str = "🧐 Either I did not get that, or I slipped somewhere.";

pub const ADMIN_PANEL: &str = "Fence administration";
pub const ENTER_NEW_USERNAME: &str = "Username of the new member:";
pub const ENTER_NEW_LABEL: &str = "Display name for the member list:";
pub const CHOOSE_REMOVAL: &str = "Whom shall we remove?";
pub const CHOOSE_PROMOTION: &str = "Whom shall we promote to admin?";
pub const CHOOSE_DEMOTION: &str = "Whose admin rights shall we revoke?";
pub const ENTER_EXPIRATION: &str = "New closing time, as day.month.year hour:minute:second:";
pub const BROADCAST_SCOPE: &str = "Send the bot message to whom?";
pub const CHOOSE_BROADCAST_RECIPIENT: &str = "Pick the recipient:";
pub const ENTER_BROADCAST: &str = "Compose the bot message (text or attachments):";
pub const BROADCAST_SENT: &str = "📢 Bot message delivered to everyone it could reach.";
