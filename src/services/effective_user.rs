use sqlx::SqlitePool;

use crate::database::user_repo;
use crate::error::ChatError;
use crate::models::{AccessLevel, ChatRow};
use crate::web::middleware::auth::AuthenticatedUser;

/// The closed set of shared privileged mailboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedMailbox {
    Moderator,
    Team,
}

impl SharedMailbox {
    pub fn from_param(param: &str) -> Option<SharedMailbox> {
        match param {
            "moderator" => Some(SharedMailbox::Moderator),
            "team" => Some(SharedMailbox::Team),
            _ => None,
        }
    }

    /// Username of the pseudo-account backing this mailbox.
    pub fn username(self) -> &'static str {
        match self {
            SharedMailbox::Moderator => "moderator",
            SharedMailbox::Team => "team",
        }
    }

    /// Minimum caller level allowed to act as this mailbox.
    pub fn required_level(self) -> AccessLevel {
        match self {
            SharedMailbox::Moderator => AccessLevel::Moderator,
            SharedMailbox::Team => AccessLevel::Team,
        }
    }
}

/// The identity an operation is actually performed as. Resolved once per
/// request; every downstream read-count or membership lookup uses
/// `user_id()` uniformly so shared-inbox state stays on the shared row.
#[derive(Debug, Clone)]
pub enum EffectiveUser {
    Personal { user_id: String },
    Shared {
        mailbox: SharedMailbox,
        user_id: String,
        caller_id: String,
    },
}

impl EffectiveUser {
    pub fn user_id(&self) -> &str {
        match self {
            EffectiveUser::Personal { user_id } => user_id,
            EffectiveUser::Shared { user_id, .. } => user_id,
        }
    }

    /// The logged-in account behind the operation, even when acting as a
    /// shared mailbox. Audit logs want this, counter state never does.
    pub fn caller(&self) -> &str {
        match self {
            EffectiveUser::Personal { user_id } => user_id,
            EffectiveUser::Shared { caller_id, .. } => caller_id,
        }
    }

    pub fn shared_mailbox(&self) -> Option<SharedMailbox> {
        match self {
            EffectiveUser::Personal { .. } => None,
            EffectiveUser::Shared { mailbox, .. } => Some(*mailbox),
        }
    }
}

/// Is this user id one of the shared pseudo-accounts?
pub async fn mailbox_for_user_id(
    pool: &SqlitePool,
    user_id: &str,
) -> sqlx::Result<Option<SharedMailbox>> {
    let Some(user) = user_repo::get_user(pool, user_id).await? else {
        return Ok(None);
    };
    Ok(SharedMailbox::from_param(&user.username))
}

/// Resolves the `for_user` query param into an effective identity. An
/// unknown mailbox name is a validation error; a known one the caller's
/// level doesn't reach is a permission error.
pub async fn resolve(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    for_user: Option<&str>,
) -> Result<EffectiveUser, ChatError> {
    let Some(param) = for_user.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(EffectiveUser::Personal {
            user_id: auth.id.clone(),
        });
    };

    let mailbox = SharedMailbox::from_param(param)
        .ok_or_else(|| ChatError::validation(format!("unknown shared mailbox '{param}'")))?;

    if auth.access_level < mailbox.required_level() {
        return Err(ChatError::permission(format!(
            "access level too low for the {} mailbox",
            mailbox.username()
        )));
    }

    let account = user_repo::get_by_username(pool, mailbox.username())
        .await?
        .ok_or(ChatError::NotFound)?;

    Ok(EffectiveUser::Shared {
        mailbox,
        user_id: account.user_id,
        caller_id: auth.id.clone(),
    })
}

/// Chat-scoped form: a shared identity only applies when its pseudo-account
/// is itself a member of this chat; otherwise the operation proceeds as the
/// caller.
pub async fn resolve_for_chat(
    pool: &SqlitePool,
    auth: &AuthenticatedUser,
    for_user: Option<&str>,
    chat: &ChatRow,
) -> Result<EffectiveUser, ChatError> {
    let effective = resolve(pool, auth, for_user).await?;
    match &effective {
        EffectiveUser::Shared { user_id, .. } if !chat.is_participant(user_id) => {
            Ok(EffectiveUser::Personal {
                user_id: auth.id.clone(),
            })
        }
        _ => Ok(effective),
    }
}
