use crate::{app::compose::Composer, models::user::Session, utils::typewriter::Typewriter};

#[derive(Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub show_password: bool,
    pub banner: Typewriter,
    pub in_progress: bool,
    pub error: Option<String>,
}

impl LoginForm {
    pub fn new() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            show_password: false,
            banner: Typewriter::login_banner(),
            in_progress: false,
            error: None,
        }
    }
}

#[derive(Debug)]
pub struct PasswordForm {
    pub user_id: String,
    pub new_password: String,
    pub show_password: bool,
    pub in_progress: bool,
}

/// Per-login UI state of the chat screen. The feed itself lives in the
/// context so its generation counter outlives logins.
#[derive(Debug)]
pub struct ChatView {
    pub chat: Composer,
    pub broadcast: Composer,
    pub show_settings: bool,
    pub avatar_path: String,
    pub upload_in_progress: bool,
    pub last_error: Option<String>,
}

impl ChatView {
    pub fn new(max_message_chars: usize) -> Self {
        Self {
            chat: Composer::chat(max_message_chars),
            broadcast: Composer::broadcast(),
            show_settings: false,
            avatar_path: String::new(),
            upload_in_progress: false,
            last_error: None,
        }
    }
}

/// Represents the various states of the application's lifecycle.
#[derive(Debug)]
pub enum AppState {
    Startup,
    LoggedOut(LoginForm),
    ChangePassword(PasswordForm),
    /// Credentials accepted; the access-granted reveal is playing.
    Granting {
        session: Session,
        reveal: Typewriter,
    },
    LoggedIn(ChatView),
}
