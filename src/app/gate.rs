use crate::models::user::Role;

/// Client-side send permission derived from the bound role and the shared
/// `chat_access_disabled` setting. The store enforces authorization itself.
#[derive(Clone, Debug)]
pub struct AccessGate {
    role: Option<Role>,
    chat_access_disabled: bool,
    privileged_bypass: bool,
}

impl AccessGate {
    /// With `privileged_bypass`, admins and DMs may keep chatting while
    /// access is disabled for everyone else.
    pub fn new(privileged_bypass: bool) -> Self {
        Self {
            role: None,
            chat_access_disabled: false,
            privileged_bypass,
        }
    }

    pub fn set_privileged_bypass(&mut self, bypass: bool) {
        self.privileged_bypass = bypass;
    }

    pub fn bind(&mut self, role: Role) {
        self.role = Some(role);
    }

    /// Back to the unknown-role state. The shared setting is process-wide and
    /// survives.
    pub fn unbind(&mut self) {
        self.role = None;
    }

    pub fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    pub fn chat_access_disabled(&self) -> bool {
        self.chat_access_disabled
    }

    /// Last writer wins.
    pub fn set_chat_access_disabled(&mut self, disabled: bool) {
        if self.chat_access_disabled != disabled {
            tracing::info!("Chat access disabled: {}", disabled);
        }
        self.chat_access_disabled = disabled;
    }

    pub fn can_send(&self) -> bool {
        match &self.role {
            None | Some(Role::ReadOnly) => false,
            Some(role) if role.is_privileged() && self.privileged_bypass => true,
            Some(_) => !self.chat_access_disabled,
        }
    }

    /// Toggling the setting and composing broadcasts.
    pub fn can_moderate(&self) -> bool {
        self.role.as_ref().is_some_and(Role::is_privileged)
    }
}
