/// Which input a draft came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComposeKind {
    Chat,
    Broadcast,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Draft {
    /// Nothing to send; not an error.
    Empty,
    TooLong { limit: usize },
    /// A submit for this composer has not returned yet.
    Busy,
    Ready(String),
}

/// Input buffer that is only cleared once its submit call has returned
/// successfully, so a failed submit can be retried.
#[derive(Clone, Debug)]
pub struct Composer {
    pub buffer: String,
    kind: ComposeKind,
    limit: Option<usize>,
    in_flight: bool,
}

impl Composer {
    pub fn chat(limit: usize) -> Self {
        Self {
            buffer: String::new(),
            kind: ComposeKind::Chat,
            limit: Some(limit),
            in_flight: false,
        }
    }

    pub fn broadcast() -> Self {
        Self {
            buffer: String::new(),
            kind: ComposeKind::Broadcast,
            limit: None,
            in_flight: false,
        }
    }

    pub fn kind(&self) -> ComposeKind {
        self.kind
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn normalize(&self, text: &str) -> Draft {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Draft::Empty;
        }
        if let Some(limit) = self.limit {
            if trimmed.chars().count() > limit {
                return Draft::TooLong { limit };
            }
        }
        match self.kind {
            ComposeKind::Chat => Draft::Ready(trimmed.to_string()),
            ComposeKind::Broadcast => Draft::Ready(trimmed.to_uppercase()),
        }
    }

    /// Normalizes the buffer and, if it is sendable, marks a submit as
    /// outstanding. The buffer itself is left untouched.
    pub fn begin_submit(&mut self) -> Draft {
        if self.in_flight {
            return Draft::Busy;
        }
        let draft = self.normalize(&self.buffer);
        if matches!(draft, Draft::Ready(_)) {
            self.in_flight = true;
        }
        draft
    }

    pub fn finish_submit(&mut self, succeeded: bool) {
        self.in_flight = false;
        if succeeded {
            self.buffer.clear();
        }
    }
}
