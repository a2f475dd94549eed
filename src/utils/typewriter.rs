use std::time::Duration;

/// Reveals a list of lines one character at a time. Driven by elapsed time
/// from the render loop rather than timers.
#[derive(Clone, Debug)]
pub struct Typewriter {
    lines: Vec<Vec<char>>,
    line: usize,
    column: usize,
    output: String,
    char_delay: Duration,
    line_delay: Duration,
    wait: Duration,
    budget: Duration,
}

impl Typewriter {
    pub fn new<I, S>(lines: I, char_delay: Duration, line_delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(|l| l.as_ref().chars().collect())
                .collect(),
            line: 0,
            column: 0,
            output: String::new(),
            char_delay,
            line_delay,
            wait: Duration::ZERO,
            budget: Duration::ZERO,
        }
    }

    pub fn login_banner() -> Self {
        Self::new(
            [
                "SYSTEM INITIALIZED...",
                "ESTABLISHING LINK TO RHODES ISLAND HQ...",
                "AWAITING OPERATOR AUTHENTICATION...",
            ],
            Duration::from_millis(5),
            Duration::from_millis(50),
        )
    }

    pub fn access_granted(codename: &str) -> Self {
        let name = codename.trim().to_uppercase();
        let name = if name.is_empty() { "OPERATOR".to_string() } else { name };
        Self::new(
            [
                "INITIALIZING SECURE CONNECTION...".to_string(),
                "AUTHENTICATING OPERATOR...".to_string(),
                "CREDENTIALS VERIFIED.".to_string(),
                format!("ACCESS GRANTED.\nWELCOME, {}.", name),
            ],
            Duration::from_millis(10),
            Duration::from_millis(100),
        )
    }

    /// Emits one character or line break. Returns the delay before the next
    /// step, or `None` once every line is out.
    pub fn step(&mut self) -> Option<Duration> {
        let current = self.lines.get(self.line)?;
        if let Some(&c) = current.get(self.column) {
            self.output.push(c);
            self.column += 1;
            Some(self.char_delay)
        } else {
            self.output.push('\n');
            self.line += 1;
            self.column = 0;
            Some(self.line_delay)
        }
    }

    pub fn advance(&mut self, elapsed: Duration) {
        self.budget += elapsed;
        while !self.is_finished() && self.budget >= self.wait {
            self.budget -= self.wait;
            self.wait = self.step().unwrap_or(Duration::ZERO);
        }
        if self.is_finished() {
            self.budget = Duration::ZERO;
        }
    }

    pub fn finish(&mut self) {
        while self.step().is_some() {}
    }

    pub fn is_finished(&self) -> bool {
        self.line >= self.lines.len()
    }

    pub fn output(&self) -> &str {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_characters_then_line_breaks() {
        let mut tw = Typewriter::new(["ab", "c"], Duration::from_millis(1), Duration::from_millis(9));
        assert_eq!(tw.step(), Some(Duration::from_millis(1)));
        assert_eq!(tw.step(), Some(Duration::from_millis(1)));
        assert_eq!(tw.output(), "ab");
        assert_eq!(tw.step(), Some(Duration::from_millis(9)));
        assert_eq!(tw.output(), "ab\n");
        tw.step();
        tw.step();
        assert!(tw.is_finished());
        assert_eq!(tw.output(), "ab\nc\n");
        assert_eq!(tw.step(), None);
    }

    #[test]
    fn advance_consumes_elapsed_time() {
        let mut tw = Typewriter::new(["abcd"], Duration::from_millis(10), Duration::from_millis(100));
        tw.advance(Duration::ZERO);
        assert_eq!(tw.output(), "a");
        tw.advance(Duration::from_millis(25));
        assert_eq!(tw.output(), "abc");
        tw.advance(Duration::from_millis(5));
        assert_eq!(tw.output(), "abcd");
        tw.advance(Duration::from_millis(10));
        assert_eq!(tw.output(), "abcd\n");
        assert!(tw.is_finished());
    }

    #[test]
    fn access_granted_names_the_operator() {
        let mut tw = Typewriter::access_granted(" amiya ");
        tw.finish();
        assert!(tw.output().ends_with("ACCESS GRANTED.\nWELCOME, AMIYA.\n"));

        let mut anonymous = Typewriter::access_granted("");
        anonymous.finish();
        assert!(anonymous.output().contains("WELCOME, OPERATOR."));
    }
}
