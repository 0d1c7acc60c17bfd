// Output filter: decides which events reach the adapter at all
//
// DESIGN: Compile regexes once at startup, not on every event. Patterns
// are matched against the event serialized as compact JSON, so a pattern
// can target either a value ("ERROR") or a field ("\"level\":\"error\"").

use crate::event::Event;
use anyhow::Result;
use regex::Regex;

pub struct EventFilter {
    match_patterns: Vec<Regex>,   // Whitelist: must match at least one
    exclude_patterns: Vec<Regex>, // Blacklist: must not match any
}

impl EventFilter {
    /// Create a new filter from pattern strings
    /// Returns error if any regex pattern is invalid
    pub fn new(match_on: Vec<String>, exclude_on: Vec<String>) -> Result<Self> {
        let mut match_patterns = Vec::new();
        for pattern in match_on {
            let regex = Regex::new(&pattern)
                .map_err(|e| anyhow::anyhow!("Invalid match_on regex '{}': {}", pattern, e))?;
            match_patterns.push(regex);
        }

        let mut exclude_patterns = Vec::new();
        for pattern in exclude_on {
            let regex = Regex::new(&pattern)
                .map_err(|e| anyhow::anyhow!("Invalid exclude_on regex '{}': {}", pattern, e))?;
            exclude_patterns.push(regex);
        }

        Ok(Self {
            match_patterns,
            exclude_patterns,
        })
    }

    /// Check if an event should be handed to the adapter
    ///
    /// Two-stage logic:
    /// 1. If match_patterns is non-empty: event must match at least one
    /// 2. If exclude_patterns is non-empty: event must not match any
    ///
    /// The shutdown sentinel is never filtered; the adapter needs it to
    /// signal completion.
    pub fn should_ship(&self, event: &Event) -> bool {
        let fields = match event {
            Event::Record(fields) => fields,
            Event::Shutdown => return true,
        };

        if self.is_passthrough() {
            return true;
        }

        let haystack = match serde_json::to_string(fields) {
            Ok(s) => s,
            Err(_) => return false,
        };

        // Stage 1: whitelist
        if !self.match_patterns.is_empty()
            && !self.match_patterns.iter().any(|r| r.is_match(&haystack))
        {
            return false;
        }

        // Stage 2: blacklist
        if self.exclude_patterns.iter().any(|r| r.is_match(&haystack)) {
            return false;
        }

        true
    }

    /// Returns true if this filter has no patterns (passes everything)
    pub fn is_passthrough(&self) -> bool {
        self.match_patterns.is_empty() && self.exclude_patterns.is_empty()
    }
}
