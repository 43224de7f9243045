use crate::allowlist::{AllowList, Insertion};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Decides which values recorded on a path are worth keeping.
pub trait Feedback {
    fn name(&self) -> &'static str;
    fn init(&mut self, allow_list: &AllowList);
    fn is_interesting(&self, value: u32) -> bool;
    fn report_interesting(&mut self, value: u32, allow_list: &mut AllowList) -> Insertion;
}

/// Keeps token identifiers the allow-list has not seen yet.
#[derive(Debug, Default)]
pub struct NewTokenFeedback {
    known: BTreeSet<u32>,
    added: Vec<u32>,
    dropped: BTreeSet<u32>,
}

impl NewTokenFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers added to the allow-list, in discovery order.
    pub fn added(&self) -> &[u32] {
        &self.added
    }

    /// Identifiers lost because the allow-list was full.
    pub fn dropped(&self) -> &BTreeSet<u32> {
        &self.dropped
    }
}

impl Feedback for NewTokenFeedback {
    fn name(&self) -> &'static str {
        "NewTokenFeedback"
    }

    fn init(&mut self, allow_list: &AllowList) {
        self.known = allow_list.ids().clone();
    }

    fn is_interesting(&self, value: u32) -> bool {
        !self.known.contains(&value)
    }

    fn report_interesting(&mut self, value: u32, allow_list: &mut AllowList) -> Insertion {
        let insertion = allow_list.insert(value);
        match insertion {
            Insertion::Added => {
                debug!("New token identifier {}", value);
                self.known.insert(value);
                self.added.push(value);
            }
            Insertion::Known => {
                self.known.insert(value);
            }
            Insertion::OverCapacity => {
                if self.dropped.insert(value) {
                    warn!(
                        "Allow-list is full, dropping token identifier {} ({} entries kept)",
                        value,
                        allow_list.len()
                    );
                }
            }
        }
        insertion
    }
}
