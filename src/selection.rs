use serde::Serialize;

use crate::search::SearchResult;

/// Which result is highlighted, across navigation and result replacement.
///
/// `Populated` always holds at least one match and an index inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// nothing searched yet, or the input was cleared
    #[default]
    Idle,
    /// the last query matched nothing
    Empty,
    Populated {
        index: usize,
        matches: Vec<SearchResult>,
    },
}

impl Selection {
    /// Replaces the result set; the first entry becomes selected.
    pub fn show(&mut self, matches: Vec<SearchResult>) {
        *self = if matches.is_empty() {
            Selection::Empty
        } else {
            Selection::Populated { index: 0, matches }
        };
    }

    pub fn clear(&mut self) {
        *self = Selection::Idle;
    }

    /// Circular move; `None` when there is nothing to move over.
    pub fn move_by(&mut self, delta: isize) -> Option<usize> {
        let Selection::Populated { index, matches } = self else {
            return None;
        };

        let len = matches.len() as isize;
        *index = (*index as isize + delta.rem_euclid(len)).rem_euclid(len) as usize;
        Some(*index)
    }

    /// Pointer hover; out of range indices are ignored.
    pub fn hover(&mut self, target: usize) -> Option<usize> {
        let Selection::Populated { index, matches } = self else {
            return None;
        };

        if target < matches.len() {
            *index = target;
        }
        Some(*index)
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Selection::Populated { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn matches(&self) -> &[SearchResult] {
        match self {
            Selection::Populated { matches, .. } => matches,
            _ => &[],
        }
    }

    pub fn selected(&self) -> Option<&SearchResult> {
        match self {
            Selection::Populated { index, matches } => matches.get(*index),
            _ => None,
        }
    }

    /// Consumes the selected entry and resets to `Idle`.
    pub fn take_selected(&mut self) -> Option<SearchResult> {
        match std::mem::take(self) {
            Selection::Populated { index, mut matches } => Some(matches.swap_remove(index)),
            _ => None,
        }
    }

    /// Applies new tags for `url`. With a score the entry is updated in place
    /// and the selection stays put; without one it no longer matches, so it
    /// is dropped and the remaining set is shown from the top.
    pub fn retag(&mut self, url: &str, tags: &[String], score: Option<u32>) {
        let Selection::Populated { matches, .. } = self else {
            return;
        };

        let Some(position) = matches.iter().position(|m| m.url == url) else {
            return;
        };

        if let Some(score) = score {
            matches[position].tags = tags.to_vec();
            matches[position].score = score;
            return;
        }

        let mut remaining = std::mem::take(matches);
        remaining.remove(position);
        self.show(remaining);
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = match self {
            Selection::Idle => "idle",
            Selection::Empty => "empty",
            Selection::Populated { .. } => "populated",
        };

        Snapshot {
            state,
            index: self.index(),
            results: self
                .matches()
                .iter()
                .map(|result| RenderedResult {
                    icon: result.icon_url(),
                    result: result.clone(),
                })
                .collect(),
        }
    }
}

/// What the UI layer renders.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub state: &'static str,
    pub index: Option<usize>,
    pub results: Vec<RenderedResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedResult {
    #[serde(flatten)]
    pub result: SearchResult,
    pub icon: Option<String>,
}
