//! Progress reporting for the gloss corpus import.

/// Snapshot of a long-running import.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current stage, e.g. "Inserting glossed synsets".
    pub stage_description: String,
    /// Items processed in the current stage.
    pub current_item: u64,
    pub total_items: Option<u64>,
    /// Extra context, e.g. the synset being stored.
    pub message: Option<String>,
}

/// Receives progress updates. Returning `false` cancels the import, which
/// then fails and rolls back everything written so far.
pub type ProgressCallback = Box<dyn FnMut(ProgressUpdate) -> bool + Send + Sync>;

impl ProgressUpdate {
    /// An update marking the start of a stage.
    pub fn new_stage(description: String, total_items: Option<u64>) -> Self {
        ProgressUpdate {
            stage_description: description,
            current_item: 0,
            total_items,
            message: None,
        }
    }

    /// Fraction done in `0.0..=1.0`, when the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total_items {
            Some(0) => Some(1.0),
            Some(total) => Some((self.current_item as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}
